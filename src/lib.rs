//! bytefs: sistema de archivos mínimo dentro de un único archivo de imagen.
//!
//! Layout de la imagen:
//! - Header (total de unidades, bytes del bitmap)
//! - Bitmap de unidades libres
//! - Directorio raíz
//! - Datos
//!
//! Una unidad de asignación mide un byte, así que "unidad N" y "offset N"
//! son lo mismo. Los directorios tienen 16 slots fijos de 30 bytes.

mod config;
mod error;
mod device;
mod layout;
mod bitmap;
mod dirent;
mod dir;
mod nav;
mod fs;
pub mod fsck;

pub use crate::config::{
    DIR_ENTRY_SIZE,
    DIR_SLOTS,
    DIR_SPAN,
    HEADER_SIZE,
    NAME_LEN,
    UNIT_SIZE,
};
pub use crate::bitmap::BitmapAllocator;
pub use crate::device::{FileImage, ImageDevice, MemImage};
pub use crate::dir::{dir_end, DirTable};
pub use crate::dirent::{DirEntryDisk, EntryKind};
pub use crate::error::{FsError, Result};
pub use crate::fs::{EntryInfo, Usage, Volume};
pub use crate::layout::{ImageHeader, Layout};
pub use crate::nav::{NavFrame, NavStack};
