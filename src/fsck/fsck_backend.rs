/* Interfaz con la que el fsck lee la imagen. Existe para poder correr el
mismo chequeo sobre un volumen real o sobre un mock con errores armados a mano. */

use super::fsck_types::Dirent;
use crate::device::ImageDevice;
use crate::dir::DirTable;
use crate::error::Result;
use crate::fs::Volume;
use crate::layout::ImageHeader;

pub trait FsckBackend {
    fn load_header(&self) -> Result<ImageHeader>;
    /// Un flag por unidad: true = ocupada.
    fn load_bitmap(&self) -> Result<Vec<bool>>;
    fn root_anchor(&self) -> u32;
    /// Todos los slots ocupados del directorio, "." y ".." incluidos.
    fn read_dir(&self, anchor: u32) -> Result<Vec<Dirent>>;
}

impl<D: ImageDevice> FsckBackend for Volume<D> {
    fn load_header(&self) -> Result<ImageHeader> {
        Ok(self.header())
    }

    fn load_bitmap(&self) -> Result<Vec<bool>> {
        let layout = self.layout();
        let mut raw = vec![0u8; layout.bitmap_bytes as usize];
        self.device().read_at(layout.bitmap_offset, &mut raw)?;
        Ok((0..layout.total_units)
            .map(|u| (raw[(u / 8) as usize] >> (u % 8)) & 1 == 0)
            .collect())
    }

    fn root_anchor(&self) -> u32 {
        Volume::root_anchor(self)
    }

    fn read_dir(&self, anchor: u32) -> Result<Vec<Dirent>> {
        Ok(DirTable::new(self.device())
            .read_all(anchor)?
            .into_iter()
            .map(Dirent::from)
            .collect())
    }
}
