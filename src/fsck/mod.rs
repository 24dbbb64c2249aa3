//! Chequeo de consistencia de una imagen.
//!
//! El chequeo recorre el árbol desde la raíz a través de un [`FsckBackend`],
//! así que funciona igual sobre un [`Volume`](crate::Volume) montado que
//! sobre un backend simulado en las pruebas.

pub mod fsck_backend;
pub mod fsck_types;
mod checks;

#[cfg(test)]
mod mock;

pub use checks::run_fsck;
pub use fsck_backend::FsckBackend;
pub use fsck_types::{Dirent, FsckReport};
