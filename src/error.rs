// src/error.rs
use std::io;

use libc::{EEXIST, EINVAL, EIO, ENAMETOOLONG, ENOENT, ENOSPC, ENOTDIR};
use thiserror::Error;

/// Errores del motor. Todos son recuperables: ninguna operación aborta el
/// proceso, el llamador decide qué mostrar.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("nombre demasiado largo: {0:?} (máximo {max} bytes)", max = crate::config::NAME_LEN)]
    NameTooLong(String),

    #[error("nombre inválido: {0:?}")]
    InvalidName(String),

    #[error("ya existe una entrada llamada {0:?}")]
    NameConflict(String),

    #[error("entrada no encontrada: {0:?}")]
    NotFound(String),

    #[error("no es un directorio: {0:?}")]
    NotADirectory(String),

    #[error("directorio lleno (anchor {anchor})")]
    DirectoryFull { anchor: u32 },

    #[error("espacio insuficiente: se piden {requested} unidades, hay {available} libres")]
    InsufficientSpace { requested: u32, available: u32 },

    #[error("ya está en el directorio raíz")]
    AtRoot,

    #[error("no es un sistema de archivos válido: {0}")]
    NotAFilesystem(String),

    #[error("no se puede almacenar un archivo vacío")]
    EmptyContent,

    #[error("movimiento inválido: {0:?} no puede moverse dentro de sí mismo")]
    InvalidMove(String),

    #[error("error de E/S: {0}")]
    IoFailure(#[from] io::Error),
}

impl FsError {
    /// errno equivalente, para adaptadores estilo FUSE.
    pub fn as_errno(&self) -> i32 {
        match self {
            FsError::NameTooLong(_) => ENAMETOOLONG,
            FsError::InvalidName(_) => EINVAL,
            FsError::NameConflict(_) => EEXIST,
            FsError::NotFound(_) => ENOENT,
            FsError::NotADirectory(_) => ENOTDIR,
            FsError::DirectoryFull { .. } => ENOSPC,
            FsError::InsufficientSpace { .. } => ENOSPC,
            FsError::AtRoot => ENOENT,
            FsError::NotAFilesystem(_) => EINVAL,
            FsError::EmptyContent => EINVAL,
            FsError::InvalidMove(_) => EINVAL,
            FsError::IoFailure(_) => EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
