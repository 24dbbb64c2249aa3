/* Tipos que usa el fsck: una vista simplificada de cada registro de
directorio y el reporte donde se acumulan los errores. */

use crate::config::{DOTDOT_NAME, DOT_NAME};
use crate::dirent::DirEntryDisk;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub slot: usize,
    pub name: String,
    pub is_dir: bool,
    pub start: u32,
    pub end: u32,
    pub child_count: u32,
}

impl Dirent {
    pub fn is_dot(&self) -> bool {
        self.name == DOT_NAME || self.name == DOTDOT_NAME
    }
}

impl From<(usize, DirEntryDisk)> for Dirent {
    fn from((slot, e): (usize, DirEntryDisk)) -> Self {
        Self {
            slot,
            is_dir: e.is_dir(),
            name: e.name,
            start: e.start,
            end: e.end,
            child_count: e.child_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsckReport {
    /// Bitmap y rangos sin conflictos.
    pub bitmap_ok: bool,
    /// Estructura de directorios válida.
    pub dirs_ok: bool,
    pub errors: Vec<String>,
    /// Unidades marcadas ocupadas que ninguna entrada referencia. Es una
    /// fuga, no corrupción.
    pub leaked_units: Vec<u32>,
    /// Directorios alcanzados desde la raíz, raíz incluida.
    pub directories: usize,
    /// Archivos alcanzados desde la raíz.
    pub files: usize,
}

impl FsckReport {
    pub fn new() -> Self {
        Self {
            bitmap_ok: true,
            dirs_ok: true,
            errors: Vec::new(),
            leaked_units: Vec::new(),
            directories: 0,
            files: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.bitmap_ok && self.dirs_ok && self.errors.is_empty()
    }

    pub(crate) fn dir_error(&mut self, msg: String) {
        self.dirs_ok = false;
        self.errors.push(msg);
    }

    pub(crate) fn bitmap_error(&mut self, msg: String) {
        self.bitmap_ok = false;
        self.errors.push(msg);
    }
}

impl Default for FsckReport {
    fn default() -> Self {
        Self::new()
    }
}
