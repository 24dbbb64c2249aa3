/* Backend en memoria para probar el fsck con imágenes armadas a mano,
incluyendo imágenes rotas que el motor nunca produciría. */

use std::collections::HashMap;

use super::{fsck_backend::FsckBackend, fsck_types::*};
use crate::error::{FsError, Result};
use crate::layout::ImageHeader;

pub struct MockBackend {
    pub header: ImageHeader,
    pub bitmap: Vec<bool>,
    pub root: u32,
    pub dirs: HashMap<u32, Vec<Dirent>>,
}

impl FsckBackend for MockBackend {
    fn load_header(&self) -> Result<ImageHeader> {
        Ok(self.header)
    }

    fn load_bitmap(&self) -> Result<Vec<bool>> {
        Ok(self.bitmap.clone())
    }

    fn root_anchor(&self) -> u32 {
        self.root
    }

    fn read_dir(&self, anchor: u32) -> Result<Vec<Dirent>> {
        self.dirs
            .get(&anchor)
            .cloned()
            .ok_or_else(|| FsError::NotFound(format!("directorio {anchor}")))
    }
}
