// src/device.rs
//
// Acceso posicional a la imagen. Cada lectura/escritura va directo al
// dispositivo: no hay caché ni buffer de escritura.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;

pub trait ImageDevice: Send + Sync {
    /// Tamaño de la imagen en bytes.
    fn len(&self) -> Result<u64>;

    /// Lee exactamente `buf.len()` bytes desde `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Escribe `buf` completo en `offset`.
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// -----------------------------------------------------------------------------
// Imagen respaldada por un archivo
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub struct FileImage {
    file: File,
}

impl FileImage {
    /// Crea (o trunca) el archivo y lo deja con `size` bytes en cero.
    pub fn create(path: &Path, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(Self { file })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }
}

impl ImageDevice for FileImage {
    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Imagen en memoria
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemImage {
    inner: Mutex<Vec<u8>>,
}

impl MemImage {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Mutex::new(vec![0u8; size]),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            inner: Mutex::new(bytes),
        }
    }

    /// Copia del contenido completo de la imagen.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        // Un panic en otro hilo no invalida los bytes.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn out_of_range(offset: u64, len: usize, size: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("acceso fuera de la imagen: offset {offset} + {len} > {size}"),
    )
}

impl ImageDevice for MemImage {
    fn len(&self) -> Result<u64> {
        Ok(self.lock().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.lock();
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= data.len())
            .ok_or_else(|| out_of_range(offset, buf.len(), data.len()))?;
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut data = self.lock();
        let start = offset as usize;
        let size = data.len();
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= size)
            .ok_or_else(|| out_of_range(offset, buf.len(), size))?;
        data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
