// src/dirent.rs
//
// Registro de directorio de ancho fijo (30 bytes):
// [occupied:1][type:1][name:16][start:4][end:4][child_count:4]

use crate::config::{DIR_ENTRY_SIZE, DOTDOT_NAME, DOT_NAME, NAME_LEN};
use crate::error::{FsError, Result};

const OFF_OCCUPIED: usize = 0;
const OFF_KIND: usize = 1;
const OFF_NAME: usize = 2;
const OFF_START: usize = OFF_NAME + NAME_LEN;
const OFF_END: usize = OFF_START + 4;
const OFF_COUNT: usize = OFF_END + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn to_byte(self) -> u8 {
        match self {
            EntryKind::File => 0,
            EntryKind::Directory => 1,
        }
    }

    fn from_byte(b: u8) -> Self {
        if b == 1 {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Entrada de directorio decodificada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryDisk {
    pub kind: EntryKind,
    pub name: String,
    pub start: u32,
    /// Inclusivo.
    pub end: u32,
    /// Sólo tiene sentido en directorios; cero en archivos.
    pub child_count: u32,
}

impl DirEntryDisk {
    pub fn file(name: &str, start: u32, end: u32) -> Self {
        Self {
            kind: EntryKind::File,
            name: name.to_owned(),
            start,
            end,
            child_count: 0,
        }
    }

    pub fn dir(name: &str, start: u32, end: u32, child_count: u32) -> Self {
        Self {
            kind: EntryKind::Directory,
            name: name.to_owned(),
            start,
            end,
            child_count,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// "." o "..".
    pub fn is_dot(&self) -> bool {
        self.name == DOT_NAME || self.name == DOTDOT_NAME
    }

    /// Tamaño lógico en unidades, derivado sólo del rango.
    pub fn span(&self) -> u32 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    pub fn encode(&self) -> Result<[u8; DIR_ENTRY_SIZE]> {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        buf[OFF_OCCUPIED] = 1;
        buf[OFF_KIND] = self.kind.to_byte();
        buf[OFF_NAME..OFF_START].copy_from_slice(&encode_name(&self.name)?);
        buf[OFF_START..OFF_END].copy_from_slice(&self.start.to_le_bytes());
        buf[OFF_END..OFF_COUNT].copy_from_slice(&self.end.to_le_bytes());
        buf[OFF_COUNT..].copy_from_slice(&self.child_count.to_le_bytes());
        Ok(buf)
    }

    /// `None` si el slot no está ocupado.
    pub fn decode(buf: &[u8; DIR_ENTRY_SIZE]) -> Option<Self> {
        if buf[OFF_OCCUPIED] == 0 {
            return None;
        }
        Some(Self {
            kind: EntryKind::from_byte(buf[OFF_KIND]),
            name: decode_name(&buf[OFF_NAME..OFF_START]),
            start: read_u32(buf, OFF_START),
            end: read_u32(buf, OFF_END),
            child_count: read_u32(buf, OFF_COUNT),
        })
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Justifica a la izquierda y rellena con NUL.
pub fn encode_name(name: &str) -> Result<[u8; NAME_LEN]> {
    let bytes = name.as_bytes();
    if bytes.len() > NAME_LEN {
        return Err(FsError::NameTooLong(name.to_owned()));
    }
    let mut out = [0u8; NAME_LEN];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Quita el relleno NUL del final.
pub fn decode_name(raw: &[u8]) -> String {
    let len = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&raw[..len]).into_owned()
}

/// Valida un nombre nuevo antes de escribirlo en un directorio.
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > NAME_LEN {
        return Err(FsError::NameTooLong(name.to_owned()));
    }
    let bad = name.is_empty()
        || name == DOT_NAME
        || name == DOTDOT_NAME
        || !name.is_ascii()
        || name.bytes().any(|b| b == b'/' || b == 0);
    if bad {
        return Err(FsError::InvalidName(name.to_owned()));
    }
    Ok(())
}
