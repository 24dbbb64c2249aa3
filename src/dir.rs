// src/dir.rs
//
// Operaciones sobre la tabla de slots de un directorio. Un directorio se
// identifica por su "anchor" (primera unidad de su rango). Capacidad fija:
// DIR_SLOTS slots, nunca crece.

use tracing::trace;

use crate::config::{DIR_ENTRY_SIZE, DIR_SLOTS, DIR_SPAN, DOTDOT_NAME, DOT_NAME, MIN_CHILD_COUNT, UNIT_SIZE};
use crate::device::ImageDevice;
use crate::dirent::{encode_name, DirEntryDisk};
use crate::error::{FsError, Result};

/// Offset del nombre dentro del registro (después de occupied y type).
const NAME_OFFSET: u64 = 2;

/// Última unidad (inclusive) del directorio con ese anchor.
pub fn dir_end(anchor: u32) -> u32 {
    anchor + DIR_SPAN - 1
}

fn slot_offset(anchor: u32, slot: usize) -> u64 {
    anchor as u64 * UNIT_SIZE as u64 + (slot * DIR_ENTRY_SIZE) as u64
}

pub struct DirTable<'a, D: ImageDevice> {
    device: &'a D,
}

impl<'a, D: ImageDevice> DirTable<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    // --------- Slots individuales ---------

    pub fn read_slot(&self, anchor: u32, slot: usize) -> Result<Option<DirEntryDisk>> {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        self.device.read_at(slot_offset(anchor, slot), &mut buf)?;
        Ok(DirEntryDisk::decode(&buf))
    }

    pub fn write_slot(&self, anchor: u32, slot: usize, entry: &DirEntryDisk) -> Result<()> {
        let buf = entry.encode()?;
        trace!(anchor, slot, name = %entry.name, "escribiendo slot");
        self.device.write_at(slot_offset(anchor, slot), &buf)
    }

    /// Reescribe sólo el campo de nombre del slot.
    pub fn write_name(&self, anchor: u32, slot: usize, name: &str) -> Result<()> {
        let raw = encode_name(name)?;
        self.device.write_at(slot_offset(anchor, slot) + NAME_OFFSET, &raw)
    }

    /// Pone el slot completo en cero (queda libre).
    pub fn clear_slot(&self, anchor: u32, slot: usize) -> Result<()> {
        trace!(anchor, slot, "liberando slot");
        self.device
            .write_at(slot_offset(anchor, slot), &[0u8; DIR_ENTRY_SIZE])
    }

    /// Todos los slots ocupados con su índice, "." y ".." incluidos.
    pub fn read_all(&self, anchor: u32) -> Result<Vec<(usize, DirEntryDisk)>> {
        let mut buf = vec![0u8; DIR_SLOTS * DIR_ENTRY_SIZE];
        self.device.read_at(slot_offset(anchor, 0), &mut buf)?;

        let mut out = Vec::new();
        for (slot, chunk) in buf.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
            let mut raw = [0u8; DIR_ENTRY_SIZE];
            raw.copy_from_slice(chunk);
            if let Some(entry) = DirEntryDisk::decode(&raw) {
                out.push((slot, entry));
            }
        }
        Ok(out)
    }

    // --------- Operaciones de tabla ---------

    /// Entradas ocupadas sin "." ni "..", en orden físico de slot.
    pub fn list(&self, anchor: u32) -> Result<Vec<DirEntryDisk>> {
        Ok(self
            .read_all(anchor)?
            .into_iter()
            .map(|(_, e)| e)
            .filter(|e| !e.is_dot() && !e.name.is_empty())
            .collect())
    }

    pub fn find_free_slot(&self, anchor: u32) -> Result<usize> {
        let used: Vec<usize> = self.read_all(anchor)?.into_iter().map(|(s, _)| s).collect();
        (0..DIR_SLOTS)
            .find(|s| !used.contains(s))
            .ok_or(FsError::DirectoryFull { anchor })
    }

    /// Búsqueda lineal sobre todos los slots ocupados.
    pub fn find_by_name(&self, anchor: u32, name: &str) -> Result<(usize, DirEntryDisk)> {
        self.read_all(anchor)?
            .into_iter()
            .find(|(_, e)| e.name == name)
            .ok_or_else(|| FsError::NotFound(name.to_owned()))
    }

    /// Como `find_by_name`, pero nunca devuelve "." ni "..".
    pub fn find_child(&self, anchor: u32, name: &str) -> Result<(usize, DirEntryDisk)> {
        match self.find_by_name(anchor, name) {
            Ok((_, e)) if e.is_dot() => Err(FsError::NotFound(name.to_owned())),
            other => other,
        }
    }

    pub fn contains(&self, anchor: u32, name: &str) -> Result<bool> {
        match self.find_child(anchor, name) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Verifica que en `anchor` haya un directorio vivo: el slot 0 tiene que
    /// ser un "." que apunte a sí mismo.
    pub fn require_dir(&self, anchor: u32) -> Result<()> {
        match self.read_slot(anchor, 0)? {
            Some(e) if e.is_dir() && e.name == DOT_NAME && e.start == anchor => Ok(()),
            _ => Err(FsError::NotADirectory(format!("anchor {anchor}"))),
        }
    }

    fn dot_slot(&self, anchor: u32) -> Result<(usize, DirEntryDisk)> {
        self.read_all(anchor)?
            .into_iter()
            .find(|(_, e)| e.is_dir() && e.name == DOT_NAME)
            .ok_or_else(|| {
                FsError::NotAFilesystem(format!("el directorio en {anchor} no tiene entrada '.'"))
            })
    }

    /// Contador de la entrada ".".
    pub fn child_count(&self, anchor: u32) -> Result<u32> {
        Ok(self.dot_slot(anchor)?.1.child_count)
    }

    /// Aplica `delta` al contador de ".", con piso en 2.
    pub fn adjust_count(&self, anchor: u32, delta: i64) -> Result<u32> {
        let (slot, mut dot) = self.dot_slot(anchor)?;
        let updated = (dot.child_count as i64 + delta).max(MIN_CHILD_COUNT as i64);
        dot.child_count = updated.min(u32::MAX as i64) as u32;
        self.write_slot(anchor, slot, &dot)?;
        Ok(dot.child_count)
    }

    /// Escribe un directorio vacío: "." apunta a sí mismo y ".." al padre.
    /// El resto de los slots queda en cero.
    pub fn init_directory(&self, anchor: u32, parent_anchor: u32) -> Result<()> {
        let mut block = vec![0u8; DIR_SLOTS * DIR_ENTRY_SIZE];
        let dot = DirEntryDisk::dir(DOT_NAME, anchor, dir_end(anchor), MIN_CHILD_COUNT);
        let dotdot = DirEntryDisk::dir(
            DOTDOT_NAME,
            parent_anchor,
            dir_end(parent_anchor),
            MIN_CHILD_COUNT,
        );
        block[..DIR_ENTRY_SIZE].copy_from_slice(&dot.encode()?);
        block[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot.encode()?);
        self.device.write_at(slot_offset(anchor, 0), &block)
    }
}
