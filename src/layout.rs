// src/layout.rs
//
// Layout lineal de la imagen:
//
//   offset 0            total_units  (u32 LE)
//   offset 4            bitmap_bytes (u32 LE)
//   offset 8            bitmap (bitmap_bytes bytes, 1 = libre)
//   offset 8 + bitmap   directorio raíz (16 x 30 bytes)
//   ...                 resto de unidades, en cero al crear

use crate::config::{DIR_SPAN, HEADER_SIZE, UNIT_SIZE};
use crate::error::{FsError, Result};

// -------------------- Header en disco --------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub total_units: u32,
    pub bitmap_bytes: u32,
}

impl ImageHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&self.total_units.to_le_bytes());
        buf[4..8].copy_from_slice(&self.bitmap_bytes.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE as usize]) -> Self {
        Self {
            total_units: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            bitmap_bytes: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

/// Bytes de bitmap necesarios para `units` unidades (1 bit por unidad).
pub fn bitmap_bytes_for(units: u32) -> u32 {
    units.div_ceil(8)
}

/// Unidades necesarias para `bytes` bytes.
pub fn units_for(bytes: u32) -> u32 {
    bytes.div_ceil(UNIT_SIZE)
}

// -------------------- Layout calculado --------------------

/// Posiciones derivadas del header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub total_units: u32,
    pub bitmap_bytes: u32,
    pub bitmap_offset: u64,
    /// Primera unidad del directorio raíz.
    pub root_anchor: u32,
    /// Última unidad (inclusive) del directorio raíz.
    pub root_end: u32,
}

impl Layout {
    /// Calcula el layout para una imagen nueva de `total_units` unidades.
    pub fn build(total_units: u32) -> Result<Self> {
        let bitmap_bytes = bitmap_bytes_for(total_units);
        let layout = Self::from_header(&ImageHeader {
            total_units,
            bitmap_bytes,
        });

        let needed = layout.reserved_units();
        if (needed as u64) > total_units as u64 {
            return Err(FsError::InsufficientSpace {
                requested: needed,
                available: total_units,
            });
        }

        Ok(layout)
    }

    pub fn from_header(header: &ImageHeader) -> Self {
        let root_anchor = units_for(HEADER_SIZE).saturating_add(units_for(header.bitmap_bytes));
        Self {
            total_units: header.total_units,
            bitmap_bytes: header.bitmap_bytes,
            bitmap_offset: HEADER_SIZE as u64,
            root_anchor,
            root_end: root_anchor.saturating_add(DIR_SPAN - 1),
        }
    }

    pub fn header(&self) -> ImageHeader {
        ImageHeader {
            total_units: self.total_units,
            bitmap_bytes: self.bitmap_bytes,
        }
    }

    /// Unidades de header + bitmap + raíz, marcadas ocupadas al crear.
    pub fn reserved_units(&self) -> u32 {
        self.root_end.saturating_add(1)
    }

    /// Bytes que debe tener la imagen.
    pub fn image_bytes(&self) -> u64 {
        self.total_units as u64 * UNIT_SIZE as u64
    }
}
