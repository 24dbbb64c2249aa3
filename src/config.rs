// src/config.rs
//
// Geometría fija del formato. No hay parámetros ajustables: lo único que se
// elige al crear la imagen es la cantidad de unidades.

/// Tamaño de una unidad de asignación ("cluster") en bytes.
/// Unidad N == offset N dentro de la imagen.
pub const UNIT_SIZE: u32 = 1;

/// Bytes del header: total de unidades (u32) + bytes del bitmap (u32).
pub const HEADER_SIZE: u32 = 8;

/// Largo máximo de un nombre (ASCII, rellenado con NUL).
pub const NAME_LEN: usize = 16;

/// Slots por directorio, incluyendo "." y "..".
pub const DIR_SLOTS: usize = 16;

/// [occupied:1][type:1][name:16][start:4][end:4][child_count:4]
pub const DIR_ENTRY_SIZE: usize = 30;

/// Unidades que ocupa un directorio completo.
pub const DIR_SPAN: u32 = ((DIR_SLOTS * DIR_ENTRY_SIZE) as u32 + UNIT_SIZE - 1) / UNIT_SIZE;

/// Valor mínimo del contador de un directorio ("." y "..").
pub const MIN_CHILD_COUNT: u32 = 2;

pub const DOT_NAME: &str = ".";
pub const DOTDOT_NAME: &str = "..";
pub const ROOT_PATH: &str = "/";
