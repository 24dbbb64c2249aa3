//! Utilidades compartidas por las pruebas de integración.
#![allow(dead_code)]

use bytefs::{MemImage, Volume};

/// Unidades de la imagen de prueba por defecto: 1024 bytes de bitmap, raíz en 1032.
pub const UNITS: u32 = 8192;

/// Volumen recién formateado en memoria.
pub fn fresh_volume(units: u32) -> Volume<MemImage> {
    Volume::format(MemImage::new(units as usize), units).unwrap()
}

/// Corre el fsck y falla mostrando los errores si la imagen no está limpia.
pub fn assert_consistent(vol: &Volume<MemImage>) {
    let report = vol.check().unwrap();
    assert!(report.is_clean(), "fsck: {:#?}", report.errors);
}

/// Contenido de prueba determinístico.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn names(vol: &Volume<MemImage>, dir: u32) -> Vec<String> {
    vol.list(dir).unwrap().into_iter().map(|e| e.name).collect()
}
