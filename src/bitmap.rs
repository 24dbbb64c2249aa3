//! Bitmap de unidades libres.
//!
//! Un bit por unidad, LSB primero dentro de cada byte. 1 = libre, 0 = ocupada.
//! Cada operación relee el bitmap completo y las mutaciones lo vuelven a
//! escribir entero: no hay copia en memoria entre llamadas.

use tracing::trace;

use crate::device::ImageDevice;
use crate::error::{FsError, Result};
use crate::layout::Layout;

pub struct BitmapAllocator<'a, D: ImageDevice> {
    device: &'a D,
    layout: Layout,
}

fn bit_is_free(bitmap: &[u8], unit: u32) -> bool {
    let byte = bitmap[(unit / 8) as usize];
    (byte >> (unit % 8)) & 1 == 1
}

impl<'a, D: ImageDevice> BitmapAllocator<'a, D> {
    pub fn new(device: &'a D, layout: Layout) -> Self {
        Self { device, layout }
    }

    /// Lee la región completa del bitmap.
    pub fn load(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.layout.bitmap_bytes as usize];
        self.device.read_at(self.layout.bitmap_offset, &mut buf)?;
        Ok(buf)
    }

    fn store(&self, bitmap: &[u8]) -> Result<()> {
        self.device.write_at(self.layout.bitmap_offset, bitmap)
    }

    fn check_unit(&self, unit: u32) -> Result<()> {
        if unit >= self.layout.total_units {
            return Err(FsError::NotAFilesystem(format!(
                "unidad {unit} fuera de rango (total {})",
                self.layout.total_units
            )));
        }
        Ok(())
    }

    pub fn is_free(&self, unit: u32) -> Result<bool> {
        self.check_unit(unit)?;
        let bitmap = self.load()?;
        Ok(bit_is_free(&bitmap, unit))
    }

    pub fn free_count(&self) -> Result<u32> {
        let bitmap = self.load()?;
        Ok((0..self.layout.total_units)
            .filter(|&u| bit_is_free(&bitmap, u))
            .count() as u32)
    }

    /// First-fit desde la unidad 0: devuelve las primeras `count` unidades
    /// libres en orden ascendente. No las reserva.
    pub fn find_free(&self, count: u32) -> Result<Vec<u32>> {
        let bitmap = self.load()?;
        let mut found = Vec::with_capacity(count as usize);

        for unit in 0..self.layout.total_units {
            if found.len() as u32 >= count {
                break;
            }
            if bit_is_free(&bitmap, unit) {
                found.push(unit);
            }
        }

        if (found.len() as u32) < count {
            return Err(FsError::InsufficientSpace {
                requested: count,
                available: found.len() as u32,
            });
        }
        Ok(found)
    }

    /// First-fit de una corrida contigua de `count` unidades libres.
    /// Las entradas de directorio guardan sólo `[start, end]`, así que los
    /// datos tienen que quedar contiguos.
    pub fn find_free_run(&self, count: u32) -> Result<Vec<u32>> {
        let bitmap = self.load()?;
        let mut run_start = 0u32;
        let mut run_len = 0u32;
        let mut total_free = 0u32;

        if count == 0 {
            return Ok(Vec::new());
        }

        for unit in 0..self.layout.total_units {
            if bit_is_free(&bitmap, unit) {
                if run_len == 0 {
                    run_start = unit;
                }
                run_len += 1;
                total_free += 1;
                if run_len == count {
                    return Ok((run_start..run_start + count).collect());
                }
            } else {
                run_len = 0;
            }
        }

        Err(FsError::InsufficientSpace {
            requested: count,
            available: total_free,
        })
    }

    /// Marca las unidades como ocupadas y persiste el bitmap.
    pub fn allocate(&self, units: &[u32]) -> Result<()> {
        self.update(units, false)
    }

    /// Marca las unidades como libres y persiste el bitmap.
    pub fn free(&self, units: &[u32]) -> Result<()> {
        self.update(units, true)
    }

    /// Atajo para liberar un rango inclusivo.
    pub fn free_range(&self, start: u32, end: u32) -> Result<()> {
        let units: Vec<u32> = (start..=end).collect();
        self.free(&units)
    }

    fn update(&self, units: &[u32], free: bool) -> Result<()> {
        let mut bitmap = self.load()?;
        for &unit in units {
            self.check_unit(unit)?;
            let byte = &mut bitmap[(unit / 8) as usize];
            if free {
                *byte |= 1 << (unit % 8);
            } else {
                *byte &= !(1 << (unit % 8));
            }
        }
        self.store(&bitmap)?;
        trace!(count = units.len(), free, "bitmap actualizado");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemImage;

    fn setup(total_units: u32) -> (MemImage, Layout) {
        let layout = Layout::build(total_units).unwrap();
        let dev = MemImage::new(total_units as usize);
        dev.write_at(layout.bitmap_offset, &vec![0xFF; layout.bitmap_bytes as usize])
            .unwrap();
        (dev, layout)
    }

    #[test]
    fn find_free_is_first_fit_and_does_not_reserve() {
        let (dev, layout) = setup(1024);
        let bm = BitmapAllocator::new(&dev, layout);
        bm.allocate(&[0, 1, 3]).unwrap();

        assert_eq!(bm.find_free(3).unwrap(), vec![2, 4, 5]);
        assert_eq!(bm.find_free(3).unwrap(), vec![2, 4, 5]);
        assert!(bm.is_free(2).unwrap());
        assert!(!bm.is_free(3).unwrap());
    }

    #[test]
    fn find_free_run_skips_holes_that_are_too_small() {
        let (dev, layout) = setup(1024);
        let bm = BitmapAllocator::new(&dev, layout);
        bm.allocate(&[0, 1, 3, 6]).unwrap();

        assert_eq!(bm.find_free_run(2).unwrap(), vec![4, 5]);
        assert_eq!(bm.find_free_run(3).unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn free_restores_bits() {
        let (dev, layout) = setup(1024);
        let bm = BitmapAllocator::new(&dev, layout);
        let before = bm.free_count().unwrap();
        bm.allocate(&[10, 11, 12]).unwrap();
        assert_eq!(bm.free_count().unwrap(), before - 3);
        bm.free_range(10, 12).unwrap();
        assert_eq!(bm.free_count().unwrap(), before);
    }

    #[test]
    fn exhaustion_reports_available_units() {
        let (dev, layout) = setup(1024);
        let bm = BitmapAllocator::new(&dev, layout);
        let all: Vec<u32> = (0..1020).collect();
        bm.allocate(&all).unwrap();

        match bm.find_free(5) {
            Err(FsError::InsufficientSpace { requested, available }) => {
                assert_eq!(requested, 5);
                assert_eq!(available, 4);
            }
            other => panic!("se esperaba InsufficientSpace, hubo {other:?}"),
        }
    }

    #[test]
    fn padding_bits_past_total_are_never_returned() {
        // 1001 unidades: el último byte del bitmap tiene 7 bits de relleno.
        let (dev, layout) = setup(1001);
        let bm = BitmapAllocator::new(&dev, layout);
        let all: Vec<u32> = (0..1000).collect();
        bm.allocate(&all).unwrap();

        assert_eq!(bm.find_free(1).unwrap(), vec![1000]);
        assert!(bm.find_free(2).is_err());
        assert_eq!(bm.free_count().unwrap(), 1);
    }
}
