/* Validaciones del fsck. Recorre el árbol desde la raíz y junta errores en
el reporte en lugar de cortar en el primero. */

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use super::{fsck_backend::FsckBackend, fsck_types::*};
use crate::config::{DIR_SPAN, DOTDOT_NAME, DOT_NAME, MIN_CHILD_COUNT, ROOT_PATH};
use crate::error::Result;
use crate::layout::{bitmap_bytes_for, ImageHeader, Layout};

/// Rango vivo encontrado durante el recorrido.
struct Claim {
    owner: String,
    start: u32,
    end: u32,
}

fn join(base: &str, name: &str) -> String {
    if base == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

fn check_header(header: &ImageHeader, bitmap: &[bool], report: &mut FsckReport) {
    // 1. Tamaño del bitmap según el header
    let expected = bitmap_bytes_for(header.total_units);
    if header.bitmap_bytes != expected {
        report.bitmap_error(format!(
            "Header: bitmap_bytes = {}, se esperaban {} para {} unidades",
            header.bitmap_bytes, expected, header.total_units
        ));
    }

    // 2. Un flag por unidad
    if bitmap.len() != header.total_units as usize {
        report.bitmap_error(format!(
            "Bitmap tiene {} entradas en vez de {}",
            bitmap.len(),
            header.total_units
        ));
    }
}

/// Revisa los registros de un directorio. Devuelve los hijos directorio a
/// visitar y el anchor al que apunta su "..".
fn check_directory(
    path: &str,
    anchor: u32,
    entries: &[Dirent],
    total_units: u32,
    bitmap: &[bool],
    claims: &mut Vec<Claim>,
    report: &mut FsckReport,
) -> (Vec<(String, u32)>, Option<u32>) {
    // 1. "." apunta al propio rango
    let dot = entries.iter().find(|e| e.name == DOT_NAME);
    match dot {
        Some(d) if d.is_dir && d.start == anchor && d.end == anchor + DIR_SPAN - 1 => {
            // 2. Contador == slots ocupados, mínimo 2
            let occupied = entries.len() as u32;
            if d.child_count != occupied.max(MIN_CHILD_COUNT) {
                report.dir_error(format!(
                    "{path}: contador = {}, pero hay {} slots ocupados",
                    d.child_count, occupied
                ));
            }
        }
        Some(_) => report.dir_error(format!("{path}: '.' no apunta al propio directorio")),
        None => report.dir_error(format!("{path}: falta la entrada '.'")),
    }

    let dotdot = entries.iter().find(|e| e.name == DOTDOT_NAME);
    let parent = match dotdot {
        Some(d) if d.is_dir => Some(d.start),
        Some(_) => {
            report.dir_error(format!("{path}: '..' no es un directorio"));
            None
        }
        None => {
            report.dir_error(format!("{path}: falta la entrada '..'"));
            None
        }
    };

    // 3. Nombres únicos
    let mut names = HashSet::new();
    for e in entries {
        if !names.insert(e.name.as_str()) {
            report.dir_error(format!("{path}: nombre duplicado '{}'", e.name));
        }
    }

    // 4. Rangos de los hijos
    let mut subdirs = Vec::new();
    for e in entries.iter().filter(|e| !e.is_dot()) {
        let child = join(path, &e.name);

        if e.name.is_empty() {
            report.dir_error(format!("{path}: entrada con nombre vacío en slot {}", e.slot));
        }
        if e.start > e.end || e.end >= total_units {
            report.dir_error(format!(
                "{child}: rango inválido [{}, {}] (total {})",
                e.start, e.end, total_units
            ));
            continue;
        }
        if let Some(free) = (e.start..=e.end).find(|&u| !bitmap.get(u as usize).copied().unwrap_or(false)) {
            report.bitmap_error(format!("{child}: la unidad {free} figura libre en el bitmap"));
        }

        claims.push(Claim {
            owner: child.clone(),
            start: e.start,
            end: e.end,
        });

        if e.is_dir {
            if e.end - e.start + 1 != DIR_SPAN {
                report.dir_error(format!("{child}: directorio de {} unidades", e.end - e.start + 1));
                continue;
            }
            subdirs.push((child, e.start));
        }
    }

    (subdirs, parent)
}

fn check_overlaps(claims: &mut [Claim], report: &mut FsckReport) {
    claims.sort_by_key(|c| (c.start, c.end));
    for pair in claims.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if b.start <= a.end {
            report.bitmap_error(format!(
                "{} [{}, {}] se solapa con {} [{}, {}]",
                a.owner, a.start, a.end, b.owner, b.start, b.end
            ));
        }
    }
}

fn collect_leaks(claims: &[Claim], bitmap: &[bool], report: &mut FsckReport) {
    let mut referenced = vec![false; bitmap.len()];
    for c in claims {
        for u in c.start..=c.end {
            if let Some(slot) = referenced.get_mut(u as usize) {
                *slot = true;
            }
        }
    }
    report.leaked_units = bitmap
        .iter()
        .zip(&referenced)
        .enumerate()
        .filter(|&(_, (&used, &refd))| used && !refd)
        .map(|(u, _)| u as u32)
        .collect();
}

pub fn run_fsck<B: FsckBackend>(backend: &B) -> Result<FsckReport> {
    let mut report = FsckReport::new();

    // --- Paso 1: header y bitmap ---
    let header = backend.load_header()?;
    let bitmap = backend.load_bitmap()?;
    check_header(&header, &bitmap, &mut report);

    let layout = Layout::from_header(&header);
    let root = backend.root_anchor();
    if root != layout.root_anchor {
        report.dir_error(format!(
            "Raíz en {root}, el layout la ubica en {}",
            layout.root_anchor
        ));
    }

    // Header + bitmap + raíz quedan reservados desde la creación
    let mut claims = vec![Claim {
        owner: "<header+bitmap+raíz>".to_owned(),
        start: 0,
        end: root + DIR_SPAN - 1,
    }];

    // --- Paso 2: recorrido desde la raíz ---
    let mut visited: HashMap<u32, String> = HashMap::new();
    let mut parents: Vec<(String, u32)> = Vec::new();
    let mut queue = VecDeque::from([(ROOT_PATH.to_owned(), root)]);
    visited.insert(root, ROOT_PATH.to_owned());

    while let Some((path, anchor)) = queue.pop_front() {
        let entries = match backend.read_dir(anchor) {
            Ok(e) => e,
            Err(e) => {
                report.dir_error(format!("{path}: no se pudo leer el directorio: {e}"));
                continue;
            }
        };
        report.directories += 1;
        report.files += entries.iter().filter(|e| !e.is_dir).count();

        let (subdirs, parent) = check_directory(
            &path,
            anchor,
            &entries,
            header.total_units,
            &bitmap,
            &mut claims,
            &mut report,
        );
        if let Some(p) = parent {
            parents.push((path.clone(), p));
        }

        for (child, start) in subdirs {
            if let Some(first) = visited.get(&start) {
                report.dir_error(format!("{child}: mismo directorio que {first}"));
                continue;
            }
            visited.insert(start, child.clone());
            queue.push_back((child, start));
        }
    }

    // --- Paso 3: cada ".." apunta a un directorio alcanzable ---
    for (path, parent) in parents {
        if !visited.contains_key(&parent) {
            report.dir_error(format!("{path}: '..' apunta a {parent}, que no es un directorio alcanzable"));
        }
    }

    // --- Paso 4: solapamientos y fugas ---
    check_overlaps(&mut claims, &mut report);
    collect_leaks(&claims, &bitmap, &mut report);

    if report.is_clean() {
        debug!(
            directories = report.directories,
            files = report.files,
            leaked = report.leaked_units.len(),
            "fsck sin errores"
        );
    } else {
        warn!(errors = report.errors.len(), "fsck encontró errores");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::fsck::mock::MockBackend;

    const TOTAL: u32 = 2048;
    // 8 + 256 de bitmap
    const ROOT: u32 = 264;
    const SUB: u32 = ROOT + DIR_SPAN;

    fn dirent(slot: usize, name: &str, is_dir: bool, start: u32, end: u32, count: u32) -> Dirent {
        Dirent {
            slot,
            name: name.to_owned(),
            is_dir,
            start,
            end,
            child_count: count,
        }
    }

    fn dots(anchor: u32, parent: u32, count: u32) -> Vec<Dirent> {
        vec![
            dirent(0, ".", true, anchor, anchor + DIR_SPAN - 1, count),
            dirent(1, "..", true, parent, parent + DIR_SPAN - 1, 2),
        ]
    }

    fn used(ranges: &[(u32, u32)]) -> Vec<bool> {
        let mut bm = vec![false; TOTAL as usize];
        for &(s, e) in ranges {
            for u in s..=e {
                bm[u as usize] = true;
            }
        }
        bm
    }

    /// "/" con un subdirectorio "sub" y un archivo "f".
    fn healthy() -> MockBackend {
        let mut root = dots(ROOT, ROOT, 4);
        root.push(dirent(2, "sub", true, SUB, SUB + DIR_SPAN - 1, 2));
        root.push(dirent(3, "f", false, 1500, 1509, 0));

        let mut dirs = HashMap::new();
        dirs.insert(ROOT, root);
        dirs.insert(SUB, dots(SUB, ROOT, 2));

        MockBackend {
            header: ImageHeader {
                total_units: TOTAL,
                bitmap_bytes: 256,
            },
            bitmap: used(&[(0, SUB + DIR_SPAN - 1), (1500, 1509)]),
            root: ROOT,
            dirs,
        }
    }

    #[test]
    fn healthy_tree_is_clean() {
        let rep = run_fsck(&healthy()).unwrap();
        assert!(rep.is_clean(), "{:?}", rep.errors);
        assert_eq!(rep.directories, 2);
        assert_eq!(rep.files, 1);
        assert!(rep.leaked_units.is_empty());
    }

    #[test]
    fn counter_mismatch_is_reported() {
        let mut b = healthy();
        b.dirs.get_mut(&ROOT).unwrap()[0].child_count = 3;
        let rep = run_fsck(&b).unwrap();
        assert!(!rep.dirs_ok);
        assert!(rep.errors.iter().any(|e| e.contains("contador")));
    }

    #[test]
    fn overlapping_ranges_are_reported() {
        let mut b = healthy();
        b.dirs
            .get_mut(&ROOT)
            .unwrap()
            .push(dirent(4, "g", false, 1505, 1512, 0));
        b.dirs.get_mut(&ROOT).unwrap()[0].child_count = 5;
        b.bitmap = used(&[(0, SUB + DIR_SPAN - 1), (1500, 1512)]);

        let rep = run_fsck(&b).unwrap();
        assert!(!rep.bitmap_ok);
        assert!(rep.errors.iter().any(|e| e.contains("se solapa")));
    }

    #[test]
    fn free_bit_under_live_entry_is_reported() {
        let mut b = healthy();
        b.bitmap[1503] = false;
        let rep = run_fsck(&b).unwrap();
        assert!(!rep.bitmap_ok);
        assert!(rep.errors.iter().any(|e| e.contains("1503")));
    }

    #[test]
    fn dangling_parent_is_reported() {
        let mut b = healthy();
        b.dirs.get_mut(&SUB).unwrap()[1].start = 1700;
        let rep = run_fsck(&b).unwrap();
        assert!(!rep.dirs_ok);
        assert!(rep.errors.iter().any(|e| e.contains("'..'")));
    }

    #[test]
    fn unreferenced_units_are_leaks_not_errors() {
        let mut b = healthy();
        b.bitmap[1800] = true;
        b.bitmap[1801] = true;
        let rep = run_fsck(&b).unwrap();
        assert!(rep.is_clean());
        assert_eq!(rep.leaked_units, vec![1800, 1801]);
    }

    #[test]
    fn duplicate_names_are_reported() {
        let mut b = healthy();
        b.dirs
            .get_mut(&ROOT)
            .unwrap()
            .push(dirent(4, "f", false, 1600, 1600, 0));
        b.dirs.get_mut(&ROOT).unwrap()[0].child_count = 5;
        b.bitmap[1600] = true;
        let rep = run_fsck(&b).unwrap();
        assert!(rep.errors.iter().any(|e| e.contains("duplicado")));
    }
}
