use std::path::Path;

use tracing::{debug, info, warn};

use crate::bitmap::BitmapAllocator;
use crate::config::{DIR_SPAN, DOTDOT_NAME, DOT_NAME, HEADER_SIZE, MIN_CHILD_COUNT, ROOT_PATH, UNIT_SIZE};
use crate::device::{FileImage, ImageDevice};
use crate::dir::{dir_end, DirTable};
use crate::dirent::{validate_name, DirEntryDisk, EntryKind};
use crate::error::{FsError, Result};
use crate::fsck::{self, FsckReport};
use crate::layout::{bitmap_bytes_for, units_for, ImageHeader, Layout};
use crate::nav::NavStack;

const ZERO_CHUNK: usize = 64 * 1024;

// -----------------------------------------------------------------------------
// Vistas para el llamador
// -----------------------------------------------------------------------------

/// Una entrada tal como la ve el llamador de `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub start: u32,
    pub end: u32,
    /// Tamaño lógico en bytes: (end - start + 1) * UNIT_SIZE.
    pub size: u64,
    pub child_count: u32,
}

impl EntryInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl From<DirEntryDisk> for EntryInfo {
    fn from(e: DirEntryDisk) -> Self {
        Self {
            size: e.span() as u64 * UNIT_SIZE as u64,
            name: e.name,
            kind: e.kind,
            start: e.start,
            end: e.end,
            child_count: e.child_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub total_units: u32,
    pub free_units: u32,
}

impl Usage {
    pub fn used_units(&self) -> u32 {
        self.total_units - self.free_units
    }
}

// -----------------------------------------------------------------------------
// Volumen montado
// -----------------------------------------------------------------------------

/// Sesión sobre una imagen: el dispositivo abierto más la pila de navegación.
/// Todas las operaciones escriben directo al dispositivo y no son atómicas:
/// una falla a mitad de camino puede dejar unidades reservadas sin dueño o
/// un contador desfasado.
pub struct Volume<D: ImageDevice = FileImage> {
    device: D,
    layout: Layout,
    nav: NavStack,
}

impl Volume<FileImage> {
    /// Crea el archivo de imagen con `unit_count` unidades y lo formatea.
    pub fn create_image(path: &Path, unit_count: u32) -> Result<Self> {
        let layout = Layout::build(unit_count)?;
        let device = FileImage::create(path, layout.image_bytes())?;
        info!(path = %path.display(), unit_count, "creando imagen");
        Self::write_fresh(device, layout)
    }

    /// Monta una imagen existente.
    pub fn mount(path: &Path) -> Result<Self> {
        if !path.is_file() {
            warn!(path = %path.display(), "imagen inexistente");
            return Err(FsError::NotAFilesystem(format!(
                "no existe la imagen {}",
                path.display()
            )));
        }
        let device = FileImage::open(path)?;
        info!(path = %path.display(), "montando imagen");
        Self::open(device)
    }
}

impl<D: ImageDevice> Volume<D> {
    /// Formatea un dispositivo ya abierto.
    pub fn format(device: D, unit_count: u32) -> Result<Self> {
        let layout = Layout::build(unit_count)?;
        let len = device.len()?;
        if len < layout.image_bytes() {
            return Err(FsError::InsufficientSpace {
                requested: unit_count,
                available: (len / UNIT_SIZE as u64).min(u32::MAX as u64) as u32,
            });
        }
        Self::write_fresh(device, layout)
    }

    fn write_fresh(device: D, layout: Layout) -> Result<Self> {
        // 1. Header
        device.write_at(0, &layout.header().encode())?;

        // 2. Bitmap todo libre, luego reservar header + bitmap + raíz
        device.write_at(layout.bitmap_offset, &vec![0xFF; layout.bitmap_bytes as usize])?;
        let reserved: Vec<u32> = (0..layout.reserved_units()).collect();
        BitmapAllocator::new(&device, layout).allocate(&reserved)?;

        // 3. Raíz: "." y ".." apuntan a sí misma
        DirTable::new(&device).init_directory(layout.root_anchor, layout.root_anchor)?;

        // 4. Resto de unidades en cero
        let mut offset = layout.reserved_units() as u64 * UNIT_SIZE as u64;
        let zeros = vec![0u8; ZERO_CHUNK];
        while offset < layout.image_bytes() {
            let n = (layout.image_bytes() - offset).min(ZERO_CHUNK as u64) as usize;
            device.write_at(offset, &zeros[..n])?;
            offset += n as u64;
        }
        device.flush()?;

        info!(
            total_units = layout.total_units,
            bitmap_bytes = layout.bitmap_bytes,
            root = layout.root_anchor,
            "imagen formateada"
        );

        Ok(Self {
            device,
            nav: NavStack::new(layout.root_anchor),
            layout,
        })
    }

    /// Lee el header, ubica la raíz decodificando el primer registro de
    /// directorio e inicializa la pila de navegación en ella.
    pub fn open(device: D) -> Result<Self> {
        match Self::read_layout(&device) {
            Ok(layout) => {
                debug!(root = layout.root_anchor, "imagen montada");
                Ok(Self {
                    device,
                    nav: NavStack::new(layout.root_anchor),
                    layout,
                })
            }
            Err(e) => {
                warn!(error = %e, "imagen rechazada");
                Err(e)
            }
        }
    }

    fn read_layout(device: &D) -> Result<Layout> {
        let malformed = FsError::NotAFilesystem;

        let len = device.len()?;
        if len < HEADER_SIZE as u64 {
            return Err(malformed(format!("imagen de {len} bytes, sin header")));
        }

        let mut raw = [0u8; HEADER_SIZE as usize];
        device.read_at(0, &mut raw)?;
        let header = ImageHeader::decode(&raw);

        if header.bitmap_bytes != bitmap_bytes_for(header.total_units) {
            return Err(malformed(format!(
                "bitmap de {} bytes no corresponde a {} unidades",
                header.bitmap_bytes, header.total_units
            )));
        }

        let layout = Layout::from_header(&header);
        if layout.reserved_units() > header.total_units || len < layout.image_bytes() {
            return Err(malformed(format!(
                "imagen de {len} bytes demasiado chica para {} unidades",
                header.total_units
            )));
        }

        let first = DirTable::new(device).read_slot(layout.root_anchor, 0)?;
        match first {
            Some(e) if e.is_dir() && e.name == DOT_NAME && e.start == layout.root_anchor => {
                Ok(layout)
            }
            _ => Err(malformed("no hay directorio raíz válido".to_owned())),
        }
    }

    // --------- Accesores ---------

    fn table(&self) -> DirTable<'_, D> {
        DirTable::new(&self.device)
    }

    fn bitmap(&self) -> BitmapAllocator<'_, D> {
        BitmapAllocator::new(&self.device, self.layout)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn header(&self) -> ImageHeader {
        self.layout.header()
    }

    pub fn root_anchor(&self) -> u32 {
        self.layout.root_anchor
    }

    pub fn current_dir(&self) -> u32 {
        self.nav.current_anchor()
    }

    pub fn current_path(&self) -> &str {
        self.nav.current_path()
    }

    pub fn usage(&self) -> Result<Usage> {
        Ok(Usage {
            total_units: self.layout.total_units,
            free_units: self.bitmap().free_count()?,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()
    }

    /// Corre el chequeo de consistencia sobre la imagen montada.
    pub fn check(&self) -> Result<FsckReport> {
        fsck::run_fsck(self)
    }

    // --------- Listado ---------

    pub fn list(&self, dir: u32) -> Result<Vec<EntryInfo>> {
        Ok(self.table().list(dir)?.into_iter().map(EntryInfo::from).collect())
    }

    pub fn list_current(&self) -> Result<Vec<EntryInfo>> {
        self.list(self.current_dir())
    }

    /// Anchor del padre según el ".." del directorio. Si no hay "..", la raíz.
    pub fn get_parent(&self, dir: u32) -> Result<u32> {
        match self.table().find_by_name(dir, DOTDOT_NAME) {
            Ok((_, e)) if e.is_dir() => Ok(e.start),
            Ok(_) | Err(FsError::NotFound(_)) => Ok(self.layout.root_anchor),
            Err(e) => Err(e),
        }
    }

    // --------- Archivos ---------

    pub fn copy_in(&mut self, data: &[u8], name: &str) -> Result<EntryInfo> {
        self.copy_in_at(self.current_dir(), data, name)
    }

    /// Guarda `data` como archivo `name` dentro del directorio `dir`.
    pub fn copy_in_at(&mut self, dir: u32, data: &[u8], name: &str) -> Result<EntryInfo> {
        debug!(dir, name, len = data.len(), "copy_in");
        validate_name(name)?;

        let table = self.table();
        table.require_dir(dir)?;
        if table.contains(dir, name)? {
            return Err(FsError::NameConflict(name.to_owned()));
        }
        if data.is_empty() {
            return Err(FsError::EmptyContent);
        }

        let bitmap = self.bitmap();
        let len = u32::try_from(data.len()).map_err(|_| FsError::InsufficientSpace {
            requested: u32::MAX,
            available: self.layout.total_units,
        })?;
        let units = bitmap.find_free_run(units_for(len))?;
        let slot = table.find_free_slot(dir)?;

        let start = units[0];
        let end = units[units.len() - 1];

        // Datos, con la última unidad rellenada con ceros
        let padded_len = units.len() * UNIT_SIZE as usize;
        let offset = start as u64 * UNIT_SIZE as u64;
        if padded_len == data.len() {
            self.device.write_at(offset, data)?;
        } else {
            let mut buf = data.to_vec();
            buf.resize(padded_len, 0);
            self.device.write_at(offset, &buf)?;
        }

        let entry = DirEntryDisk::file(name, start, end);
        table.write_slot(dir, slot, &entry)?;
        bitmap.allocate(&units)?;
        table.adjust_count(dir, 1)?;

        Ok(entry.into())
    }

    pub fn copy_out(&self, name: &str) -> Result<Vec<u8>> {
        self.copy_out_at(self.current_dir(), name)
    }

    /// Lee el contenido completo del archivo `name`. El largo sale sólo del
    /// rango guardado en la entrada.
    pub fn copy_out_at(&self, dir: u32, name: &str) -> Result<Vec<u8>> {
        debug!(dir, name, "copy_out");
        let entry = self
            .table()
            .list(dir)?
            .into_iter()
            .find(|e| e.name == name && !e.is_dir())
            .ok_or_else(|| FsError::NotFound(name.to_owned()))?;

        let size = entry.span() as usize * UNIT_SIZE as usize;
        let mut data = vec![0u8; size];
        self.device
            .read_at(entry.start as u64 * UNIT_SIZE as u64, &mut data)?;
        Ok(data)
    }

    // --------- Borrado ---------

    pub fn delete(&mut self, name: &str, is_dir: bool) -> Result<()> {
        self.delete_at(self.current_dir(), name, is_dir)
    }

    /// Borra un archivo, o un directorio con todo su contenido.
    pub fn delete_at(&mut self, dir: u32, name: &str, is_dir: bool) -> Result<()> {
        debug!(dir, name, is_dir, "delete");
        self.table().require_dir(dir)?;
        let (slot, entry) = self.table().find_child(dir, name)?;
        if entry.is_dir() != is_dir {
            return Err(FsError::NotFound(name.to_owned()));
        }

        let mut removed = Vec::new();
        if is_dir {
            removed.push(entry.start);
            self.delete_contents(entry.start, &mut removed)?;
        }

        self.bitmap().free_range(entry.start, entry.end)?;
        let table = self.table();
        table.clear_slot(dir, slot)?;
        table.adjust_count(dir, -1)?;

        if !removed.is_empty() && self.nav.trim_where(|a| removed.contains(&a)) {
            warn!(path = self.nav.current_path(), "directorio actual borrado, pila recortada");
        }
        Ok(())
    }

    /// Borra en profundidad todo lo que cuelga de `anchor`. Cada hijo directo
    /// descuenta uno del contador de `anchor`.
    fn delete_contents(&self, anchor: u32, removed: &mut Vec<u32>) -> Result<()> {
        let table = self.table();
        let children: Vec<(usize, DirEntryDisk)> = table
            .read_all(anchor)?
            .into_iter()
            .filter(|(_, e)| !e.is_dot())
            .collect();

        for (slot, child) in children {
            if child.is_dir() && !removed.contains(&child.start) {
                removed.push(child.start);
                self.delete_contents(child.start, removed)?;
            }
            self.bitmap().free_range(child.start, child.end)?;
            table.clear_slot(anchor, slot)?;
            table.adjust_count(anchor, -1)?;
        }
        Ok(())
    }

    // --------- Renombrar ---------

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        self.rename_at(self.current_dir(), old, new)
    }

    /// Reescribe sólo el nombre; rango y tipo quedan igual.
    pub fn rename_at(&mut self, dir: u32, old: &str, new: &str) -> Result<()> {
        debug!(dir, old, new, "rename");
        validate_name(new)?;
        let table = self.table();
        table.require_dir(dir)?;
        if table.contains(dir, new)? {
            return Err(FsError::NameConflict(new.to_owned()));
        }
        let (slot, entry) = table.find_child(dir, old)?;
        table.write_name(dir, slot, new)?;

        if entry.is_dir() && self.nav.rename_frame(entry.start, new) {
            debug!(path = self.nav.current_path(), "ruta actual renombrada");
        }
        Ok(())
    }

    // --------- Directorios ---------

    pub fn mkdir(&mut self, name: &str) -> Result<u32> {
        self.mkdir_at(self.current_dir(), name)
    }

    /// Crea un directorio vacío dentro de `parent` y devuelve su anchor.
    pub fn mkdir_at(&mut self, parent: u32, name: &str) -> Result<u32> {
        debug!(parent, name, "mkdir");
        validate_name(name)?;

        let table = self.table();
        table.require_dir(parent)?;
        if table.contains(parent, name)? {
            return Err(FsError::NameConflict(name.to_owned()));
        }

        let bitmap = self.bitmap();
        let units = bitmap.find_free_run(DIR_SPAN)?;
        let slot = table.find_free_slot(parent)?;
        let anchor = units[0];

        table.init_directory(anchor, parent)?;
        table.write_slot(parent, slot, &DirEntryDisk::dir(name, anchor, dir_end(anchor), MIN_CHILD_COUNT))?;
        bitmap.allocate(&units)?;
        table.adjust_count(parent, 1)?;

        Ok(anchor)
    }

    /// ".." sube, "/" vuelve a la raíz, cualquier otro nombre baja.
    pub fn change_dir(&mut self, name: &str) -> Result<()> {
        debug!(name, "change_dir");
        match name {
            DOTDOT_NAME => self.nav.ascend(),
            ROOT_PATH => {
                self.nav.go_root();
                Ok(())
            }
            _ => {
                let table = DirTable::new(&self.device);
                self.nav.descend(&table, name)
            }
        }
    }

    /// Navega una ruta de varios componentes ("/a/b", "a/../c"). Si algún
    /// componente falla, la pila queda como estaba.
    pub fn change_path(&mut self, path: &str) -> Result<()> {
        debug!(path, "change_path");
        let mut nav = self.nav.clone();
        walk(&mut nav, &DirTable::new(&self.device), path)?;
        self.nav = nav;
        Ok(())
    }

    /// Anchor del directorio en `path`, sin cambiar el directorio actual.
    pub fn resolve_dir(&self, path: &str) -> Result<u32> {
        let mut nav = self.nav.clone();
        walk(&mut nav, &self.table(), path)?;
        Ok(nav.current_anchor())
    }

    // --------- Mover ---------

    pub fn move_entry(&mut self, name: &str, dest_dir: u32, new_name: Option<&str>) -> Result<()> {
        self.move_entry_from(self.current_dir(), name, dest_dir, new_name)
    }

    /// Mueve la entrada `name` de `src_dir` a `dest_dir`. Sólo se mueve el
    /// registro: las unidades no se reubican y el ".." de un directorio
    /// movido sigue apuntando al padre anterior.
    pub fn move_entry_from(
        &mut self,
        src_dir: u32,
        name: &str,
        dest_dir: u32,
        new_name: Option<&str>,
    ) -> Result<()> {
        let target = new_name.unwrap_or(name);
        debug!(src_dir, name, dest_dir, target, "move");
        validate_name(target)?;

        let table = self.table();
        table.require_dir(src_dir)?;
        table.require_dir(dest_dir)?;
        let (src_slot, mut entry) = table.find_child(src_dir, name)?;

        if entry.is_dir() && (entry.start == dest_dir || self.subtree_contains(entry.start, dest_dir)?) {
            return Err(FsError::InvalidMove(name.to_owned()));
        }
        if table.contains(dest_dir, target)? {
            return Err(FsError::NameConflict(target.to_owned()));
        }
        let dest_slot = table.find_free_slot(dest_dir)?;

        entry.name = target.to_owned();
        table.write_slot(dest_dir, dest_slot, &entry)?;
        table.clear_slot(src_dir, src_slot)?;
        table.adjust_count(src_dir, -1)?;
        table.adjust_count(dest_dir, 1)?;

        if entry.is_dir() && self.nav.trim_where(|a| a == entry.start) {
            warn!(path = self.nav.current_path(), "directorio actual movido, pila recortada");
        }
        Ok(())
    }

    /// true si `target` es un directorio descendiente de `root`.
    fn subtree_contains(&self, root: u32, target: u32) -> Result<bool> {
        let table = self.table();
        let mut pending = vec![root];
        let mut seen = vec![root];

        while let Some(anchor) = pending.pop() {
            for child in table.list(anchor)?.into_iter().filter(|e| e.is_dir()) {
                if child.start == target {
                    return Ok(true);
                }
                if !seen.contains(&child.start) {
                    seen.push(child.start);
                    pending.push(child.start);
                }
            }
        }
        Ok(false)
    }
}

/// Aplica cada componente de `path` sobre `nav`.
fn walk<D: ImageDevice>(nav: &mut NavStack, table: &DirTable<'_, D>, path: &str) -> Result<()> {
    if path.starts_with('/') {
        nav.go_root();
    }
    for component in path.split('/').filter(|c| !c.is_empty() && *c != DOT_NAME) {
        if component == DOTDOT_NAME {
            nav.ascend()?;
        } else {
            nav.descend(table, component)?;
        }
    }
    Ok(())
}
