// src/nav.rs
//
// Pila de navegación: (anchor, ruta absoluta), raíz primero. El tope es el
// directorio actual. Nunca queda vacía y la raíz nunca se saca.

use crate::config::ROOT_PATH;
use crate::device::ImageDevice;
use crate::dir::DirTable;
use crate::error::{FsError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavFrame {
    pub anchor: u32,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct NavStack {
    frames: Vec<NavFrame>,
}

fn join_path(base: &str, name: &str) -> String {
    if base == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

impl NavStack {
    pub fn new(root_anchor: u32) -> Self {
        Self {
            frames: vec![NavFrame {
                anchor: root_anchor,
                path: ROOT_PATH.to_owned(),
            }],
        }
    }

    fn top(&self) -> &NavFrame {
        // La pila nunca queda vacía.
        &self.frames[self.frames.len() - 1]
    }

    pub fn root_anchor(&self) -> u32 {
        self.frames[0].anchor
    }

    pub fn current_anchor(&self) -> u32 {
        self.top().anchor
    }

    pub fn current_path(&self) -> &str {
        &self.top().path
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[NavFrame] {
        &self.frames
    }

    /// Resuelve `name` en el directorio actual y lo apila.
    pub fn descend<D: ImageDevice>(&mut self, table: &DirTable<'_, D>, name: &str) -> Result<()> {
        let (_, entry) = table.find_child(self.current_anchor(), name)?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory(name.to_owned()));
        }
        let path = join_path(self.current_path(), name);
        self.frames.push(NavFrame {
            anchor: entry.start,
            path,
        });
        Ok(())
    }

    pub fn ascend(&mut self) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(FsError::AtRoot);
        }
        self.frames.pop();
        Ok(())
    }

    pub fn go_root(&mut self) {
        self.frames.truncate(1);
    }

    /// Corta la pila en el primer frame cuyo anchor cumpla `gone`, dejando
    /// el ancestro más profundo que sobrevive. La raíz no se toca.
    /// Devuelve true si hubo cambios.
    pub fn trim_where(&mut self, gone: impl Fn(u32) -> bool) -> bool {
        match self.frames.iter().skip(1).position(|f| gone(f.anchor)) {
            Some(pos) => {
                self.frames.truncate(pos + 1);
                true
            }
            None => false,
        }
    }

    /// Reescribe la ruta del frame con ese anchor y de los que cuelgan de él
    /// después de renombrar el directorio. Devuelve true si hubo cambios.
    pub fn rename_frame(&mut self, anchor: u32, new_name: &str) -> bool {
        let Some(pos) = self.frames.iter().skip(1).position(|f| f.anchor == anchor) else {
            return false;
        };
        let idx = pos + 1;
        let old_path = self.frames[idx].path.clone();
        let new_path = join_path(&self.frames[idx - 1].path, new_name);

        for frame in &mut self.frames[idx..] {
            let rest = &frame.path[old_path.len()..];
            frame.path = format!("{new_path}{rest}");
        }
        true
    }
}
