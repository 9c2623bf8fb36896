use std::fs;
use std::path::{Path, PathBuf};

use crate::counter::Counter;
use crate::error::CacheError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "bmp", "cr2", "gif", "png", "ico", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Catalog: the images next to the start file plus the navigation cursor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Catalog {
    paths: Vec<PathBuf>,
    cursor: Counter,
}

impl Catalog {
    /// Enumerate the start file's directory and position the cursor on it.
    ///
    /// Files keep the order `read_dir` yields unless `sorted` is set.
    pub fn scan(start: &Path, sorted: bool) -> Result<Self, CacheError> {
        let dir = match start.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let entries = fs::read_dir(&dir).map_err(|source| CacheError::ReadDir {
            dir: dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(ft) = entry.file_type() else { continue };
            let p = entry.path();
            // Symlinks count when they resolve to a regular file.
            let regular = ft.is_file() || (ft.is_symlink() && p.is_file());
            if regular && is_image_file(&p) {
                paths.push(p);
            }
        }

        if sorted {
            paths.sort();
        }

        log::info!("Found {} images in {:?}", paths.len(), dir);

        let start_name = start
            .file_name()
            .ok_or_else(|| CacheError::NotFound(start.to_path_buf()))?;
        let start_idx = paths
            .iter()
            .position(|p| p.file_name() == Some(start_name))
            .ok_or_else(|| CacheError::NotFound(start.to_path_buf()))?;

        Self::with_cursor(paths, start_idx)
    }

    /// Build over an explicit list; `start` must be one of `paths`.
    pub fn from_paths(paths: Vec<PathBuf>, start: &Path) -> Result<Self, CacheError> {
        let start_idx = paths
            .iter()
            .position(|p| p == start)
            .ok_or_else(|| CacheError::NotFound(start.to_path_buf()))?;
        Self::with_cursor(paths, start_idx)
    }

    fn with_cursor(paths: Vec<PathBuf>, start_idx: usize) -> Result<Self, CacheError> {
        let mut cursor = Counter::wrapping(0, paths.len() as i64 - 1, 1);
        cursor
            .set(start_idx as i64)
            .map_err(|_| CacheError::NotFound(paths[0].clone()))?;
        Ok(Self { paths, cursor })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn path(&self, idx: usize) -> &Path {
        &self.paths[idx]
    }

    pub fn current_index(&self) -> usize {
        self.cursor.get() as usize
    }

    /// Index `offset` steps away from the cursor, wrapping around.
    pub fn neighbor(&self, offset: i64) -> usize {
        self.cursor.offset(offset) as usize
    }

    /// Move the cursor one step forward (`dir > 0`) or back.
    pub fn advance(&mut self, dir: i32) -> usize {
        if dir > 0 {
            self.cursor.increment();
        } else if dir < 0 {
            self.cursor.decrement();
        }
        self.current_index()
    }
}
