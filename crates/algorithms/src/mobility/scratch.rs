//! Intermediate raster tracking
//!
//! Every intermediate of a run is registered with a [`ScratchTracker`].
//! With a scratch directory each intermediate is also written there as
//! GeoTIFF for inspection. Dropping the tracker removes those files, on
//! success and on every error path alike.

use ccm_core::io::write_geotiff;
use ccm_core::raster::Raster;
use ccm_core::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug)]
struct ScratchEntry {
    name: String,
    path: Option<PathBuf>,
}

/// Registry of intermediate rasters, released on drop
#[derive(Debug, Default)]
pub struct ScratchTracker {
    dir: Option<PathBuf>,
    keep: bool,
    entries: Vec<ScratchEntry>,
}

impl ScratchTracker {
    /// Track names only; nothing touches the filesystem
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Persist intermediates under `dir`, creating it if needed
    pub fn on_disk(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: Some(dir),
            keep: false,
            entries: Vec::new(),
        })
    }

    /// Leave persisted intermediates in place on release
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Register an intermediate raster under `name`
    pub fn register(&mut self, name: &str, raster: &Raster<f64>) -> Result<()> {
        let path = match &self.dir {
            Some(dir) => {
                let path = dir.join(format!("{}.tif", name));
                write_geotiff(raster, &path, None)?;
                Some(path)
            }
            None => None,
        };
        debug!(name, path = ?path, "registered intermediate");

        if !self.entries.iter().any(|e| e.name == name) {
            self.entries.push(ScratchEntry {
                name: name.to_string(),
                path,
            });
        }
        Ok(())
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Files written for registered intermediates
    pub fn paths(&self) -> Vec<&Path> {
        self.entries.iter().filter_map(|e| e.path.as_deref()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every persisted intermediate and forget all entries.
    ///
    /// Files already gone are skipped; other removal failures are logged.
    /// Returns the number of files removed.
    pub fn release(&mut self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        if self.keep {
            info!(count = self.entries.len(), dir = ?self.dir, "keeping intermediates");
            self.entries.clear();
            return 0;
        }

        let mut removed = 0;
        for entry in self.entries.drain(..) {
            let Some(path) = entry.path else { continue };
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove intermediate"),
            }
        }
        debug!(removed, "released intermediates");
        removed
    }
}

impl Drop for ScratchTracker {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster() -> Raster<f64> {
        Raster::filled(4, 4, 0.5)
    }

    #[test]
    fn test_in_memory_tracks_names() {
        let mut scratch = ScratchTracker::in_memory();
        scratch.register("slope", &raster()).unwrap();
        scratch.register("f1", &raster()).unwrap();
        scratch.register("slope", &raster()).unwrap();
        assert_eq!(scratch.names(), vec!["slope", "f1"]);
        assert!(scratch.paths().is_empty());
        assert_eq!(scratch.release(), 0);
        assert!(scratch.is_empty());
    }

    #[test]
    fn test_on_disk_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let mut scratch = ScratchTracker::on_disk(dir.path()).unwrap();
            scratch.register("curvature", &raster()).unwrap();
            path = scratch.paths()[0].to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchTracker::on_disk(dir.path()).unwrap();
        scratch.register("a", &raster()).unwrap();
        scratch.register("b", &raster()).unwrap();
        std::fs::remove_file(dir.path().join("a.tif")).unwrap();

        assert_eq!(scratch.release(), 1);
        assert_eq!(scratch.release(), 0);
    }

    #[test]
    fn test_keep_leaves_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut scratch = ScratchTracker::on_disk(dir.path()).unwrap().keep(true);
            scratch.register("f2", &raster()).unwrap();
        }
        assert!(dir.path().join("f2.tif").exists());
    }
}
