//! Backing-package I/O
//!
//! Font sources are stored as UFO 3 packages. [`UfoManager`] owns one
//! [`UfoPackage`] per path for the lifetime of an opened project, so every
//! part of the backend shares the same cached listings.

pub mod filenames;
pub mod glif;
pub mod glyph_set;
pub mod package;
pub mod plist_json;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use glyph_set::GlyphSet;
pub use package::{Groups, KerningPairs, UfoPackage, DEFAULT_LAYER_NAME};

use crate::core::errors::{BackendError, BackendResult};

/// Path-keyed cache of open packages
#[derive(Debug, Default)]
pub struct UfoManager {
    packages: HashMap<PathBuf, UfoPackage>,
}

impl UfoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The package at `path`, opened (or created) on first use.
    pub fn open(&mut self, path: &Path) -> BackendResult<&mut UfoPackage> {
        if !self.packages.contains_key(path) {
            let package = UfoPackage::open(path)?;
            self.packages.insert(path.to_path_buf(), package);
        }
        self.packages
            .get_mut(path)
            .ok_or_else(|| BackendError::invariant(format!("package {path:?} not cached")))
    }

    pub fn get(&self, path: &Path) -> BackendResult<&UfoPackage> {
        self.packages
            .get(path)
            .ok_or_else(|| BackendError::invariant(format!("package {path:?} is not open")))
    }

    pub fn get_mut(&mut self, path: &Path) -> BackendResult<&mut UfoPackage> {
        self.packages
            .get_mut(path)
            .ok_or_else(|| BackendError::invariant(format!("package {path:?} is not open")))
    }

    pub fn glyph_set(&self, path: &Path, layer_name: &str) -> Option<&GlyphSet> {
        self.packages.get(path)?.glyph_set(layer_name)
    }

    pub fn glyph_set_mut(&mut self, path: &Path, layer_name: &str) -> Option<&mut GlyphSet> {
        self.packages.get_mut(path)?.glyph_set_mut(layer_name)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.packages.keys().map(PathBuf::as_path)
    }

    pub fn packages_mut(&mut self) -> impl Iterator<Item = &mut UfoPackage> {
        self.packages.values_mut()
    }
}
