//! One layer directory of a UFO package
//!
//! A glyph set is a directory of `.glif` files plus the `contents.plist`
//! listing that maps glyph names to file names. The listing is cached in
//! memory and written back explicitly.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use super::filenames::glyph_file_name;
use crate::core::errors::{BackendError, BackendResult};

const CONTENTS_FILE: &str = "contents.plist";

#[derive(Debug, Clone)]
pub struct GlyphSet {
    dir: PathBuf,
    contents: BTreeMap<String, String>,
}

impl GlyphSet {
    /// Load the listing of `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> BackendResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| BackendError::io(dir, e))?;
        }
        let mut glyph_set = Self {
            dir: dir.to_path_buf(),
            contents: BTreeMap::new(),
        };
        glyph_set.rebuild_contents()?;
        Ok(glyph_set)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, glyph_name: &str) -> bool {
        self.contents.contains_key(glyph_name)
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contents.keys().map(String::as_str)
    }

    /// `(glyph name, file name)` pairs of the listing.
    pub fn contents(&self) -> &BTreeMap<String, String> {
        &self.contents
    }

    pub fn glif_path(&self, glyph_name: &str) -> Option<PathBuf> {
        self.contents
            .get(glyph_name)
            .map(|file_name| self.dir.join(file_name))
    }

    pub fn read_glyph(&self, glyph_name: &str) -> BackendResult<norad::Glyph> {
        let path = self
            .glif_path(glyph_name)
            .ok_or_else(|| BackendError::GlyphNotFound(glyph_name.to_string()))?;
        norad::Glyph::load(&path).map_err(|source| BackendError::GlifLoad { path, source })
    }

    /// Write `glyph` under `glyph_name`. Returns true when the glyph is new
    /// to this set, meaning the listing needs to be written.
    pub fn write_glyph(&mut self, glyph_name: &str, glyph: &norad::Glyph) -> BackendResult<bool> {
        let is_new = !self.contents.contains_key(glyph_name);
        if is_new {
            let existing: HashSet<String> =
                self.contents.values().map(|name| name.to_lowercase()).collect();
            let file_name = glyph_file_name(glyph_name, &existing);
            self.contents.insert(glyph_name.to_string(), file_name);
        }
        let path = self.dir.join(&self.contents[glyph_name]);
        let xml = glyph.encode_xml().map_err(|source| BackendError::GlifWrite {
            name: glyph_name.to_string(),
            source,
        })?;
        fs::write(&path, xml).map_err(|e| BackendError::io(&path, e))?;
        Ok(is_new)
    }

    pub fn delete_glyph(&mut self, glyph_name: &str) -> BackendResult<()> {
        let file_name = self
            .contents
            .remove(glyph_name)
            .ok_or_else(|| BackendError::GlyphNotFound(glyph_name.to_string()))?;
        let path = self.dir.join(file_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::io(&path, e)),
        }
    }

    pub fn write_contents(&self) -> BackendResult<()> {
        let path = self.dir.join(CONTENTS_FILE);
        let dict: plist::Dictionary = self
            .contents
            .iter()
            .map(|(name, file)| (name.clone(), plist::Value::String(file.clone())))
            .collect();
        plist::to_file_xml(&path, &plist::Value::Dictionary(dict))
            .map_err(|e| BackendError::plist(&path, e))
    }

    /// Re-read `contents.plist` from disk.
    pub fn rebuild_contents(&mut self) -> BackendResult<()> {
        let path = self.dir.join(CONTENTS_FILE);
        self.contents.clear();
        if !path.exists() {
            return Ok(());
        }
        let value = plist::Value::from_file(&path).map_err(|e| BackendError::plist(&path, e))?;
        if let Some(dict) = value.as_dictionary() {
            for (name, file) in dict {
                if let Some(file) = file.as_string() {
                    self.contents.insert(name.clone(), file.to_string());
                }
            }
        }
        debug!("Listed {} glyphs in {:?}", self.contents.len(), self.dir);
        Ok(())
    }

    pub fn modification_time(&self, glyph_name: &str) -> Option<SystemTime> {
        let path = self.glif_path(glyph_name)?;
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = GlyphSet::open(&dir.path().join("glyphs")).unwrap();
        assert!(set.is_empty());

        let glyph = norad::Glyph::new("A");
        assert!(set.write_glyph("A", &glyph).unwrap());
        assert!(!set.write_glyph("A", &glyph).unwrap());
        set.write_contents().unwrap();
        assert!(dir.path().join("glyphs/A_.glif").exists());

        let reopened = GlyphSet::open(&dir.path().join("glyphs")).unwrap();
        assert!(reopened.contains("A"));
        assert_eq!(reopened.read_glyph("A").unwrap().name().as_str(), "A");
        assert!(reopened.modification_time("A").is_some());

        set.delete_glyph("A").unwrap();
        assert!(!dir.path().join("glyphs/A_.glif").exists());
        assert!(matches!(
            set.delete_glyph("A"),
            Err(BackendError::GlyphNotFound(_))
        ));
    }
}
