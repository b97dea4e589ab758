//! Creating packages, layers and sources on demand

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::fontinfo::{inherited_info_attributes, DEFAULT_UNITS_PER_EM};
use super::registry::{DsSource, ItemList, UfoLayer};
use super::{make_source_identifier, DesignspaceBackend, UniqueNames};
use crate::core::errors::{BackendError, BackendResult};
use crate::space::Location;
use crate::ufo::plist_json::number_value;
use crate::ufo::UfoPackage;

/// Font info of a brand-new single-package project.
const NEW_FONT_INFO: &[(&str, f64)] = &[
    ("unitsPerEm", 1000.0),
    ("ascender", 750.0),
    ("descender", -250.0),
    ("xHeight", 500.0),
    ("capHeight", 750.0),
];

/// Replace whatever is at `path` with an empty package carrying the default
/// vertical metrics.
pub(super) fn create_fresh_ufo(path: &Path) -> BackendResult<()> {
    if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| BackendError::io(path, e))?;
    } else if path.exists() {
        fs::remove_file(path).map_err(|e| BackendError::io(path, e))?;
    }
    let package = UfoPackage::create(path)?;
    let info: plist::Dictionary = NEW_FONT_INFO
        .iter()
        .map(|(key, value)| (key.to_string(), number_value(*value)))
        .collect();
    package.write_info(&info)
}

/// `<ufo_dir>/<suggested>[#k].ufo`, unique among the packages already there.
fn unique_ufo_path(ufo_dir: &Path, suggested: &str) -> BackendResult<PathBuf> {
    let mut stems = Vec::new();
    if ufo_dir.is_dir() {
        let entries = fs::read_dir(ufo_dir).map_err(|e| BackendError::io(ufo_dir, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "ufo") {
                if let Some(stem) = path.file_stem() {
                    stems.push(stem.to_string_lossy().into_owned());
                }
            }
        }
    }
    let file_name = format!("{}.ufo", UniqueNames::with_existing(stems).make(suggested));
    let path = ufo_dir.join(file_name);
    if path.exists() {
        return Err(BackendError::invariant(format!(
            "unique package path {path:?} already exists"
        )));
    }
    Ok(path)
}

/// How a newly created layer is named for clients
#[derive(Debug, Clone, Copy)]
pub(super) enum NewLayerAlias<'a> {
    /// Exactly this alias
    Exact(&'a str),
    /// `<source>^<layer name>`, as a reload would name it
    OwnedBy(&'a str),
}

impl DesignspaceBackend {
    /// Font info of the default package, read once.
    pub(super) fn default_font_info(&mut self) -> BackendResult<plist::Dictionary> {
        if let Some(info) = &self.default_font_info {
            return Ok(info.clone());
        }
        let info = match self.default_source() {
            Some(source) => {
                let path = source.layer.path.clone();
                self.ufos.open(&path)?.read_info()?
            }
            None => plist::Dictionary::new(),
        };
        self.default_font_info = Some(info.clone());
        Ok(info)
    }

    /// A new package next to the existing ones, named after the project and
    /// `source_name`, inheriting naming metadata and units per em from the
    /// default package.
    pub(super) fn create_ufo(&mut self, source_name: &str, alias: &str) -> BackendResult<UfoLayer> {
        let project_name = self
            .document
            .file_stem()
            .unwrap_or_else(|| self.family_name());
        let path = unique_ufo_path(&self.ufo_dir(), &format!("{project_name}_{source_name}"))?;

        let default_info = self.default_font_info()?;
        let mut info = plist::Dictionary::new();
        for attribute in inherited_info_attributes() {
            if let Some(value) = default_info.get(attribute) {
                info.insert(attribute.to_string(), value.clone());
            }
        }
        if info.get("unitsPerEm").is_none() {
            info.insert("unitsPerEm".into(), number_value(DEFAULT_UNITS_PER_EM));
        }

        let package = self.ufos.open(&path)?;
        package.write_info(&info)?;
        let layer_name = package.default_layer_name().to_string();
        info!("Created package {:?} for source '{}'", path, source_name);

        let layer = UfoLayer::new(&path, layer_name, alias, true);
        self.layers.append(layer.clone());
        self.update_paths_to_watch();
        Ok(layer)
    }

    /// A new layer in the package at `path`. When `glyph_name` already lives
    /// in a layer of the suggested name, `#1`, `#2`, ... are tried instead.
    pub(super) fn create_ufo_layer(
        &mut self,
        glyph_name: Option<&str>,
        path: &Path,
        suggested_name: &str,
        alias: NewLayerAlias<'_>,
    ) -> BackendResult<UfoLayer> {
        let package = self.ufos.open(path)?;
        let mut layer_name = suggested_name.to_string();
        let mut count = 0;
        while let Some(glyph_name) = glyph_name {
            let taken = package
                .glyph_set(&layer_name)
                .is_some_and(|glyph_set| glyph_set.contains(glyph_name));
            if !taken {
                break;
            }
            count += 1;
            layer_name = format!("{suggested_name}#{count}");
        }
        package.ensure_layer(&layer_name)?;
        let is_default = package.default_layer_name() == layer_name;

        let alias = match alias {
            NewLayerAlias::Exact(alias) => alias.to_string(),
            NewLayerAlias::OwnedBy(source_identifier) => {
                self.layer_alias(source_identifier, &layer_name)
            }
        };
        let layer = UfoLayer::new(path, layer_name, alias, is_default);
        self.layers.append(layer.clone());
        Ok(layer)
    }

    /// Set up the first source of an empty project.
    pub(super) fn create_default_source_and_ufo(&mut self, source_name: &str) -> BackendResult<()> {
        if !self.sources.is_empty() || !self.document.sources.is_empty() {
            return Err(BackendError::invariant(
                "default source requested for a project that has sources",
            ));
        }
        let identifier = self.new_source_identifier(0);
        let layer = self.create_ufo(source_name, &identifier)?;
        if self.family_name.is_none() {
            self.family_name = self.document.file_stem();
        }

        let source = DsSource::new(
            identifier,
            source_name,
            layer,
            self.space.default_location().clone(),
            true,
        );
        self.document
            .sources
            .push(source.as_descriptor(&self.family_name()));
        self.sources.append(source);
        self.write_document()
    }

    /// A new source at the global `location`: a layer in the package of the
    /// nearest pole source when the location is off-pole, else a new package.
    pub(super) fn create_ds_source_for_glyph(
        &mut self,
        glyph_name: Option<&str>,
        source_name: &str,
        layer_name: &str,
        location: Location,
    ) -> BackendResult<DsSource> {
        let identifier = self.new_source_identifier(self.sources.len());
        let layer = if self.space.is_sparse_location(&location) {
            let pole_path = self
                .find_ds_source_for_sparse(&location, &self.sources)?
                .layer
                .path
                .clone();
            self.create_ufo_layer(
                glyph_name,
                &pole_path,
                layer_name,
                NewLayerAlias::Exact(&identifier),
            )?
        } else {
            self.create_ufo(source_name, &identifier)?
        };
        Ok(DsSource::new(identifier, source_name, layer, location, false))
    }

    /// The source a sparse source at `location` attaches its layer to: the
    /// one at the pole projection, or the default source.
    pub(super) fn find_ds_source_for_sparse<'a>(
        &self,
        location: &Location,
        sources: &'a ItemList<DsSource>,
    ) -> BackendResult<&'a DsSource> {
        let projection = self.space.pole_projection(location);
        sources
            .find_first(&[("location", self.space.key(&projection).into())])
            .or_else(|| sources.find_first(&[("default", true.into())]))
            .ok_or_else(|| BackendError::invariant("no pole source for a sparse location"))
    }

    fn new_source_identifier(&self, index: usize) -> String {
        let used: HashSet<String> = self
            .document
            .sources
            .iter()
            .filter_map(|source| source.name.clone())
            .collect();
        make_source_identifier(index, None, &used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ufo_paths_count_up_past_existing_packages() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Test_Bold.ufo")).unwrap();
        fs::create_dir(dir.path().join("Test_Bold#1.ufo")).unwrap();
        let path = unique_ufo_path(dir.path(), "Test_Bold").unwrap();
        assert_eq!(path, dir.path().join("Test_Bold#2.ufo"));
        let path = unique_ufo_path(dir.path(), "Test_Light").unwrap();
        assert_eq!(path, dir.path().join("Test_Light.ufo"));
    }

    #[test]
    fn fresh_ufo_replaces_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("New.ufo");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("stray.txt"), "x").unwrap();

        create_fresh_ufo(&path).unwrap();
        assert!(!path.join("stray.txt").exists());
        let info = UfoPackage::open(&path).unwrap().read_info().unwrap();
        assert_eq!(info.get("unitsPerEm"), Some(&number_value(1000.0)));
        assert_eq!(info.get("descender"), Some(&number_value(-250.0)));
    }
}
