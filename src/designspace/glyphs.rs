//! Reading, writing and deleting one variable glyph
//!
//! A variable glyph is spread over every layer that holds a `.glif` for it.
//! The default layer of the default package additionally carries the
//! glyph-level bookkeeping in its lib: local axes and sources, the source
//! and layer alias maps, custom data and the note.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::lifecycle::NewLayerAlias;
use super::registry::UfoLayer;
use super::{
    DesignspaceBackend, SavedModTimes, GLYPH_CUSTOM_DATA_LIB_KEY, GLYPH_DESIGNSPACE_LIB_KEY,
    GLYPH_SOURCE_CUSTOM_DATA_LIB_KEY, LAYER_NAME_MAPPING_LIB_KEY, OVERLAP_SIMPLE_LIB_KEY,
    SOURCE_NAME_MAPPING_LIB_KEY,
};
use crate::core::errors::{BackendError, BackendResult};
use crate::model::{
    CustomData, GlyphAxis, GlyphSource, Layer, VariableGlyph, GLYPH_NOTE_KEY,
};
use crate::space::{make_dense, make_sparse, merge, Location};
use crate::ufo::glif::{populate_norad_glyph, static_glyph_from_norad, store_in_lib};
use crate::ufo::plist_json::{as_number, dict_to_json, json_to_dict, number_value};

const FALLBACK_DEFAULT_SOURCE_NAME: &str = "Regular";

/// Where one incoming glyph source ended up
#[derive(Debug)]
struct SourceLayerInfo {
    source_name: String,
    layer_name: String,
    local_source: Option<plist::Dictionary>,
}

impl DesignspaceBackend {
    /// The glyph called `glyph_name`, or `None` when the font has no such
    /// glyph.
    pub fn get_glyph(&mut self, glyph_name: &str) -> BackendResult<Option<VariableGlyph>> {
        if !self.glyph_map.contains_key(glyph_name) {
            return Ok(None);
        }

        let default_layer = self.default_layer()?;
        let default_glyph = self.read_layer_glyph(&default_layer, glyph_name)?;

        let (axes, local_sources) = match default_glyph
            .lib
            .get(GLYPH_DESIGNSPACE_LIB_KEY)
            .and_then(|value| value.as_dictionary())
        {
            Some(local_ds) => self.unpack_local_designspace(local_ds, &default_layer.name)?,
            None => (Vec::new(), Vec::new()),
        };
        let source_name_mapping = string_map(&default_glyph.lib, SOURCE_NAME_MAPPING_LIB_KEY);
        let layer_name_mapping = string_map(&default_glyph.lib, LAYER_NAME_MAPPING_LIB_KEY);

        let mut custom_data = default_glyph
            .lib
            .get(GLYPH_CUSTOM_DATA_LIB_KEY)
            .and_then(|value| value.as_dictionary())
            .map(dict_to_json)
            .unwrap_or_default();
        if let Some(note) = default_glyph.note.as_ref().filter(|note| !note.is_empty()) {
            custom_data.insert(GLYPH_NOTE_KEY.into(), note.clone().into());
        }

        let containing: Vec<UfoLayer> = self
            .layers
            .iter()
            .filter(|layer| self.layer_contains(layer, glyph_name))
            .cloned()
            .collect();

        let mut sources_custom_data: HashMap<String, CustomData> = HashMap::new();
        let mut layers = BTreeMap::new();
        for ufo_layer in containing {
            let norad_glyph = if ufo_layer == default_layer {
                default_glyph.clone()
            } else {
                self.read_layer_glyph(&ufo_layer, glyph_name)?
            };
            let mut static_glyph = static_glyph_from_norad(&norad_glyph);

            let mapped_name = layer_name_mapping
                .get(&ufo_layer.alias)
                .cloned()
                .unwrap_or_else(|| ufo_layer.alias.clone());
            let source_data = norad_glyph
                .lib
                .get(GLYPH_SOURCE_CUSTOM_DATA_LIB_KEY)
                .and_then(|value| value.as_dictionary())
                .map(dict_to_json)
                .unwrap_or_default();
            sources_custom_data.insert(mapped_name, source_data);

            if let Some(image) = static_glyph.background_image.as_mut() {
                image.identifier = self.image_identifier(&ufo_layer.path, &image.identifier);
            }
            layers.insert(ufo_layer.alias.clone(), Layer::new(static_glyph));
        }

        // Local axes shadowing a global axis pin that axis to the local default
        let local_default_override: Location = axes
            .iter()
            .filter(|axis| self.space.has_axis(&axis.name))
            .map(|axis| (axis.name.clone(), axis.default_value))
            .collect();

        let mut sources: Vec<GlyphSource> = self
            .sources
            .iter()
            .filter(|source| self.layer_contains(&source.layer, glyph_name))
            .map(|source| source.as_glyph_source(&local_default_override))
            .collect();
        sources.extend(local_sources);

        if !layer_name_mapping.is_empty() {
            for source in &mut sources {
                if let Some(mapped) = layer_name_mapping.get(&source.layer_name) {
                    source.layer_name = mapped.clone();
                }
            }
            layers = layers
                .into_iter()
                .map(|(name, layer)| {
                    let name = layer_name_mapping.get(&name).cloned().unwrap_or(name);
                    (name, layer)
                })
                .collect();
        }

        for source in &mut sources {
            if let Some(mapped) = source_name_mapping.get(&source.name) {
                source.name = mapped.clone();
            }
            source.custom_data = sources_custom_data
                .get(&source.layer_name)
                .cloned()
                .unwrap_or_default();
        }

        Ok(Some(VariableGlyph {
            name: glyph_name.to_string(),
            axes,
            sources,
            layers,
            custom_data,
        }))
    }

    /// Local axes and sources stored in a glyph's default-layer lib.
    fn unpack_local_designspace(
        &self,
        local_ds: &plist::Dictionary,
        default_layer_name: &str,
    ) -> BackendResult<(Vec<GlyphAxis>, Vec<GlyphSource>)> {
        let axes: Vec<GlyphAxis> = local_ds
            .get("axes")
            .and_then(|value| value.as_array())
            .map(|axes| axes.iter().filter_map(unpack_local_axis).collect())
            .unwrap_or_default();
        let local_axis_names: BTreeSet<&str> = axes.iter().map(|axis| axis.name.as_str()).collect();
        let local_defaults: Location = axes
            .iter()
            .map(|axis| (axis.name.clone(), axis.default_value))
            .collect();

        let mut sources = Vec::new();
        let entries = local_ds
            .get("sources")
            .and_then(|value| value.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in entries {
            let Some(entry) = entry.as_dictionary() else {
                continue;
            };
            let ufo_layer_name = entry
                .get("layername")
                .and_then(|value| value.as_string())
                .unwrap_or(default_layer_name);
            let source_name = match entry.get("name").and_then(|value| value.as_string()) {
                Some(name) => name.to_string(),
                None if ufo_layer_name != default_layer_name => ufo_layer_name.to_string(),
                None => "default".to_string(),
            };
            let delta = entry
                .get("location")
                .and_then(|value| value.as_dictionary())
                .map(unpack_location)
                .unwrap_or_default();

            let location = merge(self.space.default_location(), &delta);
            let global = self.space.global_portion(&location, &local_axis_names);
            let ds_source = self
                .sources
                .find_first(&[("location", self.space.key(&global).into())])
                .ok_or_else(|| {
                    BackendError::invariant(format!(
                        "local source '{source_name}' has no global source at {global:?}"
                    ))
                })?;
            let ufo_layer = self
                .layers
                .find_first(&[
                    ("path", (&ds_source.layer.path).into()),
                    ("name", ufo_layer_name.into()),
                ])
                .ok_or_else(|| {
                    BackendError::invariant(format!(
                        "local source '{source_name}' names unknown layer '{ufo_layer_name}'"
                    ))
                })?;

            // Writes resolve `base | local defaults | delta`; keep whatever
            // differs from the first two.
            let baseline = merge(&ds_source.location, &local_defaults);
            let location = delta
                .into_iter()
                .filter(|(axis, value)| baseline.get(axis) != Some(value))
                .collect();
            sources.push(GlyphSource {
                name: source_name,
                layer_name: ufo_layer.alias.clone(),
                location,
                location_base: Some(ds_source.identifier.clone()),
                ..Default::default()
            });
        }
        Ok((axes, sources))
    }

    /// Write `glyph` with `codepoints`, creating sources, packages and layers
    /// as needed and removing the glyph from layers it no longer uses.
    pub fn put_glyph(
        &mut self,
        glyph_name: &str,
        glyph: &VariableGlyph,
        codepoints: Vec<u32>,
    ) -> BackendResult<()> {
        self.glyph_map
            .insert(glyph_name.to_string(), codepoints.clone());
        self.dependencies
            .update(glyph_name, glyph.component_names());

        if self.default_source().is_none() {
            let source_name = default_source_name(glyph, self.space.default_location());
            self.create_default_source_and_ufo(&source_name)?;
        }

        let default_layer = self.default_layer()?;
        let mut default_glyph = self.read_glyph_or_create(&default_layer, glyph_name, &codepoints)?;
        let reverse_layer_mapping =
            reverse_map(&string_map(&default_glyph.lib, LAYER_NAME_MAPPING_LIB_KEY));

        let local_default_location: Location = glyph
            .axes
            .iter()
            .map(|axis| (axis.name.clone(), axis.default_value))
            .collect();

        let mut source_name_mapping = BTreeMap::new();
        let mut layer_name_mapping = BTreeMap::new();
        let mut local_sources = Vec::new();
        let mut sources_custom_data: HashMap<String, CustomData> = HashMap::new();
        for source in &glyph.sources {
            let info = self.prepare_ufo_source_layer(
                glyph_name,
                source,
                &local_default_location,
                &reverse_layer_mapping,
            )?;
            let derived_unnamed = source.location_base.is_some() && source.name.is_empty();
            if info.source_name != source.name && !derived_unnamed {
                source_name_mapping.insert(info.source_name.clone(), source.name.clone());
            }
            if info.layer_name != source.layer_name {
                layer_name_mapping.insert(info.layer_name.clone(), source.layer_name.clone());
            }
            if let Some(local_source) = info.local_source {
                local_sources.push(plist::Value::Dictionary(local_source));
            }
            sources_custom_data.insert(info.layer_name, source.custom_data.clone());
        }

        let mut local_ds = plist::Dictionary::new();
        if !glyph.axes.is_empty() {
            local_ds.insert("axes".into(), pack_local_axes(&glyph.axes));
        }
        if !local_sources.is_empty() {
            local_ds.insert("sources".into(), plist::Value::Array(local_sources));
        }

        // Resolve every layer the glyph references to a backing layer
        let reverse_layer_mapping = reverse_map(&layer_name_mapping);
        let mut used_layers = BTreeSet::new();
        let mut to_write = Vec::new();
        for (requested_name, layer) in &glyph.layers {
            let layer_name = reverse_layer_mapping
                .get(requested_name)
                .cloned()
                .unwrap_or_else(|| requested_name.clone());
            let mut ufo_layer = self
                .layers
                .find_first(&[("alias", (&layer_name).into())])
                .cloned();
            let mut ufo_path = default_layer.path.clone();
            let mut ufo_layer_name = layer_name.clone();

            if ufo_layer.is_none() && layer_name.contains('^') {
                (ufo_path, ufo_layer_name) =
                    self.find_ufo_for_layer_name(&layer_name, &default_layer.path);
                ufo_layer = self
                    .layers
                    .find_first(&[
                        ("path", (&ufo_path).into()),
                        ("name", (&ufo_layer_name).into()),
                    ])
                    .cloned();
            }

            let ufo_layer = match ufo_layer {
                Some(ufo_layer) => ufo_layer,
                None => {
                    // Plain names keep their name as alias so later writes in
                    // this session find the layer again.
                    let owner;
                    let alias = if ufo_layer_name == layer_name {
                        NewLayerAlias::Exact(&layer_name)
                    } else {
                        owner = self.owning_source_identifier(&ufo_path)?;
                        NewLayerAlias::OwnedBy(&owner)
                    };
                    let created = self.create_ufo_layer(
                        Some(glyph_name),
                        &ufo_path,
                        &ufo_layer_name,
                        alias,
                    )?;
                    if &created.alias != requested_name {
                        layer_name_mapping.insert(created.alias.clone(), requested_name.clone());
                    }
                    created
                }
            };
            used_layers.insert(ufo_layer.alias.clone());
            to_write.push((layer, ufo_layer));
        }

        let force_variable_components = glyph.has_variable_components();
        let mut custom_data = glyph.custom_data.clone();
        let note = custom_data
            .remove(GLYPH_NOTE_KEY)
            .and_then(|note| note.as_str().map(str::to_string));
        store_in_lib(
            &mut default_glyph.lib,
            GLYPH_DESIGNSPACE_LIB_KEY,
            plist::Value::Dictionary(local_ds),
        );
        store_in_lib(
            &mut default_glyph.lib,
            SOURCE_NAME_MAPPING_LIB_KEY,
            string_map_value(&source_name_mapping),
        );
        store_in_lib(
            &mut default_glyph.lib,
            LAYER_NAME_MAPPING_LIB_KEY,
            string_map_value(&layer_name_mapping),
        );
        default_glyph.note = note;
        store_in_lib(
            &mut default_glyph.lib,
            GLYPH_CUSTOM_DATA_LIB_KEY,
            plist::Value::Dictionary(json_to_dict(&custom_data)),
        );

        let mut mod_times = Vec::new();
        for (layer, ufo_layer) in to_write {
            let mut norad_glyph = if ufo_layer.path == default_layer.path
                && ufo_layer.name == default_layer.name
            {
                default_glyph.clone()
            } else {
                self.read_glyph_or_create(&ufo_layer, glyph_name, &codepoints)?
            };

            let source_data = sources_custom_data
                .get(&ufo_layer.alias)
                .map(json_to_dict)
                .unwrap_or_default();
            store_in_lib(
                &mut norad_glyph.lib,
                GLYPH_SOURCE_CUSTOM_DATA_LIB_KEY,
                plist::Value::Dictionary(source_data),
            );
            if self.options.set_overlap_simple_flag {
                norad_glyph
                    .lib
                    .insert(OVERLAP_SIMPLE_LIB_KEY.into(), plist::Value::Boolean(true));
            }

            let image_file_name = match &layer.glyph.background_image {
                Some(image) => Some(self.place_background_image(&image.identifier, &ufo_layer.path)?),
                None => None,
            };
            populate_norad_glyph(
                &mut norad_glyph,
                &layer.glyph,
                force_variable_components,
                image_file_name.as_deref(),
            )?;

            let glyph_set = self
                .ufos
                .glyph_set_mut(&ufo_layer.path, &ufo_layer.name)
                .ok_or_else(|| missing_layer(&ufo_layer))?;
            let is_new = glyph_set.write_glyph(glyph_name, &norad_glyph)?;
            if is_new {
                self.update_glyph_set_contents(&ufo_layer)?;
                self.ufos
                    .get(&ufo_layer.path)?
                    .ensure_in_glyph_order(glyph_name)?;
            }
            mod_times.push(
                self.ufos
                    .glyph_set(&ufo_layer.path, &ufo_layer.name)
                    .and_then(|glyph_set| glyph_set.modification_time(glyph_name)),
            );
        }

        let unused: Vec<UfoLayer> = self
            .layers
            .iter()
            .filter(|layer| !used_layers.contains(&layer.alias))
            .filter(|layer| self.layer_contains(layer, glyph_name))
            .cloned()
            .collect();
        for ufo_layer in unused {
            debug!("Removing '{}' from unused layer '{}'", glyph_name, ufo_layer.alias);
            self.ufos
                .glyph_set_mut(&ufo_layer.path, &ufo_layer.name)
                .ok_or_else(|| missing_layer(&ufo_layer))?
                .delete_glyph(glyph_name)?;
            self.update_glyph_set_contents(&ufo_layer)?;
            if ufo_layer.is_default_layer {
                self.ufos
                    .get(&ufo_layer.path)?
                    .remove_from_glyph_order(glyph_name)?;
            }
            mod_times.push(None);
        }

        self.saved_mod_times
            .insert(glyph_name.to_string(), SavedModTimes::Times(mod_times));
        Ok(())
    }

    /// Resolve the global source and backing layer of one incoming glyph
    /// source, creating either when missing.
    fn prepare_ufo_source_layer(
        &mut self,
        glyph_name: &str,
        source: &GlyphSource,
        local_default_location: &Location,
        reverse_layer_mapping: &BTreeMap<String, String>,
    ) -> BackendResult<SourceLayerInfo> {
        let mut base_location = Location::new();
        if let Some(base) = source.location_base.as_deref().filter(|base| !base.is_empty()) {
            match self.sources.find_first(&[("identifier", base.into())]) {
                Some(ds_source) => base_location = ds_source.location.clone(),
                None => match self.implicit_location_base.as_deref() {
                    None => {
                        info!("Treating unknown source identifier '{}' as the default", base);
                        self.implicit_location_base = Some(base.to_string());
                    }
                    Some(tolerated) if tolerated == base => {}
                    Some(_) => return Err(BackendError::UnknownLocationBase(base.to_string())),
                },
            }
        }

        let location = merge(&merge(&base_location, local_default_location), &source.location);
        let sparse_local_location: Location = local_default_location
            .iter()
            .filter_map(|(axis, default)| {
                let value = location.get(axis).copied().unwrap_or(*default);
                (value != *default).then(|| (axis.clone(), value))
            })
            .collect();
        let location = merge(self.space.default_location(), &location);
        let local_axis_names: BTreeSet<&str> =
            local_default_location.keys().map(String::as_str).collect();
        let global_location = self.space.global_portion(&location, &local_axis_names);

        let existing = self
            .sources
            .find_first(&[("location", self.space.key(&global_location).into())])
            .cloned();
        let ds_source = match existing {
            Some(ds_source) => ds_source,
            None => {
                let ds_source = self.create_ds_source_for_glyph(
                    Some(glyph_name),
                    &source.name,
                    &source.layer_name,
                    global_location,
                )?;
                info!(
                    "Created source '{}' for glyph '{}'",
                    ds_source.identifier, glyph_name
                );
                let descriptor = ds_source.as_descriptor(&self.family_name());
                self.document.sources.push(descriptor);
                self.sources.append(ds_source.clone());
                self.write_document()?;
                ds_source
            }
        };

        if sparse_local_location.is_empty() {
            return Ok(SourceLayerInfo {
                source_name: ds_source.name.clone(),
                layer_name: ds_source.layer.alias.clone(),
                local_source: None,
            });
        }

        let requested = reverse_layer_mapping
            .get(&source.layer_name)
            .cloned()
            .unwrap_or_else(|| source.layer_name.clone());
        let (ufo_path, ufo_layer_name) =
            self.find_ufo_for_layer_name(&requested, &ds_source.layer.path);
        if ufo_path != ds_source.layer.path {
            return Err(BackendError::invariant(format!(
                "layer '{requested}' of glyph '{glyph_name}' belongs to another package"
            )));
        }
        let existing = self
            .layers
            .find_first(&[("path", (&ufo_path).into()), ("name", (&ufo_layer_name).into())])
            .cloned();
        let ufo_layer = match existing {
            Some(ufo_layer) => ufo_layer,
            None => self.create_ufo_layer(
                Some(glyph_name),
                &ufo_path,
                &ufo_layer_name,
                NewLayerAlias::OwnedBy(&ds_source.identifier),
            )?,
        };

        let package_default_layer = self.ufos.get(&ufo_path)?.default_layer_name().to_string();
        let mut local_source = plist::Dictionary::new();
        local_source.insert("name".into(), plist::Value::String(source.name.clone()));
        if ufo_layer.name != package_default_layer {
            local_source.insert("layername".into(), plist::Value::String(ufo_layer.name.clone()));
        }
        let local_base = merge(self.space.default_location(), local_default_location);
        local_source.insert(
            "location".into(),
            pack_location(&make_sparse(&location, &local_base)),
        );

        Ok(SourceLayerInfo {
            source_name: source.name.clone(),
            layer_name: ufo_layer.alias,
            local_source: Some(local_source),
        })
    }

    /// `<source>^<layer>` resolves to that layer inside the package of a
    /// non-sparse source; anything else stays in `ufo_path`.
    fn find_ufo_for_layer_name(&self, layer_name: &str, ufo_path: &Path) -> (PathBuf, String) {
        if let Some((identifier, background_name)) = layer_name.split_once('^') {
            let owner = self
                .sources
                .find_first(&[("identifier", identifier.into())])
                .filter(|source| !source.is_sparse());
            if let Some(owner) = owner {
                return (owner.layer.path.clone(), background_name.to_string());
            }
        }
        (ufo_path.to_path_buf(), layer_name.to_string())
    }

    /// Identifier of the non-sparse source stored in the package at `path`.
    fn owning_source_identifier(&self, path: &Path) -> BackendResult<String> {
        self.sources
            .iter()
            .find(|source| source.layer.path == path && !source.is_sparse())
            .or_else(|| self.default_source())
            .map(|source| source.identifier.clone())
            .ok_or_else(|| BackendError::invariant(format!("no source owns {path:?}")))
    }

    /// Remove the glyph from every layer holding it.
    pub fn delete_glyph(&mut self, glyph_name: &str) -> BackendResult<()> {
        if !self.glyph_map.contains_key(glyph_name) {
            return Err(BackendError::GlyphNotFound(glyph_name.to_string()));
        }
        let containing: Vec<UfoLayer> = self
            .layers
            .iter()
            .filter(|layer| self.layer_contains(layer, glyph_name))
            .cloned()
            .collect();
        for ufo_layer in containing {
            let glyph_set = self
                .ufos
                .glyph_set_mut(&ufo_layer.path, &ufo_layer.name)
                .ok_or_else(|| missing_layer(&ufo_layer))?;
            glyph_set.delete_glyph(glyph_name)?;
            glyph_set.write_contents()?;
            if ufo_layer.is_default_layer {
                self.ufos
                    .get(&ufo_layer.path)?
                    .remove_from_glyph_order(glyph_name)?;
            }
        }
        self.glyph_map.remove(glyph_name);
        self.saved_mod_times
            .insert(glyph_name.to_string(), SavedModTimes::Deleted);
        self.dependencies.update(glyph_name, BTreeSet::new());
        info!("Deleted glyph '{}'", glyph_name);
        Ok(())
    }

    fn layer_contains(&self, layer: &UfoLayer, glyph_name: &str) -> bool {
        self.ufos
            .glyph_set(&layer.path, &layer.name)
            .is_some_and(|glyph_set| glyph_set.contains(glyph_name))
    }

    fn read_layer_glyph(&self, layer: &UfoLayer, glyph_name: &str) -> BackendResult<norad::Glyph> {
        self.ufos
            .glyph_set(&layer.path, &layer.name)
            .ok_or_else(|| missing_layer(layer))?
            .read_glyph(glyph_name)
    }

    /// The existing glyph of `layer`, or a fresh one, with `codepoints` set.
    fn read_glyph_or_create(
        &self,
        layer: &UfoLayer,
        glyph_name: &str,
        codepoints: &[u32],
    ) -> BackendResult<norad::Glyph> {
        let mut glyph = if self.layer_contains(layer, glyph_name) {
            self.read_layer_glyph(layer, glyph_name)?
        } else {
            norad::Glyph::new(glyph_name)
        };
        let chars = codepoints.iter().filter_map(|cp| {
            let c = char::from_u32(*cp);
            if c.is_none() {
                warn!("Dropping invalid code point {:#x} of '{}'", cp, glyph_name);
            }
            c
        });
        glyph.codepoints = norad::Codepoints::new(chars);
        Ok(glyph)
    }
}

fn missing_layer(layer: &UfoLayer) -> BackendError {
    BackendError::invariant(format!(
        "layer '{}' of {:?} is not loaded",
        layer.name, layer.path
    ))
}

/// Name for the first source of a project: the name of the glyph source at
/// the default location, if it has one.
fn default_source_name(glyph: &VariableGlyph, default_location: &Location) -> String {
    glyph
        .sources
        .iter()
        .find(|source| {
            !source.inactive && make_dense(&source.location, default_location) == *default_location
        })
        .map(|source| source.name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_DEFAULT_SOURCE_NAME.to_string())
}

fn string_map(lib: &plist::Dictionary, key: &str) -> BTreeMap<String, String> {
    lib.get(key)
        .and_then(|value| value.as_dictionary())
        .map(|dict| {
            dict.iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_string()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn string_map_value(map: &BTreeMap<String, String>) -> plist::Value {
    plist::Value::Dictionary(
        map.iter()
            .map(|(k, v)| (k.clone(), plist::Value::String(v.clone())))
            .collect(),
    )
}

fn reverse_map(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter().map(|(k, v)| (v.clone(), k.clone())).collect()
}

fn unpack_location(dict: &plist::Dictionary) -> Location {
    dict.iter()
        .filter_map(|(axis, value)| Some((axis.clone(), as_number(value)?)))
        .collect()
}

fn pack_location(location: &Location) -> plist::Value {
    plist::Value::Dictionary(
        location
            .iter()
            .map(|(axis, value)| (axis.clone(), number_value(*value)))
            .collect(),
    )
}

fn unpack_local_axis(value: &plist::Value) -> Option<GlyphAxis> {
    let dict = value.as_dictionary()?;
    Some(GlyphAxis {
        name: dict.get("name")?.as_string()?.to_string(),
        min_value: as_number(dict.get("minimum")?)?,
        default_value: as_number(dict.get("default")?)?,
        max_value: as_number(dict.get("maximum")?)?,
    })
}

fn pack_local_axes(axes: &[GlyphAxis]) -> plist::Value {
    plist::Value::Array(
        axes.iter()
            .map(|axis| {
                let mut dict = plist::Dictionary::new();
                dict.insert("name".into(), plist::Value::String(axis.name.clone()));
                dict.insert("minimum".into(), number_value(axis.min_value));
                dict.insert("default".into(), number_value(axis.default_value));
                dict.insert("maximum".into(), number_value(axis.max_value));
                plist::Value::Dictionary(dict)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(pairs: &[(&str, f64)]) -> Location {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn default_source_name_prefers_named_default_source() {
        let default = loc(&[("weight", 400.0)]);
        let mut glyph = VariableGlyph::new("a");
        glyph.sources.push(GlyphSource {
            name: "Bold".into(),
            location: loc(&[("weight", 700.0)]),
            ..Default::default()
        });
        assert_eq!(default_source_name(&glyph, &default), "Regular");

        glyph.sources.push(GlyphSource {
            name: "Book".into(),
            ..Default::default()
        });
        assert_eq!(default_source_name(&glyph, &default), "Book");
    }

    #[test]
    fn local_axes_survive_packing() {
        let axes = vec![GlyphAxis {
            name: "width".into(),
            min_value: 0.0,
            default_value: 50.0,
            max_value: 100.0,
        }];
        let packed = pack_local_axes(&axes);
        let unpacked: Vec<_> = packed
            .as_array()
            .unwrap()
            .iter()
            .filter_map(unpack_local_axis)
            .collect();
        assert_eq!(unpacked, axes);
    }

    #[test]
    fn alias_maps_reverse() {
        let map = BTreeMap::from([("src1".to_string(), "bold".to_string())]);
        let mut lib = plist::Dictionary::new();
        lib.insert(LAYER_NAME_MAPPING_LIB_KEY.into(), string_map_value(&map));
        let read = string_map(&lib, LAYER_NAME_MAPPING_LIB_KEY);
        assert_eq!(read, map);
        assert_eq!(reverse_map(&read).get("bold").map(String::as_str), Some("src1"));
    }
}
