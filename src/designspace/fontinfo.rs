//! Font info, font sources and units per em
//!
//! Family-level metadata is the same in every package: reads come from the
//! default package, writes go to all of them. Per-source data (line metrics,
//! guidelines, italic angle) lives in each non-sparse source's own package.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde_json::{Map, Value as Json};
use tracing::{debug, info};

use super::document::SourceDescriptor;
use super::lifecycle::NewLayerAlias;
use super::registry::{DsSource, ItemList};
use super::{BackendKind, DesignspaceBackend, ReloadPattern};
use crate::core::errors::{BackendError, BackendResult};
use crate::model::{FontInfo, FontSource, Guideline, LineMetric};
use crate::space::make_dense;
use crate::ufo::glif::GUIDELINE_LOCK_LIB_PREFIX;
use crate::ufo::plist_json::{as_number, json_to_plist, number_value, plist_to_json};

pub(super) const DEFAULT_UNITS_PER_EM: f64 = 1000.0;

pub const LINE_METRICS_ZONES_LIB_KEY: &str = "xyz.fontra.lineMetricsHorizontalLayout.zones";

const UNITS_PER_EM: &str = "unitsPerEm";
const ITALIC_ANGLE: &str = "italicAngle";
const GUIDELINES: &str = "guidelines";
const BASELINE: &str = "baseline";

/// Client field name -> font info attribute
const FONT_INFO_NAME_MAPPING: &[(&str, &str)] = &[
    ("familyName", "familyName"),
    ("versionMajor", "versionMajor"),
    ("versionMinor", "versionMinor"),
    ("copyright", "copyright"),
    ("trademark", "trademark"),
    ("description", "openTypeNameDescription"),
    ("sampleText", "openTypeNameSampleText"),
    ("designer", "openTypeNameDesigner"),
    ("designerURL", "openTypeNameDesignerURL"),
    ("manufacturer", "openTypeNameManufacturer"),
    ("manufacturerURL", "openTypeNameManufacturerURL"),
    ("licenseDescription", "openTypeNameLicense"),
    ("licenseInfoURL", "openTypeNameLicenseURL"),
    ("vendorID", "openTypeOS2VendorID"),
];

/// Family-wide attributes passed through as font info custom data
const FAMILY_CUSTOM_DATA_ATTRIBUTES: &[&str] = &[
    "openTypeNameUniqueID",
    "openTypeHeadCreated",
    "openTypeNameVersion",
    "openTypeNamePreferredFamilyName",
    "openTypeNameWWSFamilyName",
    "openTypeOS2CodePageRanges",
    "openTypeOS2UnicodeRanges",
    "openTypeOS2FamilyClass",
    "openTypeOS2Type",
    "postscriptWindowsCharacterSet",
    "openTypeOS2Panose",
    "openTypeOS2Selection",
    "openTypeOS2WeightClass",
    "openTypeOS2WidthClass",
];

/// Per-source attributes passed through as font source custom data
const SOURCE_CUSTOM_DATA_ATTRIBUTES: &[&str] = &[
    "openTypeHheaAscender",
    "openTypeHheaCaretOffset",
    "openTypeHheaCaretSlopeRise",
    "openTypeHheaCaretSlopeRun",
    "openTypeHheaDescender",
    "openTypeHheaLineGap",
    "openTypeOS2StrikeoutPosition",
    "openTypeOS2StrikeoutSize",
    "openTypeOS2SubscriptXOffset",
    "openTypeOS2SubscriptXSize",
    "openTypeOS2SubscriptYOffset",
    "openTypeOS2SubscriptYSize",
    "openTypeOS2SuperscriptXOffset",
    "openTypeOS2SuperscriptXSize",
    "openTypeOS2SuperscriptYOffset",
    "openTypeOS2SuperscriptYSize",
    "openTypeOS2TypoAscender",
    "openTypeOS2TypoDescender",
    "openTypeOS2TypoLineGap",
    "openTypeOS2WinAscent",
    "openTypeOS2WinDescent",
    "openTypeVheaCaretOffset",
    "openTypeVheaCaretSlopeRise",
    "openTypeVheaCaretSlopeRun",
    "openTypeVheaVertTypoLineGap",
    "postscriptUnderlinePosition",
    "postscriptUnderlineThickness",
    "openTypeNameCompatibleFullName",
    "openTypeNamePreferredSubfamilyName",
    "openTypeNameWWSSubfamilyName",
    "postscriptBlueFuzz",
    "postscriptBlueScale",
    "postscriptBlueShift",
    "postscriptBlueValues",
    "postscriptFamilyBlues",
    "postscriptFamilyOtherBlues",
    "postscriptForceBold",
    "postscriptIsFixedPitch",
    "postscriptOtherBlues",
    "postscriptSlantAngle",
    "postscriptStemSnapH",
    "postscriptStemSnapV",
];

/// Horizontal line metrics with their value and zone defaults, as
/// fractions of units per em
const HORIZONTAL_METRIC_DEFAULTS: &[(&str, f64, f64)] = &[
    ("ascender", 0.75, 0.016),
    ("capHeight", 0.75, 0.016),
    ("xHeight", 0.5, 0.016),
    ("descender", -0.25, -0.016),
    (BASELINE, 0.0, -0.016),
];

/// Vertical line metric -> font info attribute
const VERTICAL_METRIC_MAPPING: &[(&str, &str)] = &[
    ("ascender", "openTypeVheaVertTypoAscender"),
    ("descender", "openTypeVheaVertTypoDescender"),
    ("lineGap", "openTypeVheaVertTypoLineGap"),
];

/// Attributes a new package copies from the default package.
pub(super) fn inherited_info_attributes() -> impl Iterator<Item = &'static str> {
    FONT_INFO_NAME_MAPPING
        .iter()
        .map(|(_, attribute)| *attribute)
        .chain(std::iter::once(UNITS_PER_EM))
}

/// Integral reals become integers, so version numbers read back as such.
fn normalized(value: &plist::Value) -> plist::Value {
    match as_number(value) {
        Some(number) => number_value(number),
        None => value.clone(),
    }
}

/// Set or, for `None` and empty strings, remove each attribute.
fn apply_info_updates(info: &mut plist::Dictionary, updates: &[(String, Option<plist::Value>)]) {
    for (attribute, value) in updates {
        match value {
            None => {
                info.remove(attribute);
            }
            Some(plist::Value::String(s)) if s.is_empty() => {
                info.remove(attribute);
            }
            Some(value) => {
                info.insert(attribute.clone(), value.clone());
            }
        }
    }
}

/// Guidelines stored in font info, with their lock state from the lib.
pub fn unpack_info_guidelines(info: &plist::Dictionary, lib: &plist::Dictionary) -> Vec<Guideline> {
    let Some(guidelines) = info.get(GUIDELINES).and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    guidelines
        .iter()
        .filter_map(|g| g.as_dictionary())
        .map(|g| {
            let number = |key: &str| g.get(key).and_then(as_number).unwrap_or(0.0);
            let locked = g
                .get("identifier")
                .and_then(|id| id.as_string())
                .and_then(|id| lib.get(&format!("{GUIDELINE_LOCK_LIB_PREFIX}{id}")))
                .and_then(|flag| flag.as_boolean())
                .unwrap_or(false);
            Guideline {
                name: g.get("name").and_then(|n| n.as_string()).map(str::to_string),
                x: number("x"),
                y: number("y"),
                angle: number("angle"),
                locked,
            }
        })
        .collect()
}

/// Font info guideline entries. Lock keys in `lib` are replaced by the
/// ones of the locked guidelines.
pub fn pack_info_guidelines(guidelines: &[Guideline], lib: &mut plist::Dictionary) -> plist::Value {
    let stale: Vec<String> = lib
        .keys()
        .filter(|key| key.starts_with(GUIDELINE_LOCK_LIB_PREFIX))
        .cloned()
        .collect();
    for key in stale {
        lib.remove(&key);
    }

    let packed = guidelines
        .iter()
        .enumerate()
        .map(|(index, guideline)| {
            let mut entry = plist::Dictionary::new();
            if let Some(name) = &guideline.name {
                entry.insert("name".into(), plist::Value::String(name.clone()));
            }
            entry.insert("x".into(), number_value(guideline.x));
            entry.insert("y".into(), number_value(guideline.y));
            entry.insert("angle".into(), number_value(guideline.angle));
            if guideline.locked {
                let identifier = format!("fontra-guideline-{index}");
                lib.insert(
                    format!("{GUIDELINE_LOCK_LIB_PREFIX}{identifier}"),
                    plist::Value::Boolean(true),
                );
                entry.insert("identifier".into(), plist::Value::String(identifier));
            }
            plist::Value::Dictionary(entry)
        })
        .collect();
    plist::Value::Array(packed)
}

/// A font source as read from its package's font info and lib.
fn font_source_from_info(
    source: &DsSource,
    info: &plist::Dictionary,
    lib: &plist::Dictionary,
    units_per_em: f64,
) -> FontSource {
    let mut font_source = FontSource {
        name: source.name.clone(),
        location: source.location.clone(),
        is_sparse: source.is_sparse(),
        ..Default::default()
    };
    if source.is_sparse() {
        return font_source;
    }

    let zones = lib
        .get(LINE_METRICS_ZONES_LIB_KEY)
        .and_then(|v| v.as_dictionary());
    for (name, value_factor, zone_factor) in HORIZONTAL_METRIC_DEFAULTS {
        let value = if *name == BASELINE {
            0.0
        } else {
            info.get(*name)
                .and_then(as_number)
                .unwrap_or_else(|| (value_factor * units_per_em).round())
        };
        let zone = zones
            .and_then(|zones| zones.get(*name))
            .and_then(as_number)
            .unwrap_or_else(|| (zone_factor * units_per_em).round());
        font_source
            .line_metrics_horizontal_layout
            .insert(name.to_string(), LineMetric::new(value, zone));
    }

    for (name, attribute) in VERTICAL_METRIC_MAPPING {
        if let Some(value) = info.get(*attribute).and_then(as_number) {
            font_source
                .line_metrics_vertical_layout
                .insert(name.to_string(), LineMetric::new(value, 0.0));
        }
    }

    font_source.guidelines = unpack_info_guidelines(info, lib);
    font_source.italic_angle = info.get(ITALIC_ANGLE).and_then(as_number).unwrap_or(0.0);
    for attribute in SOURCE_CUSTOM_DATA_ATTRIBUTES {
        if let Some(value) = info.get(*attribute) {
            font_source
                .custom_data
                .insert(attribute.to_string(), plist_to_json(value));
        }
    }
    font_source
}

/// Write a font source's metrics, guidelines and custom data into the
/// font info and lib of its package.
fn update_info_from_font_source(
    info: &mut plist::Dictionary,
    lib: &mut plist::Dictionary,
    font_source: &FontSource,
) {
    let mut zones = plist::Dictionary::new();
    for (name, metric) in &font_source.line_metrics_horizontal_layout {
        if !HORIZONTAL_METRIC_DEFAULTS.iter().any(|(known, _, _)| known == name) {
            continue;
        }
        if name != BASELINE {
            info.insert(name.clone(), number_value(metric.value));
        }
        if metric.zone != 0.0 {
            zones.insert(name.clone(), number_value(metric.zone));
        }
    }

    for (name, metric) in &font_source.line_metrics_vertical_layout {
        if let Some((_, attribute)) = VERTICAL_METRIC_MAPPING.iter().find(|(n, _)| n == name) {
            info.insert(attribute.to_string(), number_value(metric.value.round()));
        }
    }

    if font_source.italic_angle != 0.0 {
        info.insert(ITALIC_ANGLE.into(), number_value(font_source.italic_angle));
    } else {
        info.remove(ITALIC_ANGLE);
    }

    let guidelines = pack_info_guidelines(&font_source.guidelines, lib);
    info.insert(GUIDELINES.into(), guidelines);

    for (attribute, value) in &font_source.custom_data {
        if let Some(value) = json_to_plist(value) {
            info.insert(attribute.clone(), value);
        }
    }
    for attribute in SOURCE_CUSTOM_DATA_ATTRIBUTES {
        if !font_source.custom_data.contains_key(*attribute) {
            info.remove(attribute);
        }
    }

    if zones.is_empty() {
        lib.remove(LINE_METRICS_ZONES_LIB_KEY);
    } else {
        lib.insert(LINE_METRICS_ZONES_LIB_KEY.into(), plist::Value::Dictionary(zones));
    }
}

/// Order `new` like `old` where names match; the rest sorted by location
/// in `axis_order`. Unmatched sources before the first match go first,
/// others follow the matched source preceding them.
pub fn sorted_source_descriptors(
    mut new: Vec<SourceDescriptor>,
    old: &[SourceDescriptor],
    axis_order: &[String],
) -> Vec<SourceDescriptor> {
    let location_key = |source: &SourceDescriptor| -> Vec<f64> {
        axis_order
            .iter()
            .map(|axis| source.location.get(axis).copied().unwrap_or(0.0))
            .collect()
    };
    new.sort_by(|a, b| {
        location_key(a)
            .iter()
            .zip(location_key(b).iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    let mut buckets: Vec<(Option<String>, Vec<SourceDescriptor>)> = vec![(None, Vec::new())];
    for source in old {
        if !buckets.iter().any(|(name, _)| name == &source.name) {
            buckets.push((source.name.clone(), Vec::new()));
        }
    }

    let mut current = 0;
    for source in new {
        if source.name.is_some() {
            if let Some(index) = buckets.iter().position(|(name, _)| name == &source.name) {
                current = index;
            }
        }
        buckets[current].1.push(source);
    }
    buckets.into_iter().flat_map(|(_, sources)| sources).collect()
}

impl DesignspaceBackend {
    pub fn get_font_info(&mut self) -> BackendResult<FontInfo> {
        let info = self.default_font_info()?;
        let mut fields = Map::new();
        for (field, attribute) in FONT_INFO_NAME_MAPPING {
            if let Some(value) = info.get(*attribute) {
                fields.insert(field.to_string(), plist_to_json(&normalized(value)));
            }
        }
        let custom_data: Map<String, Json> = FAMILY_CUSTOM_DATA_ATTRIBUTES
            .iter()
            .filter_map(|attribute| {
                info.get(*attribute)
                    .map(|value| (attribute.to_string(), plist_to_json(value)))
            })
            .collect();
        fields.insert("customData".into(), Json::Object(custom_data));
        serde_json::from_value(Json::Object(fields))
            .map_err(|e| BackendError::invariant(format!("unreadable font info: {e}")))
    }

    pub fn put_font_info(&mut self, font_info: &FontInfo) -> BackendResult<()> {
        let fields = serde_json::to_value(font_info)
            .map_err(|e| BackendError::invariant(format!("unwritable font info: {e}")))?;
        let mut updates: Vec<(String, Option<plist::Value>)> = FONT_INFO_NAME_MAPPING
            .iter()
            .map(|(field, attribute)| {
                let value = fields.get(*field).and_then(json_to_plist);
                (attribute.to_string(), value)
            })
            .collect();

        if let Some(family_name) = font_info.family_name.as_deref().filter(|n| !n.is_empty()) {
            self.family_name = Some(family_name.to_string());
        }
        for (key, value) in &font_info.custom_data {
            if FAMILY_CUSTOM_DATA_ATTRIBUTES.contains(&key.as_str()) {
                updates.push((key.clone(), json_to_plist(value)));
            }
        }
        self.update_global_font_info(&updates)
    }

    pub fn get_units_per_em(&mut self) -> BackendResult<f64> {
        Ok(self
            .default_font_info()?
            .get(UNITS_PER_EM)
            .and_then(as_number)
            .unwrap_or(DEFAULT_UNITS_PER_EM))
    }

    pub fn put_units_per_em(&mut self, units_per_em: f64) -> BackendResult<()> {
        self.update_global_font_info(&[(UNITS_PER_EM.to_string(), Some(number_value(units_per_em)))])
    }

    /// Apply `updates` to the font info of every package.
    fn update_global_font_info(
        &mut self,
        updates: &[(String, Option<plist::Value>)],
    ) -> BackendResult<()> {
        if let Some(info) = self.default_font_info.as_mut() {
            apply_info_updates(info, updates);
        }
        let paths: BTreeSet<PathBuf> = self.layers.iter().map(|layer| layer.path.clone()).collect();
        for path in paths {
            let package = self.ufos.open(&path)?;
            let mut info = package.read_info()?;
            apply_info_updates(&mut info, updates);
            package.write_info(&info)?;
        }
        debug!("Updated {} font info attributes", updates.len());
        Ok(())
    }

    pub fn get_sources(&mut self) -> BackendResult<BTreeMap<String, FontSource>> {
        let units_per_em = self.get_units_per_em()?;
        let mut font_sources = BTreeMap::new();
        for source in &self.sources {
            let (info, lib) = if source.is_sparse() {
                (plist::Dictionary::new(), plist::Dictionary::new())
            } else {
                let package = self.ufos.get(&source.layer.path)?;
                (package.read_info()?, package.read_lib()?)
            };
            font_sources.insert(
                source.identifier.clone(),
                font_source_from_info(source, &info, &lib, units_per_em),
            );
        }
        Ok(font_sources)
    }

    /// Replace the set of sources. Existing sources are matched by
    /// identifier, then among previously removed ones, then by location.
    pub fn put_sources(&mut self, font_sources: &BTreeMap<String, FontSource>) -> BackendResult<()> {
        if self.kind == BackendKind::SingleUfo && font_sources.len() > 1 {
            return Err(BackendError::SingleUfoSources);
        }

        let mut ordered: Vec<(&String, &FontSource)> = font_sources.iter().collect();
        ordered.sort_by_key(|(_, font_source)| font_source.is_sparse);

        let default_location = self.space.default_location().clone();
        let default_key = self.space.key(&default_location);
        let mut new_sources: ItemList<DsSource> = ItemList::new();

        for (identifier, font_source) in ordered {
            let location = make_dense(&font_source.location, &default_location);
            let existing = self
                .sources
                .find_first(&[("identifier", identifier.into())])
                .cloned()
                .or_else(|| self.zombies.remove(identifier))
                .or_else(|| {
                    self.sources
                        .find_first(&[("location", self.space.key(&location).into())])
                        .cloned()
                });

            let source = match existing {
                Some(existing) => {
                    if existing.is_sparse() != font_source.is_sparse {
                        return Err(BackendError::SparseFlagChange(identifier.clone()));
                    }
                    existing.renamed(identifier, &font_source.name, location)
                }
                None => {
                    let layer = if font_source.is_sparse {
                        let pole_path = self
                            .find_ds_source_for_sparse(&location, &new_sources)?
                            .layer
                            .path
                            .clone();
                        self.create_ufo_layer(
                            None,
                            &pole_path,
                            &font_source.name,
                            NewLayerAlias::Exact(identifier),
                        )?
                    } else {
                        self.create_ufo(&font_source.name, identifier)?
                    };
                    let is_default = self.space.key(&location) == default_key;
                    info!("Created source '{}' ({})", font_source.name, identifier);
                    DsSource::new(identifier, &font_source.name, layer, location, is_default)
                }
            };

            if !source.is_sparse() {
                let package = self.ufos.open(&source.layer.path)?;
                let mut info = package.read_info()?;
                let mut lib = package.read_lib()?;
                update_info_from_font_source(&mut info, &mut lib, font_source);
                package.write_info(&info)?;
                package.write_lib(&lib)?;
            }
            new_sources.append(source);
        }

        if new_sources.is_empty() {
            if let Some(default) = self.default_source().cloned() {
                new_sources.append(default);
            }
        }

        let removed: Vec<DsSource> = self
            .sources
            .iter()
            .filter(|source| !font_sources.contains_key(&source.identifier))
            .cloned()
            .collect();
        for source in removed {
            self.zombies.insert(source.identifier.clone(), source);
        }

        self.layers = new_sources.iter().map(|source| source.layer.clone()).collect();
        self.sources = new_sources;

        let family_name = self.family_name();
        let descriptors: Vec<SourceDescriptor> = self
            .sources
            .iter()
            .map(|source| source.as_descriptor(&family_name))
            .collect();
        let axis_order: Vec<String> = self
            .document
            .axes
            .iter()
            .map(|axis| axis.name().to_string())
            .collect();
        self.document.sources = sorted_source_descriptors(descriptors, &self.document.sources, &axis_order);

        self.add_non_source_layers()?;
        self.default_font_info = None;
        self.write_document()?;
        self.update_paths_to_watch();
        self.pending_patterns.push_back(ReloadPattern::AllGlyphs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, weight: f64) -> SourceDescriptor {
        SourceDescriptor {
            name: Some(name.to_string()),
            location: [("weight".to_string(), weight)].into(),
            ..Default::default()
        }
    }

    fn names(sources: &[SourceDescriptor]) -> Vec<&str> {
        sources.iter().filter_map(|s| s.name.as_deref()).collect()
    }

    #[test]
    fn descriptors_keep_their_previous_order() {
        let old = vec![descriptor("bold", 700.0), descriptor("light", 300.0)];
        let new = vec![
            descriptor("light", 300.0),
            descriptor("medium", 500.0),
            descriptor("bold", 700.0),
            descriptor("thin", 100.0),
        ];
        let sorted = sorted_source_descriptors(new, &old, &["weight".to_string()]);
        assert_eq!(names(&sorted), vec!["thin", "bold", "light", "medium"]);
    }

    #[test]
    fn info_guidelines_keep_their_lock_state() {
        let guidelines = vec![
            Guideline {
                name: Some("cap".into()),
                x: 0.0,
                y: 700.0,
                angle: 0.0,
                locked: true,
            },
            Guideline {
                name: None,
                x: 120.0,
                y: 0.0,
                angle: 90.0,
                locked: false,
            },
        ];
        let mut lib = plist::Dictionary::new();
        lib.insert(
            format!("{GUIDELINE_LOCK_LIB_PREFIX}stale"),
            plist::Value::Boolean(true),
        );
        let mut info = plist::Dictionary::new();
        info.insert(GUIDELINES.into(), pack_info_guidelines(&guidelines, &mut lib));

        assert!(!lib.contains_key(&format!("{GUIDELINE_LOCK_LIB_PREFIX}stale")));
        assert_eq!(unpack_info_guidelines(&info, &lib), guidelines);
    }

    #[test]
    fn empty_values_delete_attributes() {
        let mut info = plist::Dictionary::new();
        info.insert("copyright".into(), plist::Value::String("(c) me".into()));
        info.insert("trademark".into(), plist::Value::String("TM".into()));
        apply_info_updates(
            &mut info,
            &[
                ("copyright".into(), None),
                ("trademark".into(), Some(plist::Value::String(String::new()))),
                ("versionMajor".into(), Some(number_value(2.0))),
            ],
        );
        assert!(info.get("copyright").is_none());
        assert!(info.get("trademark").is_none());
        assert_eq!(info.get("versionMajor"), Some(&number_value(2.0)));
    }

    #[test]
    fn missing_metrics_fall_back_to_units_per_em_fractions() {
        let layer = super::super::registry::UfoLayer::new("/a.ufo", "public.default", "a", true);
        let source = DsSource::new("a", "Regular", layer, Default::default(), true);
        let mut info = plist::Dictionary::new();
        info.insert("capHeight".into(), number_value(700.0));
        info.insert("openTypeOS2TypoAscender".into(), number_value(800.0));

        let font_source = font_source_from_info(&source, &info, &plist::Dictionary::new(), 2000.0);
        let metrics = &font_source.line_metrics_horizontal_layout;
        assert_eq!(metrics["capHeight"], LineMetric::new(700.0, 32.0));
        assert_eq!(metrics["descender"], LineMetric::new(-500.0, -32.0));
        assert_eq!(metrics["baseline"], LineMetric::new(0.0, -32.0));
        assert!(font_source.line_metrics_vertical_layout.is_empty());
        assert_eq!(font_source.custom_data["openTypeOS2TypoAscender"], 800);
    }

    #[test]
    fn font_source_round_trips_through_info() {
        let mut font_source = FontSource {
            italic_angle: -8.0,
            ..Default::default()
        };
        font_source
            .line_metrics_horizontal_layout
            .insert("xHeight".into(), LineMetric::new(480.0, 12.0));
        font_source
            .line_metrics_vertical_layout
            .insert("lineGap".into(), LineMetric::new(99.6, 0.0));
        font_source
            .custom_data
            .insert("postscriptBlueFuzz".into(), Json::from(1));

        let mut info = plist::Dictionary::new();
        info.insert("postscriptStemSnapH".into(), plist::Value::Array(vec![]));
        let mut lib = plist::Dictionary::new();
        update_info_from_font_source(&mut info, &mut lib, &font_source);

        assert_eq!(info.get("xHeight"), Some(&number_value(480.0)));
        // The vertical line gap is a custom-data attribute too; without a
        // custom-data entry it is cleared.
        assert!(info.get("openTypeVheaVertTypoLineGap").is_none());
        assert_eq!(info.get("italicAngle"), Some(&number_value(-8.0)));
        assert!(info.get("postscriptStemSnapH").is_none());
        let zones = lib[LINE_METRICS_ZONES_LIB_KEY].as_dictionary().unwrap();
        assert_eq!(zones.get("xHeight"), Some(&number_value(12.0)));
    }

    #[test]
    fn vertical_line_gap_survives_a_read_write_cycle() {
        let layer = super::super::registry::UfoLayer::new("/a.ufo", "public.default", "a", true);
        let source = DsSource::new("a", "Regular", layer, Default::default(), true);
        let mut info = plist::Dictionary::new();
        info.insert("openTypeVheaVertTypoLineGap".into(), number_value(120.0));

        let font_source = font_source_from_info(&source, &info, &plist::Dictionary::new(), 1000.0);
        assert_eq!(font_source.line_metrics_vertical_layout["lineGap"].value, 120.0);
        assert_eq!(font_source.custom_data["openTypeVheaVertTypoLineGap"], 120);

        let mut written = plist::Dictionary::new();
        update_info_from_font_source(&mut written, &mut plist::Dictionary::new(), &font_source);
        assert_eq!(written.get("openTypeVheaVertTypoLineGap"), Some(&number_value(120.0)));
    }
}
