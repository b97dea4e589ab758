//! A UFO 3 package on disk
//!
//! Everything is read and written piecemeal: glyph sets per layer, and the
//! font-level plists (info, lib, groups, kerning) only when asked. Font info
//! stays a raw plist dictionary keyed by UFO attribute names, since the
//! backend maps individual attributes rather than the whole structure.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::filenames::layer_dir_name;
use super::glyph_set::GlyphSet;
use super::plist_json::{as_number, number_value};
use crate::core::errors::{BackendError, BackendResult};

pub const DEFAULT_LAYER_NAME: &str = "public.default";
pub const DEFAULT_LAYER_DIR: &str = "glyphs";
pub const GLYPH_ORDER_KEY: &str = "public.glyphOrder";

const METAINFO_FILE: &str = "metainfo.plist";
const LAYER_CONTENTS_FILE: &str = "layercontents.plist";
const FONTINFO_FILE: &str = "fontinfo.plist";
const LIB_FILE: &str = "lib.plist";
const GROUPS_FILE: &str = "groups.plist";
const KERNING_FILE: &str = "kerning.plist";
const FEATURES_FILE: &str = "features.fea";
const IMAGES_DIR: &str = "images";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub type Groups = BTreeMap<String, Vec<String>>;
pub type KerningPairs = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug)]
pub struct UfoPackage {
    path: PathBuf,
    /// `(layer name, directory name)` in layercontents order
    layers: Vec<(String, String)>,
    glyph_sets: HashMap<String, GlyphSet>,
}

impl UfoPackage {
    /// Open the package at `path`, creating an empty one if nothing exists.
    pub fn open(path: &Path) -> BackendResult<Self> {
        if !path.join(METAINFO_FILE).exists() {
            return Self::create(path);
        }

        let layer_contents = path.join(LAYER_CONTENTS_FILE);
        let layers = if layer_contents.exists() {
            read_layer_contents(&layer_contents)?
        } else {
            vec![(DEFAULT_LAYER_NAME.to_string(), DEFAULT_LAYER_DIR.to_string())]
        };

        let mut glyph_sets = HashMap::new();
        for (layer_name, dir_name) in &layers {
            glyph_sets.insert(layer_name.clone(), GlyphSet::open(&path.join(dir_name))?);
        }
        debug!("Opened UFO {:?} with {} layers", path, layers.len());

        Ok(Self {
            path: path.to_path_buf(),
            layers,
            glyph_sets,
        })
    }

    /// Create a new package with metainfo, an empty default layer and the
    /// layer listing.
    pub fn create(path: &Path) -> BackendResult<Self> {
        fs::create_dir_all(path).map_err(|e| BackendError::io(path, e))?;

        let mut meta = plist::Dictionary::new();
        meta.insert("creator".into(), "org.bezy.backend".into());
        meta.insert("formatVersion".into(), plist::Value::Integer(3.into()));
        meta.insert("formatVersionMinor".into(), plist::Value::Integer(0.into()));
        write_dict(&path.join(METAINFO_FILE), &meta, false)?;

        let glyph_set = GlyphSet::open(&path.join(DEFAULT_LAYER_DIR))?;
        glyph_set.write_contents()?;

        let package = Self {
            path: path.to_path_buf(),
            layers: vec![(DEFAULT_LAYER_NAME.to_string(), DEFAULT_LAYER_DIR.to_string())],
            glyph_sets: HashMap::from([(DEFAULT_LAYER_NAME.to_string(), glyph_set)]),
        };
        package.write_layer_contents()?;
        info!("Created UFO {:?}", path);
        Ok(package)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without the `.ufo` extension.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn default_layer_name(&self) -> &str {
        self.layers
            .iter()
            .find(|(_, dir)| dir == DEFAULT_LAYER_DIR)
            .map(|(name, _)| name.as_str())
            .unwrap_or(DEFAULT_LAYER_NAME)
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn has_layer(&self, layer_name: &str) -> bool {
        self.glyph_sets.contains_key(layer_name)
    }

    pub fn glyph_set(&self, layer_name: &str) -> Option<&GlyphSet> {
        self.glyph_sets.get(layer_name)
    }

    pub fn glyph_set_mut(&mut self, layer_name: &str) -> Option<&mut GlyphSet> {
        self.glyph_sets.get_mut(layer_name)
    }

    pub fn glyph_sets_mut(&mut self) -> impl Iterator<Item = &mut GlyphSet> {
        self.glyph_sets.values_mut()
    }

    /// The glyph set of `layer_name`, creating the layer when it is new.
    pub fn ensure_layer(&mut self, layer_name: &str) -> BackendResult<&mut GlyphSet> {
        if !self.glyph_sets.contains_key(layer_name) {
            let existing: HashSet<String> =
                self.layers.iter().map(|(_, dir)| dir.to_lowercase()).collect();
            let dir_name = layer_dir_name(layer_name, &existing);
            let glyph_set = GlyphSet::open(&self.path.join(&dir_name))?;
            glyph_set.write_contents()?;
            self.layers.push((layer_name.to_string(), dir_name));
            self.glyph_sets.insert(layer_name.to_string(), glyph_set);
            self.write_layer_contents()?;
            debug!("Created layer '{}' in {:?}", layer_name, self.path);
        }
        self.glyph_sets
            .get_mut(layer_name)
            .ok_or_else(|| BackendError::invariant(format!("layer '{layer_name}' vanished")))
    }

    pub fn write_layer_contents(&self) -> BackendResult<()> {
        let array = self
            .layers
            .iter()
            .map(|(name, dir)| {
                plist::Value::Array(vec![
                    plist::Value::String(name.clone()),
                    plist::Value::String(dir.clone()),
                ])
            })
            .collect();
        let path = self.path.join(LAYER_CONTENTS_FILE);
        plist::to_file_xml(&path, &plist::Value::Array(array))
            .map_err(|e| BackendError::plist(&path, e))
    }

    pub fn read_info(&self) -> BackendResult<plist::Dictionary> {
        read_dict(&self.path.join(FONTINFO_FILE))
    }

    pub fn write_info(&self, info: &plist::Dictionary) -> BackendResult<()> {
        write_dict(&self.path.join(FONTINFO_FILE), info, false)
    }

    pub fn read_lib(&self) -> BackendResult<plist::Dictionary> {
        read_dict(&self.path.join(LIB_FILE))
    }

    pub fn write_lib(&self, lib: &plist::Dictionary) -> BackendResult<()> {
        write_dict(&self.path.join(LIB_FILE), lib, true)
    }

    pub fn read_groups(&self) -> BackendResult<Groups> {
        let dict = read_dict(&self.path.join(GROUPS_FILE))?;
        Ok(dict
            .iter()
            .filter_map(|(name, members)| {
                let members = members
                    .as_array()?
                    .iter()
                    .filter_map(|m| m.as_string().map(str::to_string))
                    .collect();
                Some((name.clone(), members))
            })
            .collect())
    }

    pub fn write_groups(&self, groups: &Groups) -> BackendResult<()> {
        let dict = groups
            .iter()
            .map(|(name, members)| {
                let members = members.iter().cloned().map(plist::Value::String).collect();
                (name.clone(), plist::Value::Array(members))
            })
            .collect();
        write_dict(&self.path.join(GROUPS_FILE), &dict, true)
    }

    pub fn read_kerning(&self) -> BackendResult<KerningPairs> {
        let dict = read_dict(&self.path.join(KERNING_FILE))?;
        Ok(dict
            .iter()
            .filter_map(|(left, rights)| {
                let rights = rights
                    .as_dictionary()?
                    .iter()
                    .filter_map(|(right, value)| Some((right.clone(), as_number(value)?)))
                    .collect();
                Some((left.clone(), rights))
            })
            .collect())
    }

    pub fn write_kerning(&self, kerning: &KerningPairs) -> BackendResult<()> {
        let dict = kerning
            .iter()
            .filter(|(_, rights)| !rights.is_empty())
            .map(|(left, rights)| {
                let rights = rights
                    .iter()
                    .map(|(right, value)| (right.clone(), number_value(*value)))
                    .collect();
                (left.clone(), plist::Value::Dictionary(rights))
            })
            .collect();
        write_dict(&self.path.join(KERNING_FILE), &dict, true)
    }

    pub fn read_features(&self) -> BackendResult<String> {
        let path = self.path.join(FEATURES_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(BackendError::io(&path, e)),
        }
    }

    pub fn write_features(&self, text: &str) -> BackendResult<()> {
        let path = self.path.join(FEATURES_FILE);
        if text.is_empty() {
            return remove_if_exists(&path);
        }
        fs::write(&path, text).map_err(|e| BackendError::io(&path, e))
    }

    /// Read an image from `images/`, rejecting anything that is not a PNG.
    pub fn read_image(&self, file_name: &str) -> BackendResult<Vec<u8>> {
        let path = self.path.join(IMAGES_DIR).join(file_name);
        let data = fs::read(&path).map_err(|e| BackendError::io(&path, e))?;
        if !data.starts_with(PNG_SIGNATURE) {
            return Err(BackendError::Image(format!(
                "{} is not a valid PNG image",
                path.display()
            )));
        }
        Ok(data)
    }

    pub fn write_image(&self, file_name: &str, data: &[u8]) -> BackendResult<()> {
        if !data.starts_with(PNG_SIGNATURE) {
            return Err(BackendError::Image(format!(
                "refusing to write non-PNG data to {file_name}"
            )));
        }
        let dir = self.path.join(IMAGES_DIR);
        fs::create_dir_all(&dir).map_err(|e| BackendError::io(&dir, e))?;
        let path = dir.join(file_name);
        fs::write(&path, data).map_err(|e| BackendError::io(&path, e))
    }

    /// Append `glyph_name` to `public.glyphOrder` if the package keeps one.
    pub fn ensure_in_glyph_order(&self, glyph_name: &str) -> BackendResult<()> {
        let mut lib = self.read_lib()?;
        let Some(order) = lib.get_mut(GLYPH_ORDER_KEY).and_then(|v| v.as_array_mut()) else {
            return Ok(());
        };
        if order.iter().any(|n| n.as_string() == Some(glyph_name)) {
            return Ok(());
        }
        order.push(plist::Value::String(glyph_name.to_string()));
        self.write_lib(&lib)
    }

    pub fn remove_from_glyph_order(&self, glyph_name: &str) -> BackendResult<()> {
        let mut lib = self.read_lib()?;
        let Some(order) = lib.get_mut(GLYPH_ORDER_KEY).and_then(|v| v.as_array_mut()) else {
            return Ok(());
        };
        let before = order.len();
        order.retain(|n| n.as_string() != Some(glyph_name));
        if order.len() == before {
            return Ok(());
        }
        self.write_lib(&lib)
    }
}

fn read_layer_contents(path: &Path) -> BackendResult<Vec<(String, String)>> {
    let value = plist::Value::from_file(path).map_err(|e| BackendError::plist(path, e))?;
    let layers = value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let pair = entry.as_array()?;
                    let name = pair.first()?.as_string()?;
                    let dir = pair.get(1)?.as_string()?;
                    Some((name.to_string(), dir.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(layers)
}

fn read_dict(path: &Path) -> BackendResult<plist::Dictionary> {
    if !path.exists() {
        return Ok(plist::Dictionary::new());
    }
    let value = plist::Value::from_file(path).map_err(|e| BackendError::plist(path, e))?;
    Ok(value.into_dictionary().unwrap_or_default())
}

fn write_dict(path: &Path, dict: &plist::Dictionary, remove_if_empty: bool) -> BackendResult<()> {
    if remove_if_empty && dict.is_empty() {
        return remove_if_exists(path);
    }
    plist::to_file_xml(path, &plist::Value::Dictionary(dict.clone()))
        .map_err(|e| BackendError::plist(path, e))
}

fn remove_if_exists(path: &Path) -> BackendResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackendError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_package_reopens_with_default_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test.ufo");
        UfoPackage::create(&path).unwrap();

        let package = UfoPackage::open(&path).unwrap();
        assert_eq!(package.default_layer_name(), DEFAULT_LAYER_NAME);
        assert_eq!(package.layer_names(), vec![DEFAULT_LAYER_NAME.to_string()]);
        assert_eq!(package.file_stem(), "Test");
    }

    #[test]
    fn new_layers_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test.ufo");
        let mut package = UfoPackage::create(&path).unwrap();
        package.ensure_layer("background").unwrap();
        assert!(path.join("glyphs.background/contents.plist").exists());

        let reopened = UfoPackage::open(&path).unwrap();
        assert!(reopened.has_layer("background"));
    }

    #[test]
    fn groups_kerning_and_features_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let package = UfoPackage::create(&dir.path().join("Test.ufo")).unwrap();

        let groups = Groups::from([("public.kern1.O".to_string(), vec!["O".into(), "Q".into()])]);
        package.write_groups(&groups).unwrap();
        assert_eq!(package.read_groups().unwrap(), groups);

        let kerning = KerningPairs::from([(
            "public.kern1.O".to_string(),
            BTreeMap::from([("A".to_string(), -20.0)]),
        )]);
        package.write_kerning(&kerning).unwrap();
        assert_eq!(package.read_kerning().unwrap(), kerning);

        package.write_features("languagesystem DFLT dflt;\n").unwrap();
        assert_eq!(package.read_features().unwrap(), "languagesystem DFLT dflt;\n");
        package.write_features("").unwrap();
        assert_eq!(package.read_features().unwrap(), "");
    }

    #[test]
    fn glyph_order_is_maintained_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let package = UfoPackage::create(&dir.path().join("Test.ufo")).unwrap();
        package.ensure_in_glyph_order("a").unwrap();
        assert!(package.read_lib().unwrap().is_empty());

        let mut lib = plist::Dictionary::new();
        lib.insert(GLYPH_ORDER_KEY.into(), plist::Value::Array(vec!["a".into()]));
        package.write_lib(&lib).unwrap();
        package.ensure_in_glyph_order("b").unwrap();
        package.remove_from_glyph_order("a").unwrap();
        let lib = package.read_lib().unwrap();
        assert_eq!(
            lib.get(GLYPH_ORDER_KEY),
            Some(&plist::Value::Array(vec!["b".into()]))
        );
    }

    #[test]
    fn non_png_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let package = UfoPackage::create(&dir.path().join("Test.ufo")).unwrap();
        assert!(package.write_image("x.png", b"not a png").is_err());
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(b"rest");
        package.write_image("x.png", &png).unwrap();
        assert_eq!(package.read_image("x.png").unwrap(), png);
    }
}
