//! The designspace backend
//!
//! One `.designspace` document plus the UFO packages it lists, served as a
//! single variable-glyph font. A lone `.ufo` is served the same way, as a
//! project with one source and no axes.
//!
//! The work is split across this module's files: the registry of sources
//! and layers (here), the glyph read/write path (`glyphs`), creation of new
//! packages and layers (`lifecycle`), external-change handling
//! (`reconcile`), and the font-level data (`fontinfo`, `kerning`,
//! `features`, `images`).

pub mod document;
mod features;
mod fontinfo;
mod glyphs;
mod images;
mod kerning;
mod lifecycle;
mod reconcile;
pub mod registry;
pub mod xml;

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

pub use document::{DesignspaceDocument, SourceDescriptor};
pub use reconcile::ReloadPattern;
pub use registry::{DsSource, FieldValue, Indexed, ItemList, UfoLayer};

use crate::core::errors::{BackendError, BackendResult};
use crate::dependencies::DependencyCache;
use crate::model::{Axes, GlyphMap, ImageData};
use crate::space::AxisSpace;
use crate::ufo::glif::extract_name_and_codepoints;
use crate::ufo::package::DEFAULT_LAYER_DIR;
use crate::ufo::UfoManager;
use crate::watcher::ChangeFeed;
use images::DoubleMap;

pub const GLYPH_DESIGNSPACE_LIB_KEY: &str = "com.black-foundry.glyph-designspace";
pub const SOURCE_NAME_MAPPING_LIB_KEY: &str = "xyz.fontra.source-names";
pub const LAYER_NAME_MAPPING_LIB_KEY: &str = "xyz.fontra.layer-names";
pub const GLYPH_CUSTOM_DATA_LIB_KEY: &str = "xyz.fontra.customData";
pub const GLYPH_SOURCE_CUSTOM_DATA_LIB_KEY: &str = "xyz.fontra.glyph.source.customData";
pub const OVERLAP_SIMPLE_LIB_KEY: &str = "public.truetype.overlap";

const SINGLE_UFO_SOURCE_NAME: &str = "default";
const TEMP_SOURCE_PREFIX: &str = "temp_master.";
const UNTITLED_FAMILY: &str = "Untitled";

/// Tunables of an open backend
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Quiet period before a batch of filesystem events is delivered
    pub debounce: Duration,
    /// Pause before re-reading listings that may still be in the middle of
    /// being written
    pub settle_delay: Duration,
    /// Mark every written glyph with `public.truetype.overlap`
    pub set_overlap_simple_flag: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            settle_delay: Duration::from_millis(150),
            set_overlap_simple_flag: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Designspace,
    SingleUfo,
}

/// Modification times the backend itself produced for a glyph
#[derive(Debug, Clone, PartialEq)]
pub enum SavedModTimes {
    /// Deleted everywhere by this backend
    Deleted,
    /// One entry per layer written or pruned; `None` marks a removal
    Times(Vec<Option<SystemTime>>),
}

pub struct DesignspaceBackend {
    kind: BackendKind,
    options: BackendOptions,
    document: DesignspaceDocument,
    document_mtime: Option<SystemTime>,
    space: AxisSpace,
    ufos: UfoManager,
    sources: ItemList<DsSource>,
    layers: ItemList<UfoLayer>,
    /// Sources removed by `put_sources`, revived if they come back
    zombies: HashMap<String, DsSource>,
    /// `.glif` file name -> glyph name, across every layer
    glif_file_names: HashMap<String, String>,
    glyph_map: GlyphMap,
    saved_mod_times: HashMap<String, SavedModTimes>,
    family_name: Option<String>,
    default_font_info: Option<plist::Dictionary>,
    implicit_location_base: Option<String>,
    images: DoubleMap<(PathBuf, String), String>,
    pending_images: HashMap<String, ImageData>,
    dependencies: DependencyCache,
    watcher: Option<ChangeFeed>,
    pending_patterns: VecDeque<ReloadPattern>,
}

impl std::fmt::Debug for DesignspaceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignspaceBackend")
            .field("kind", &self.kind)
            .field("document", &self.document.path)
            .field("sources", &self.sources.len())
            .field("layers", &self.layers.len())
            .field("glyphs", &self.glyph_map.len())
            .finish_non_exhaustive()
    }
}

impl DesignspaceBackend {
    /// Open a `.designspace` document or a single `.ufo` package.
    pub fn open(path: &Path) -> BackendResult<Self> {
        Self::open_with(path, BackendOptions::default())
    }

    pub fn open_with(path: &Path, options: BackendOptions) -> BackendResult<Self> {
        let path = &absolute_path(path)?;
        match extension(path).as_deref() {
            Some("designspace") => {
                let document = DesignspaceDocument::load(path)?;
                Self::from_document(BackendKind::Designspace, document, options)
            }
            Some("ufo") => {
                let document = single_ufo_document(path);
                Self::from_document(BackendKind::SingleUfo, document, options)
            }
            _ => Err(BackendError::UnsupportedSource(path.to_path_buf())),
        }
    }

    /// Create a new, empty project at `path`.
    pub fn create(path: &Path) -> BackendResult<Self> {
        Self::create_with(path, BackendOptions::default())
    }

    pub fn create_with(path: &Path, options: BackendOptions) -> BackendResult<Self> {
        let path = &absolute_path(path)?;
        match extension(path).as_deref() {
            Some("designspace") => {
                let document = DesignspaceDocument::new(Some(path.to_path_buf()));
                document.save()?;
                info!("Created designspace {:?}", path);
                Self::from_document(BackendKind::Designspace, document, options)
            }
            Some("ufo") => {
                lifecycle::create_fresh_ufo(path)?;
                let document = single_ufo_document(path);
                Self::from_document(BackendKind::SingleUfo, document, options)
            }
            _ => Err(BackendError::UnsupportedSource(path.to_path_buf())),
        }
    }

    fn from_document(
        kind: BackendKind,
        document: DesignspaceDocument,
        options: BackendOptions,
    ) -> BackendResult<Self> {
        let mut backend = Self {
            kind,
            options,
            document: DesignspaceDocument::default(),
            document_mtime: None,
            space: AxisSpace::default(),
            ufos: UfoManager::new(),
            sources: ItemList::new(),
            layers: ItemList::new(),
            zombies: HashMap::new(),
            glif_file_names: HashMap::new(),
            glyph_map: GlyphMap::new(),
            saved_mod_times: HashMap::new(),
            family_name: None,
            default_font_info: None,
            implicit_location_base: None,
            images: DoubleMap::new(),
            pending_images: HashMap::new(),
            dependencies: DependencyCache::new(),
            watcher: None,
            pending_patterns: VecDeque::new(),
        };
        backend.initialize(document)?;
        Ok(backend)
    }

    /// (Re)build every piece of derived state from `document`.
    fn initialize(&mut self, mut document: DesignspaceDocument) -> BackendResult<()> {
        ensure_source_names_are_unique(&mut document);
        self.document_mtime = match self.kind {
            BackendKind::Designspace => document.path.as_deref().and_then(modification_time),
            BackendKind::SingleUfo => None,
        };
        self.document = document;
        self.ufos = UfoManager::new();
        self.family_name = None;
        self.update_axis_info();
        self.load_ufo_layers()?;
        self.build_glif_file_names();
        self.glyph_map = self.read_glyph_map()?;
        self.saved_mod_times.clear();
        self.zombies.clear();
        self.default_font_info = None;
        self.implicit_location_base = None;
        self.dependencies.reset();
        info!(
            "Opened {:?}: {} sources, {} layers, {} glyphs",
            self.document.path,
            self.sources.len(),
            self.layers.len(),
            self.glyph_map.len()
        );
        Ok(())
    }

    fn update_axis_info(&mut self) {
        self.space = AxisSpace::new(self.document.axes.clone(), self.document.mappings.clone());
    }

    fn load_ufo_layers(&mut self) -> BackendResult<()> {
        self.sources = ItemList::new();
        self.layers = ItemList::new();

        let default_index = self.document.find_default(&self.space);
        let mut unique_name = UniqueNames::default();

        for (index, descriptor) in self.document.sources.clone().into_iter().enumerate() {
            if self.family_name.is_none() {
                self.family_name = descriptor.family_name.clone().filter(|n| !n.is_empty());
            }
            let identifier = match &descriptor.name {
                Some(name) => name.clone(),
                None => make_source_identifier(index, None, &HashSet::new()),
            };

            let package = self.ufos.open(&descriptor.path)?;
            let default_layer_name = package.default_layer_name().to_string();
            let layer_name = descriptor
                .layer_name
                .clone()
                .unwrap_or_else(|| default_layer_name.clone());
            package.ensure_layer(&layer_name)?;

            let existing = self
                .layers
                .find_first(&[
                    ("path", (&descriptor.path).into()),
                    ("name", (&layer_name).into()),
                ])
                .cloned();
            let layer = match existing {
                Some(layer) => layer,
                None => {
                    let layer = UfoLayer::new(
                        &descriptor.path,
                        &layer_name,
                        &identifier,
                        layer_name == default_layer_name,
                    );
                    self.layers.append(layer.clone());
                    layer
                }
            };

            let display_name = match descriptor.style_name.as_deref() {
                Some(style_name) if !style_name.is_empty() => style_name.to_string(),
                _ if layer.is_default_layer => layer.file_stem(),
                _ => layer_name.clone(),
            };
            let display_name = unique_name.make(&display_name);

            let location = self.space.to_dense(&descriptor.location);
            self.sources.append(DsSource::new(
                identifier,
                display_name,
                layer,
                location,
                Some(index) == default_index,
            ));
        }

        self.add_non_source_layers()?;
        self.warn_about_coinciding_sources();
        self.update_paths_to_watch();
        Ok(())
    }

    /// Register background and other layers no source points at.
    fn add_non_source_layers(&mut self) -> BackendResult<()> {
        for descriptor in self.document.sources.clone() {
            let Some(identifier) = descriptor.name.clone() else {
                continue;
            };
            let package = self.ufos.open(&descriptor.path)?;
            let default_layer_name = package.default_layer_name().to_string();
            for layer_name in package.layer_names() {
                let known = self
                    .layers
                    .find_first(&[
                        ("path", (&descriptor.path).into()),
                        ("name", (&layer_name).into()),
                    ])
                    .is_some();
                if known {
                    continue;
                }
                let alias = self.layer_alias(&identifier, &layer_name);
                let is_default = layer_name == default_layer_name;
                self.layers
                    .append(UfoLayer::new(&descriptor.path, layer_name, alias, is_default));
            }
        }
        Ok(())
    }

    /// `<source>^<layer>`, unless the layer name already starts with a known
    /// source identifier.
    fn layer_alias(&self, source_identifier: &str, layer_name: &str) -> String {
        if let Some((prefix, _)) = layer_name.split_once('^') {
            if self
                .sources
                .find_first(&[("identifier", prefix.into())])
                .is_some()
            {
                return layer_name.to_string();
            }
        }
        format!("{source_identifier}^{layer_name}")
    }

    fn warn_about_coinciding_sources(&self) {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.location_key().clone()) {
                warn!(
                    "Source '{}' shares its location with an earlier source; lookups resolve to the first",
                    source.identifier
                );
            }
        }
    }

    fn build_glif_file_names(&mut self) {
        let mut file_names = HashMap::new();
        for layer in &self.layers {
            if let Some(glyph_set) = self.ufos.glyph_set(&layer.path, &layer.name) {
                for (glyph_name, file_name) in glyph_set.contents() {
                    file_names.insert(file_name.clone(), glyph_name.clone());
                }
            }
        }
        self.glif_file_names = file_names;
    }

    /// Write the listing of one layer and record its file names.
    fn update_glyph_set_contents(&mut self, layer: &UfoLayer) -> BackendResult<()> {
        let glyph_set = self
            .ufos
            .glyph_set(&layer.path, &layer.name)
            .ok_or_else(|| BackendError::invariant(format!("layer '{}' not loaded", layer.name)))?;
        glyph_set.write_contents()?;
        for (glyph_name, file_name) in glyph_set.contents() {
            self.glif_file_names
                .insert(file_name.clone(), glyph_name.clone());
        }
        Ok(())
    }

    fn read_glyph_map(&self) -> BackendResult<GlyphMap> {
        let mut glyph_map = GlyphMap::new();
        let Some(source) = self.default_source() else {
            return Ok(glyph_map);
        };
        let Some(glyph_set) = self.ufos.glyph_set(&source.layer.path, &source.layer.name) else {
            return Ok(glyph_map);
        };
        for glyph_name in glyph_set.names() {
            let Some(path) = glyph_set.glif_path(glyph_name) else {
                continue;
            };
            let text = fs::read_to_string(&path).map_err(|e| BackendError::io(&path, e))?;
            match extract_name_and_codepoints(&text) {
                Ok((_, codepoints)) => {
                    glyph_map.insert(glyph_name.to_string(), codepoints);
                }
                Err(message) => warn!("Skipping unreadable glyph {:?}: {}", path, message),
            }
        }
        Ok(glyph_map)
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document.path.as_deref()
    }

    pub fn axis_space(&self) -> &AxisSpace {
        &self.space
    }

    pub fn sources(&self) -> &ItemList<DsSource> {
        &self.sources
    }

    pub fn layers(&self) -> &ItemList<UfoLayer> {
        &self.layers
    }

    pub fn default_source(&self) -> Option<&DsSource> {
        self.sources.find_first(&[("default", true.into())])
    }

    fn default_layer(&self) -> BackendResult<UfoLayer> {
        self.default_source()
            .map(|source| source.layer.clone())
            .ok_or_else(|| BackendError::invariant("project has no default source"))
    }

    /// Directory new packages are created in.
    fn ufo_dir(&self) -> PathBuf {
        let anchor = match self.default_source() {
            Some(source) => Some(source.layer.path.clone()),
            None => self.document.path.clone(),
        };
        anchor
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .unwrap_or_default()
    }

    fn family_name(&self) -> String {
        self.family_name
            .clone()
            .unwrap_or_else(|| UNTITLED_FAMILY.to_string())
    }

    pub fn glyph_map(&self) -> GlyphMap {
        self.glyph_map.clone()
    }

    /// Glyph order and code points follow the glyph files; nothing to store.
    pub fn put_glyph_map(&mut self, _glyph_map: GlyphMap) {}

    pub fn axes(&self) -> Axes {
        Axes {
            axes: self.space.axes.clone(),
            mappings: self.space.mappings.clone(),
        }
    }

    pub fn put_axes(&mut self, axes: Axes) -> BackendResult<()> {
        if self.kind == BackendKind::SingleUfo {
            if axes.axes.is_empty() && axes.mappings.is_empty() {
                return Ok(());
            }
            return Err(BackendError::SingleUfoAxes);
        }
        self.document.axes = axes.axes;
        self.document.mappings = axes.mappings;
        self.update_axis_info();
        self.write_document()?;
        self.load_ufo_layers()
    }

    pub fn custom_data(&self) -> BackendResult<crate::model::CustomData> {
        let lib = match self.kind {
            BackendKind::Designspace => self.document.lib.clone(),
            BackendKind::SingleUfo => self.ufos.get(&self.default_layer()?.path)?.read_lib()?,
        };
        Ok(crate::ufo::plist_json::dict_to_json(&lib))
    }

    pub fn put_custom_data(&mut self, data: &crate::model::CustomData) -> BackendResult<()> {
        let lib = crate::ufo::plist_json::json_to_dict(data);
        match self.kind {
            BackendKind::Designspace => {
                self.document.lib = lib;
                self.write_document()
            }
            BackendKind::SingleUfo => self.ufos.get(&self.default_layer()?.path)?.write_lib(&lib),
        }
    }

    fn write_document(&mut self) -> BackendResult<()> {
        if self.kind == BackendKind::SingleUfo {
            return Ok(());
        }
        let default_location = self.space.default_location().clone();
        for source in &mut self.document.sources {
            source.location = crate::space::merge(&default_location, &source.location);
        }
        self.document.save()?;
        self.document_mtime = self.document.path.as_deref().and_then(modification_time);
        Ok(())
    }

    /// Every package directory plus the document itself.
    fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .layers
            .iter()
            .map(|layer| layer.path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if self.kind == BackendKind::Designspace {
            if let Some(path) = &self.document.path {
                paths.push(path.clone());
            }
        }
        paths
    }

    fn update_paths_to_watch(&mut self) {
        let paths = self.watched_paths();
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(e) = watcher.subscribe(&paths) {
                warn!("Could not watch project files: {}", e);
            }
        }
    }

    /// Names of glyphs using `glyph_name` as a component, sorted.
    pub async fn find_glyphs_that_use_glyph(&self, glyph_name: &str) -> BackendResult<Vec<String>> {
        let dir = self.default_glyph_set_dir();
        self.dependencies
            .find_glyphs_that_use_glyph(dir, glyph_name)
            .await
    }

    /// Kick off the dependency scan without waiting for it.
    pub fn start_background_tasks(&self) {
        let dependencies = self.dependencies.clone();
        let dir = self.default_glyph_set_dir();
        tokio::spawn(async move {
            if let Err(e) = dependencies.with(dir, |_| ()).await {
                debug!("Background dependency scan ended: {}", e);
            }
        });
    }

    pub fn dependencies(&self) -> &DependencyCache {
        &self.dependencies
    }

    fn default_glyph_set_dir(&self) -> Option<PathBuf> {
        let layer = &self.default_source()?.layer;
        self.ufos
            .glyph_set(&layer.path, &layer.name)
            .map(|glyph_set| glyph_set.dir().to_path_buf())
    }

    /// Stop the watcher and any dependency scan in flight.
    pub fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.close();
        }
        self.dependencies.close();
        debug!("Closed backend for {:?}", self.document.path);
    }
}

impl Drop for DesignspaceBackend {
    fn drop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.close();
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn absolute_path(path: &Path) -> BackendResult<PathBuf> {
    std::path::absolute(path)
        .map(|path| document::normalize_path(&path))
        .map_err(|e| BackendError::io(path, e))
}

pub(crate) fn modification_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// The implicit document of a single-package project.
fn single_ufo_document(path: &Path) -> DesignspaceDocument {
    let mut document = DesignspaceDocument::new(None);
    document.sources.push(SourceDescriptor {
        name: Some(SINGLE_UFO_SOURCE_NAME.to_string()),
        path: path.to_path_buf(),
        style_name: Some(SINGLE_UFO_SOURCE_NAME.to_string()),
        ..Default::default()
    });
    document
}

/// Make every source identifier present and unique. Leaves the document
/// alone when it already is.
fn ensure_source_names_are_unique(document: &mut DesignspaceDocument) {
    let names: HashSet<&str> = document
        .sources
        .iter()
        .filter_map(|source| source.name.as_deref())
        .filter(|name| !name.starts_with(TEMP_SOURCE_PREFIX))
        .collect();
    if names.len() == document.sources.len() {
        return;
    }

    let mut used = HashSet::new();
    for (index, source) in document.sources.iter_mut().enumerate() {
        let original = source
            .name
            .take()
            .filter(|name| !name.starts_with(TEMP_SOURCE_PREFIX));
        let identifier = make_source_identifier(index, original.as_deref(), &used);
        used.insert(identifier.clone());
        source.name = Some(identifier);
    }
}

/// `<original>::source<NNN>[#k]`, or the original name itself when it is
/// non-empty and unused.
pub(crate) fn make_source_identifier(
    index: usize,
    original: Option<&str>,
    used: &HashSet<String>,
) -> String {
    let original = original.unwrap_or_default();
    let mut identifier = original.to_string();
    let mut counter = 0;
    while identifier.is_empty() || used.contains(&identifier) {
        let suffix = if counter > 0 {
            format!("#{counter}")
        } else {
            String::new()
        };
        identifier = format!("{original}::source{index:03}{suffix}");
        counter += 1;
    }
    identifier
}

/// Hands out `name`, `name#1`, `name#2`, ... never repeating itself.
#[derive(Debug, Default)]
pub(crate) struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    pub(crate) fn with_existing(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            used: names.into_iter().collect(),
        }
    }

    pub(crate) fn make(&mut self, name: &str) -> String {
        let mut unique = name.to_string();
        let mut count = 0;
        while self.used.contains(&unique) {
            count += 1;
            unique = format!("{name}#{count}");
        }
        self.used.insert(unique.clone());
        unique
    }
}

/// Path of the default layer directory of a package.
fn default_glyphs_dir(package_path: &Path) -> PathBuf {
    package_path.join(DEFAULT_LAYER_DIR)
}
