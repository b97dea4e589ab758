//! Background images
//!
//! Images live as PNG files in a package's `images/` directory. Clients
//! know them by an identifier derived from the package and file name, so
//! the same file always gets the same identifier across sessions.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use tracing::{debug, warn};
use uuid::Uuid;

use super::DesignspaceBackend;
use crate::core::errors::{BackendError, BackendResult};
use crate::model::{ImageData, ImageType};

/// A two-sided map that only grows.
///
/// Removal is not supported: identifiers handed out to clients must keep
/// resolving for the lifetime of the backend.
#[derive(Debug, Clone)]
pub struct DoubleMap<K, V> {
    forward: HashMap<K, V>,
    reverse: HashMap<V, K>,
}

impl<K, V> Default for DoubleMap<K, V> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash, V: Clone + Eq + Hash> DoubleMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.reverse.insert(value.clone(), key.clone());
        self.forward.insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    pub fn get_by_value(&self, value: &V) -> Option<&K> {
        self.reverse.get(value)
    }
}

/// Stable identifier of `image_file_name` inside the package `ufo_file_name`.
pub fn make_image_identifier(ufo_file_name: &str, image_file_name: &str) -> String {
    let url = format!("https://fontra.xyz/image-ids/{ufo_file_name}/{image_file_name}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
}

/// Re-encode `data` as PNG unless it already is one.
pub fn convert_to_png(data: ImageData) -> BackendResult<ImageData> {
    let format = match data.image_type {
        ImageType::Png => return Ok(data),
        ImageType::Jpeg => ImageFormat::Jpeg,
    };
    let decoded = image::load_from_memory_with_format(&data.data, format)
        .map_err(|e| BackendError::Image(e.to_string()))?;
    let mut buffer = Cursor::new(Vec::new());
    decoded
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| BackendError::Image(e.to_string()))?;
    Ok(ImageData {
        image_type: ImageType::Png,
        data: buffer.into_inner(),
    })
}

impl DesignspaceBackend {
    /// Identifier for an image file referenced from the package at
    /// `ufo_path`, registered for later lookups.
    pub(super) fn image_identifier(&mut self, ufo_path: &Path, image_file_name: &str) -> String {
        let key = (ufo_path.to_path_buf(), image_file_name.to_string());
        if let Some(identifier) = self.images.get(&key) {
            return identifier.clone();
        }
        let ufo_file_name = ufo_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let identifier = make_image_identifier(&ufo_file_name, image_file_name);
        self.images.insert(key, identifier.clone());
        identifier
    }

    /// File name under which a glyph in the package at `ufo_path` refers to
    /// the image `identifier`. Image data received before any glyph used the
    /// identifier is written now.
    pub(super) fn place_background_image(
        &mut self,
        identifier: &str,
        ufo_path: &Path,
    ) -> BackendResult<String> {
        if let Some((_, file_name)) = self.images.get_by_value(&identifier.to_string()) {
            return Ok(file_name.clone());
        }
        let file_name = format!("{identifier}.png");
        self.images.insert(
            (ufo_path.to_path_buf(), file_name.clone()),
            identifier.to_string(),
        );
        if let Some(data) = self.pending_images.remove(identifier) {
            self.put_background_image(identifier, data)?;
        }
        Ok(file_name)
    }

    /// PNG data of the image `identifier`. Unknown identifiers and files
    /// that fail validation yield `None`.
    pub fn get_background_image(&self, identifier: &str) -> Option<ImageData> {
        let (ufo_path, file_name) = self.images.get_by_value(&identifier.to_string())?;
        let package = match self.ufos.get(ufo_path) {
            Ok(package) => package,
            Err(e) => {
                warn!("Background image '{}': {}", identifier, e);
                return None;
            }
        };
        match package.read_image(file_name) {
            Ok(data) => Some(ImageData {
                image_type: ImageType::Png,
                data,
            }),
            Err(e) => {
                warn!("Could not read background image '{}': {}", identifier, e);
                None
            }
        }
    }

    /// Store image data for `identifier`. Data for an identifier no glyph
    /// references yet is held until one does.
    pub fn put_background_image(&mut self, identifier: &str, data: ImageData) -> BackendResult<()> {
        let Some((ufo_path, file_name)) = self.images.get_by_value(&identifier.to_string()).cloned()
        else {
            debug!("Holding image '{}' until a glyph refers to it", identifier);
            self.pending_images.insert(identifier.to_string(), data);
            return Ok(());
        };
        let data = convert_to_png(data)?;
        self.ufos.open(&ufo_path)?.write_image(&file_name, &data.data)
    }
}
