//! The source registry
//!
//! [`ItemList`] is an append-only collection with lookup by any subset of
//! an item's fields. An index per queried field set is built on first use
//! and thrown away on every append, so repeated queries of the same shape
//! are hash lookups.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::document::SourceDescriptor;
use crate::model::GlyphSource;
use crate::space::{Location, LocationKey};

/// A hashable field value used in registry queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Str(String),
    Path(PathBuf),
    Location(LocationKey),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<&Path> for FieldValue {
    fn from(value: &Path) -> Self {
        FieldValue::Path(value.to_path_buf())
    }
}

impl From<&PathBuf> for FieldValue {
    fn from(value: &PathBuf) -> Self {
        FieldValue::Path(value.clone())
    }
}

impl From<LocationKey> for FieldValue {
    fn from(value: LocationKey) -> Self {
        FieldValue::Location(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Items that can be looked up by named fields.
pub trait Indexed {
    /// The value of `field`, or `None` for a field the item does not have.
    fn field(&self, field: &str) -> Option<FieldValue>;
}

type Index = HashMap<Vec<FieldValue>, Vec<usize>>;

#[derive(Debug)]
pub struct ItemList<T> {
    items: Vec<T>,
    indices: RefCell<HashMap<Vec<&'static str>, Index>>,
}

impl<T> Default for ItemList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            indices: RefCell::new(HashMap::new()),
        }
    }
}

impl<T: Clone> Clone for ItemList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            indices: RefCell::new(HashMap::new()),
        }
    }
}

impl<T: Indexed> ItemList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, item: T) {
        self.items.push(item);
        self.indices.get_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn find_first(&self, query: &[(&'static str, FieldValue)]) -> Option<&T> {
        self.positions(query)
            .first()
            .and_then(|index| self.items.get(*index))
    }

    pub fn find_all(&self, query: &[(&'static str, FieldValue)]) -> Vec<&T> {
        self.positions(query)
            .into_iter()
            .filter_map(|index| self.items.get(index))
            .collect()
    }

    fn positions(&self, query: &[(&'static str, FieldValue)]) -> Vec<usize> {
        let fields: Vec<&'static str> = query.iter().map(|(field, _)| *field).collect();
        let values: Vec<FieldValue> = query.iter().map(|(_, value)| value.clone()).collect();

        let mut indices = self.indices.borrow_mut();
        let index = indices.entry(fields).or_insert_with_key(|fields| {
            let mut index = Index::new();
            for (position, item) in self.items.iter().enumerate() {
                let key: Option<Vec<FieldValue>> =
                    fields.iter().map(|field| item.field(field)).collect();
                if let Some(key) = key {
                    index.entry(key).or_default().push(position);
                }
            }
            index
        });
        index.get(&values).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    fn cached_index_count(&self) -> usize {
        self.indices.borrow().len()
    }
}

impl<T: Indexed> FromIterator<T> for ItemList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            indices: RefCell::new(HashMap::new()),
        }
    }
}

impl<'a, T> IntoIterator for &'a ItemList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// One layer of one backing package, with the name clients know it by.
#[derive(Debug, Clone, PartialEq)]
pub struct UfoLayer {
    pub path: PathBuf,
    pub name: String,
    pub alias: String,
    pub is_default_layer: bool,
}

impl UfoLayer {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        alias: impl Into<String>,
        is_default_layer: bool,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            alias: alias.into(),
            is_default_layer,
        }
    }

    /// Package file name without extension.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Indexed for UfoLayer {
    fn field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "path" => Some((&self.path).into()),
            "name" => Some((&self.name).into()),
            "alias" => Some((&self.alias).into()),
            "default_layer" => Some(self.is_default_layer.into()),
            _ => None,
        }
    }
}

/// A logical source of the global design space
#[derive(Debug, Clone, PartialEq)]
pub struct DsSource {
    pub identifier: String,
    pub name: String,
    pub layer: UfoLayer,
    /// Dense, design coordinates
    pub location: Location,
    pub is_default: bool,
    location_key: LocationKey,
}

impl DsSource {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        layer: UfoLayer,
        location: Location,
        is_default: bool,
    ) -> Self {
        let location_key = LocationKey::new(&location);
        Self {
            identifier: identifier.into(),
            name: name.into(),
            layer,
            location,
            is_default,
            location_key,
        }
    }

    /// Sparse sources live in a non-default layer of some package.
    pub fn is_sparse(&self) -> bool {
        !self.layer.is_default_layer
    }

    pub fn location_key(&self) -> &LocationKey {
        &self.location_key
    }

    /// A copy with a new identity and location, backed by the same layer.
    pub fn renamed(&self, identifier: &str, name: &str, location: Location) -> Self {
        Self::new(identifier, name, self.layer.clone(), location, self.is_default)
    }

    /// The glyph source synthesized for a glyph that has data in this
    /// source's layer. Only named when local axes override global defaults.
    pub fn as_glyph_source(&self, local_default_override: &Location) -> GlyphSource {
        GlyphSource {
            name: if local_default_override.is_empty() {
                String::new()
            } else {
                self.name.clone()
            },
            layer_name: self.layer.alias.clone(),
            location: local_default_override.clone(),
            location_base: Some(self.identifier.clone()),
            ..Default::default()
        }
    }

    pub fn as_descriptor(&self, family_name: &str) -> SourceDescriptor {
        SourceDescriptor {
            name: Some(self.identifier.clone()),
            path: self.layer.path.clone(),
            family_name: Some(family_name.to_string()),
            style_name: Some(self.name.clone()),
            layer_name: (!self.layer.is_default_layer).then(|| self.layer.name.clone()),
            location: self.location.clone(),
        }
    }
}

impl Indexed for DsSource {
    fn field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "identifier" => Some((&self.identifier).into()),
            "name" => Some((&self.name).into()),
            "location" => Some(self.location_key.clone().into()),
            "default" => Some(self.is_default.into()),
            "path" => Some((&self.layer.path).into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(path: &str, name: &str, alias: &str) -> UfoLayer {
        UfoLayer::new(path, name, alias, name == "public.default")
    }

    #[test]
    fn lookups_by_field_subsets() {
        let mut layers = ItemList::new();
        layers.append(layer("/a.ufo", "public.default", "src0"));
        layers.append(layer("/a.ufo", "background", "src0^background"));
        layers.append(layer("/b.ufo", "public.default", "src1"));

        let found = layers
            .find_first(&[("path", Path::new("/a.ufo").into()), ("name", "background".into())])
            .unwrap();
        assert_eq!(found.alias, "src0^background");
        assert_eq!(layers.find_all(&[("path", Path::new("/a.ufo").into())]).len(), 2);
        assert!(layers.find_first(&[("alias", "nope".into())]).is_none());
        assert!(layers.find_first(&[("unknown", "x".into())]).is_none());
    }

    #[test]
    fn append_invalidates_indices() {
        let mut layers = ItemList::new();
        layers.append(layer("/a.ufo", "public.default", "src0"));
        assert!(layers.find_first(&[("alias", "src1".into())]).is_none());
        assert_eq!(layers.cached_index_count(), 1);

        layers.append(layer("/b.ufo", "public.default", "src1"));
        assert_eq!(layers.cached_index_count(), 0);
        assert!(layers.find_first(&[("alias", "src1".into())]).is_some());
    }

    #[test]
    fn sources_by_location_and_default_flag() {
        let light = Location::from([("weight".to_string(), 0.0)]);
        let bold = Location::from([("weight".to_string(), 1000.0)]);
        let sources: ItemList<DsSource> = [
            DsSource::new("light", "Light", layer("/a.ufo", "public.default", "light"), light, true),
            DsSource::new("bold", "Bold", layer("/b.ufo", "public.default", "bold"), bold.clone(), false),
        ]
        .into_iter()
        .collect();

        let found = sources
            .find_first(&[("location", LocationKey::new(&bold).into())])
            .unwrap();
        assert_eq!(found.identifier, "bold");
        assert_eq!(
            sources.find_first(&[("default", true.into())]).unwrap().identifier,
            "light"
        );
        assert!(!found.is_sparse());
        assert_eq!(found.as_glyph_source(&Location::new()).name, "");
    }
}
