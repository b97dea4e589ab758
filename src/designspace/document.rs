//! The `.designspace` document
//!
//! Axes, cross-axis mappings, sources and the document lib are modelled.
//! Everything else at the top level (rules, instances, variable-font
//! definitions, labels) is kept as raw elements and written back unchanged.

use std::fs;
use std::io::Cursor;
use std::path::{Component as PathComponent, Path, PathBuf};

use tracing::debug;

use super::xml::{self, Element};
use crate::core::errors::{BackendError, BackendResult};
use crate::model::{
    AxisHeader, AxisValueLabel, ContinuousAxis, CrossAxisMapping, DiscreteAxis, FontAxis,
};
use crate::space::{make_dense, map_forward, AxisSpace, Location};

const DEFAULT_FORMAT: &str = "5.0";
const MAPPINGS_FORMAT: &str = "5.1";

/// One `<source>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDescriptor {
    /// The `name` attribute, used as the source identifier
    pub name: Option<String>,
    /// Absolute, normalized path of the backing package
    pub path: PathBuf,
    pub family_name: Option<String>,
    pub style_name: Option<String>,
    pub layer_name: Option<String>,
    /// Design coordinates
    pub location: Location,
}

#[derive(Debug, Clone, Default)]
pub struct DesignspaceDocument {
    pub path: Option<PathBuf>,
    pub format_version: String,
    pub axes: Vec<FontAxis>,
    pub mappings: Vec<CrossAxisMapping>,
    pub sources: Vec<SourceDescriptor>,
    pub lib: plist::Dictionary,
    extra_before_sources: Vec<Element>,
    extra_after_sources: Vec<Element>,
}

impl DesignspaceDocument {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            format_version: DEFAULT_FORMAT.to_string(),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> BackendResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| BackendError::io(path, e))?;
        let invalid = |message: String| BackendError::Designspace {
            path: path.to_path_buf(),
            message,
        };
        let root = xml::parse(&text).map_err(invalid)?;
        if root.name != "designspace" {
            return Err(invalid(format!("unexpected root element <{}>", root.name)));
        }

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut document = Self::new(Some(path.to_path_buf()));
        document.format_version = root.attr("format").unwrap_or(DEFAULT_FORMAT).to_string();

        let mut seen_sources = false;
        for element in root.elements() {
            match element.name.as_str() {
                "axes" => {
                    for axis in element.children_named("axis") {
                        document.axes.push(read_axis(axis).map_err(invalid)?);
                    }
                    for group in element.children_named("mappings") {
                        for mapping in group.children_named("mapping") {
                            document.mappings.push(read_mapping(group, mapping));
                        }
                    }
                }
                "sources" => {
                    seen_sources = true;
                    for source in element.children_named("source") {
                        let source = read_source(source, &base_dir, &document.axes);
                        document.sources.push(source.map_err(invalid)?);
                    }
                }
                "lib" => {
                    if let Some(dict) = element.child("dict") {
                        document.lib = read_lib(dict).map_err(invalid)?;
                    }
                }
                _ if seen_sources => document.extra_after_sources.push(element.clone()),
                _ => document.extra_before_sources.push(element.clone()),
            }
        }

        debug!(
            "Loaded designspace {:?}: {} axes, {} sources",
            path,
            document.axes.len(),
            document.sources.len()
        );
        Ok(document)
    }

    /// Write the document to its path. Source locations are written dense.
    pub fn save(&self) -> BackendResult<()> {
        let Some(path) = &self.path else {
            return Err(BackendError::invariant("designspace document has no path"));
        };
        let invalid = |message: String| BackendError::Designspace {
            path: path.clone(),
            message,
        };
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let space = AxisSpace::new(self.axes.clone(), self.mappings.clone());

        let mut format = self.format_version.clone();
        if !self.mappings.is_empty() && format.as_str() < MAPPINGS_FORMAT {
            format = MAPPINGS_FORMAT.to_string();
        }
        let mut root = Element::new("designspace").with_attr("format", format);

        if !self.axes.is_empty() || !self.mappings.is_empty() {
            let mut axes = Element::new("axes");
            for axis in &self.axes {
                axes.push(write_axis(axis));
            }
            write_mappings(&mut axes, &self.mappings);
            root.push(axes);
        }
        for element in &self.extra_before_sources {
            root.push(element.clone());
        }
        if !self.sources.is_empty() {
            let mut sources = Element::new("sources");
            for source in &self.sources {
                let location = make_dense(&source.location, space.default_location());
                sources.push(write_source(source, &location, &base_dir, &self.axes));
            }
            root.push(sources);
        }
        for element in &self.extra_after_sources {
            root.push(element.clone());
        }
        if !self.lib.is_empty() {
            root.push(Element::new("lib").with_child(write_lib(&self.lib).map_err(invalid)?));
        }

        let text = xml::write(&root).map_err(invalid)?;
        fs::write(path, text).map_err(|e| BackendError::io(path, e))?;
        debug!("Wrote designspace {:?}", path);
        Ok(())
    }

    /// Index of the source sitting at the default location.
    pub fn find_default(&self, space: &AxisSpace) -> Option<usize> {
        let default_key = space.key(space.default_location());
        self.sources
            .iter()
            .position(|source| space.key(&source.location) == default_key)
    }

    /// Stem of the document file name.
    pub fn file_stem(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

fn parse_number(element: &Element, key: &str) -> Result<Option<f64>, String> {
    element
        .attr(key)
        .map(|text| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| format!("<{}> {key}=\"{text}\" is not a number", element.name))
        })
        .transpose()
}

fn require_number(element: &Element, key: &str) -> Result<f64, String> {
    parse_number(element, key)?
        .ok_or_else(|| format!("<{}> is missing the {key} attribute", element.name))
}

fn parse_flag(element: &Element, key: &str) -> bool {
    matches!(element.attr(key), Some("1" | "true"))
}

/// Whole numbers without a fractional part, the way designspace files are
/// usually written.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn read_axis(element: &Element) -> Result<FontAxis, String> {
    let name = element
        .attr("name")
        .ok_or("<axis> is missing the name attribute")?
        .to_string();

    let mapping = element
        .children_named("map")
        .map(|map| Ok((require_number(map, "input")?, require_number(map, "output")?)))
        .collect::<Result<Vec<_>, String>>()?;

    let mut value_labels = Vec::new();
    for labels in element.children_named("labels") {
        for label in labels.children_named("label") {
            value_labels.push(AxisValueLabel {
                name: label.attr("name").unwrap_or_default().to_string(),
                value: require_number(label, "uservalue")?,
                min_value: parse_number(label, "userminimum")?,
                max_value: parse_number(label, "usermaximum")?,
                linked_value: parse_number(label, "linkeduservalue")?,
                elidable: parse_flag(label, "elidable"),
                older_sibling: parse_flag(label, "oldersibling"),
            });
        }
    }

    let header = AxisHeader {
        label: name.clone(),
        name,
        tag: element.attr("tag").unwrap_or_default().to_string(),
        default_value: require_number(element, "default")?,
        mapping,
        value_labels,
        hidden: parse_flag(element, "hidden"),
    };

    match element.attr("values") {
        Some(values) => {
            let values = values
                .split_whitespace()
                .map(|v| v.parse::<f64>().map_err(|_| format!("bad axis value '{v}'")))
                .collect::<Result<Vec<_>, String>>()?;
            Ok(FontAxis::Discrete(DiscreteAxis { header, values }))
        }
        None => Ok(FontAxis::Continuous(ContinuousAxis {
            min_value: require_number(element, "minimum")?,
            max_value: require_number(element, "maximum")?,
            header,
        })),
    }
}

fn write_axis(axis: &FontAxis) -> Element {
    let header = axis.header();
    let mut element = Element::new("axis")
        .with_attr("tag", header.tag.as_str())
        .with_attr("name", header.name.as_str());
    match axis {
        FontAxis::Continuous(continuous) => {
            element.set_attr("minimum", format_number(continuous.min_value));
            element.set_attr("maximum", format_number(continuous.max_value));
        }
        FontAxis::Discrete(discrete) => {
            let values: Vec<String> = discrete.values.iter().map(|v| format_number(*v)).collect();
            element.set_attr("values", values.join(" "));
        }
    }
    element.set_attr("default", format_number(header.default_value));
    if header.hidden {
        element.set_attr("hidden", "1");
    }
    for (input, output) in &header.mapping {
        element.push(
            Element::new("map")
                .with_attr("input", format_number(*input))
                .with_attr("output", format_number(*output)),
        );
    }
    if !header.value_labels.is_empty() {
        let mut labels = Element::new("labels");
        for label in &header.value_labels {
            let mut entry = Element::new("label").with_attr("uservalue", format_number(label.value));
            if let Some(min) = label.min_value {
                entry.set_attr("userminimum", format_number(min));
            }
            if let Some(max) = label.max_value {
                entry.set_attr("usermaximum", format_number(max));
            }
            entry.set_attr("name", label.name.as_str());
            if let Some(linked) = label.linked_value {
                entry.set_attr("linkeduservalue", format_number(linked));
            }
            if label.elidable {
                entry.set_attr("elidable", "true");
            }
            if label.older_sibling {
                entry.set_attr("oldersibling", "true");
            }
            labels.push(entry);
        }
        element.push(labels);
    }
    element
}

fn read_dimensions(element: Option<&Element>, axes: &[FontAxis]) -> Location {
    let mut location = Location::new();
    let Some(element) = element else {
        return location;
    };
    for dimension in element.children_named("dimension") {
        let Some(name) = dimension.attr("name") else {
            continue;
        };
        let design = parse_number(dimension, "xvalue").ok().flatten();
        let value = design.or_else(|| {
            let user = parse_number(dimension, "uservalue").ok().flatten()?;
            let axis = axes.iter().find(|axis| axis.name() == name)?;
            Some(map_forward(axis, user))
        });
        if let Some(value) = value {
            location.insert(name.to_string(), value);
        }
    }
    location
}

fn write_dimensions(name: &str, location: &Location, axes: &[FontAxis]) -> Element {
    let mut element = Element::new(name);
    // Axis order first, then anything the document does not declare
    let ordered = axes
        .iter()
        .map(FontAxis::name)
        .filter(|axis| location.contains_key(*axis))
        .chain(
            location
                .keys()
                .map(String::as_str)
                .filter(|key| !axes.iter().any(|axis| axis.name() == *key)),
        );
    for axis_name in ordered {
        element.push(
            Element::new("dimension")
                .with_attr("name", axis_name)
                .with_attr("xvalue", format_number(location[axis_name])),
        );
    }
    element
}

fn read_mapping(group: &Element, mapping: &Element) -> CrossAxisMapping {
    CrossAxisMapping {
        description: mapping.attr("description").map(str::to_string),
        group_description: group.attr("description").map(str::to_string),
        input_location: read_dimensions(mapping.child("input"), &[]),
        output_location: read_dimensions(mapping.child("output"), &[]),
    }
}

fn write_mappings(axes: &mut Element, mappings: &[CrossAxisMapping]) {
    let mut group: Option<Element> = None;
    let mut group_description: Option<&Option<String>> = None;
    for mapping in mappings {
        if group_description != Some(&mapping.group_description) {
            if let Some(done) = group.take() {
                axes.push(done);
            }
            let mut element = Element::new("mappings");
            if let Some(description) = &mapping.group_description {
                element.set_attr("description", description.as_str());
            }
            group = Some(element);
            group_description = Some(&mapping.group_description);
        }
        let mut element = Element::new("mapping");
        if let Some(description) = &mapping.description {
            element.set_attr("description", description.as_str());
        }
        element.push(write_dimensions("input", &mapping.input_location, &[]));
        element.push(write_dimensions("output", &mapping.output_location, &[]));
        if let Some(group) = group.as_mut() {
            group.push(element);
        }
    }
    if let Some(done) = group {
        axes.push(done);
    }
}

fn read_source(
    element: &Element,
    base_dir: &Path,
    axes: &[FontAxis],
) -> Result<SourceDescriptor, String> {
    let file_name = element
        .attr("filename")
        .ok_or("<source> is missing the filename attribute")?;
    Ok(SourceDescriptor {
        name: element.attr("name").map(str::to_string),
        path: normalize_path(&base_dir.join(file_name)),
        family_name: element.attr("familyname").map(str::to_string),
        style_name: element.attr("stylename").map(str::to_string),
        layer_name: element.attr("layer").map(str::to_string),
        location: read_dimensions(element.child("location"), axes),
    })
}

fn write_source(
    source: &SourceDescriptor,
    location: &Location,
    base_dir: &Path,
    axes: &[FontAxis],
) -> Element {
    let file_name = relative_path(&source.path, base_dir);
    let mut element =
        Element::new("source").with_attr("filename", file_name.to_string_lossy().replace('\\', "/"));
    if let Some(name) = &source.name {
        element.set_attr("name", name.as_str());
    }
    if let Some(family_name) = &source.family_name {
        element.set_attr("familyname", family_name.as_str());
    }
    if let Some(style_name) = &source.style_name {
        element.set_attr("stylename", style_name.as_str());
    }
    if let Some(layer_name) = &source.layer_name {
        element.set_attr("layer", layer_name.as_str());
    }
    element.push(write_dimensions("location", location, axes));
    element
}

fn read_lib(dict: &Element) -> Result<plist::Dictionary, String> {
    let wrapped = Element::new("plist")
        .with_attr("version", "1.0")
        .with_child(dict.clone());
    let text = xml::write(&wrapped)?;
    let value = plist::Value::from_reader_xml(Cursor::new(text.into_bytes()))
        .map_err(|e| format!("invalid lib: {e}"))?;
    Ok(value.into_dictionary().unwrap_or_default())
}

fn write_lib(lib: &plist::Dictionary) -> Result<Element, String> {
    let mut buffer = Vec::new();
    plist::Value::Dictionary(lib.clone())
        .to_writer_xml(&mut buffer)
        .map_err(|e| format!("cannot encode lib: {e}"))?;
    let text = String::from_utf8(buffer).map_err(|e| e.to_string())?;
    let plist_root = xml::parse(&text)?;
    plist_root
        .child("dict")
        .cloned()
        .ok_or_else(|| "encoded lib has no dict".to_string())
}

/// Lexically resolve `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// `target` expressed relative to the directory `base`.
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target = normalize_path(target);
    let base = normalize_path(base);
    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUTATOR: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<designspace format="5.0">
  <axes>
    <axis tag="wght" name="weight" minimum="100" maximum="900" default="100">
      <map input="100" output="0"/>
      <map input="900" output="1000"/>
      <labels>
        <label uservalue="100" name="Thin" elidable="true"/>
      </labels>
    </axis>
    <axis tag="ital" name="italic" values="0 1" default="0"/>
  </axes>
  <rules processing="last">
    <rule name="dollar"><sub name="dollar" with="dollar.alt"/></rule>
  </rules>
  <sources>
    <source filename="Light.ufo" name="light" familyname="Test" stylename="Light">
      <location><dimension name="weight" xvalue="0"/></location>
    </source>
    <source filename="sub/../Bold.ufo" name="bold" stylename="Bold">
      <location><dimension name="weight" uservalue="900"/></location>
    </source>
  </sources>
  <lib>
    <dict>
      <key>com.example.flag</key>
      <true/>
    </dict>
  </lib>
</designspace>
"#;

    fn load_mutator(dir: &Path) -> DesignspaceDocument {
        let path = dir.join("Test.designspace");
        fs::write(&path, MUTATOR).unwrap();
        DesignspaceDocument::load(&path).unwrap()
    }

    #[test]
    fn reads_axes_sources_and_lib() {
        let dir = tempfile::tempdir().unwrap();
        let document = load_mutator(dir.path());

        assert_eq!(document.axes.len(), 2);
        assert_eq!(document.axes[0].mapping(), &[(100.0, 0.0), (900.0, 1000.0)]);
        assert_eq!(document.axes[0].header().value_labels[0].name, "Thin");
        assert!(matches!(document.axes[1], FontAxis::Discrete(_)));

        assert_eq!(document.sources[0].path, dir.path().join("Light.ufo"));
        assert_eq!(document.sources[1].path, dir.path().join("Bold.ufo"));
        assert_eq!(document.sources[1].location["weight"], 1000.0);
        assert_eq!(document.lib.get("com.example.flag"), Some(&plist::Value::Boolean(true)));

        let space = AxisSpace::new(document.axes.clone(), vec![]);
        assert_eq!(document.find_default(&space), Some(0));
    }

    #[test]
    fn rewrite_keeps_unmodelled_elements() {
        let dir = tempfile::tempdir().unwrap();
        let document = load_mutator(dir.path());
        document.save().unwrap();

        let text = fs::read_to_string(dir.path().join("Test.designspace")).unwrap();
        assert!(text.contains("dollar.alt"));
        assert!(text.contains(r#"filename="Bold.ufo""#));

        let again = DesignspaceDocument::load(&dir.path().join("Test.designspace")).unwrap();
        assert_eq!(again.axes, document.axes);
        assert_eq!(again.lib, document.lib);
        // Locations are written dense
        assert_eq!(again.sources[0].location.get("italic"), Some(&0.0));
    }

    #[test]
    fn mappings_are_grouped_by_description() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = DesignspaceDocument::new(Some(dir.path().join("M.designspace")));
        document.axes.push(FontAxis::continuous("weight", "wght", 0.0, 0.0, 1000.0));
        for description in ["a", "b"] {
            document.mappings.push(CrossAxisMapping {
                description: Some(description.to_string()),
                group_description: Some("group".to_string()),
                input_location: Location::from([("weight".to_string(), 500.0)]),
                output_location: Location::from([("weight".to_string(), 600.0)]),
            });
        }
        document.save().unwrap();

        let again = DesignspaceDocument::load(&dir.path().join("M.designspace")).unwrap();
        assert_eq!(again.format_version, "5.1");
        assert_eq!(again.mappings, document.mappings);
    }

    #[test]
    fn relative_paths() {
        assert_eq!(
            relative_path(Path::new("/a/b/c.ufo"), Path::new("/a/b")),
            PathBuf::from("c.ufo")
        );
        assert_eq!(
            relative_path(Path::new("/a/x/c.ufo"), Path::new("/a/b")),
            PathBuf::from("../x/c.ufo")
        );
        assert_eq!(format_number(400.0), "400");
        assert_eq!(format_number(0.5), "0.5");
    }
}
