//! Whole-backend scenarios on projects built in a temporary directory

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::core::errors::BackendError;
use crate::designspace::{BackendKind, DesignspaceBackend, ReloadPattern};
use crate::model::{
    Axes, Component, ContourData, FontAxis, FontInfo, GlyphAxis, GlyphSource, Kerning, Layer,
    OutlineData, PointData, PointTypeData, StaticGlyph, VariableGlyph,
};
use crate::space::Location;
use crate::ufo::UfoPackage;
use crate::watcher::{ChangeFeed, ChangeKind};

fn weight_axes() -> Axes {
    Axes {
        axes: vec![FontAxis::continuous("weight", "wght", 0.0, 0.0, 1000.0)],
        mappings: vec![],
    }
}

fn location(weight: f64) -> Location {
    Location::from([("weight".to_string(), weight)])
}

fn square(size: f64, x_advance: f64) -> StaticGlyph {
    let point = |x, y| PointData {
        x,
        y,
        point_type: PointTypeData::Line,
        smooth: false,
        name: None,
    };
    StaticGlyph {
        path: OutlineData {
            contours: vec![ContourData {
                points: vec![
                    point(0.0, 0.0),
                    point(0.0, size),
                    point(size, size),
                    point(size, 0.0),
                ],
            }],
        },
        x_advance: Some(x_advance),
        ..Default::default()
    }
}

fn glyph_source(name: &str, weight: f64) -> GlyphSource {
    GlyphSource {
        name: name.to_string(),
        layer_name: name.to_string(),
        location: location(weight),
        ..Default::default()
    }
}

/// Glyph with a light source at weight 0 and a bold one at 1000.
fn two_source_glyph(name: &str) -> VariableGlyph {
    let mut glyph = VariableGlyph::new(name);
    glyph.sources = vec![glyph_source("Light", 0.0), glyph_source("Bold", 1000.0)];
    glyph
        .layers
        .insert("Light".into(), Layer::new(square(100.0, 400.0)));
    glyph
        .layers
        .insert("Bold".into(), Layer::new(square(200.0, 600.0)));
    glyph
}

/// A fresh weight-axis project holding glyph "A" in two sources.
fn two_source_project(dir: &Path) -> (PathBuf, DesignspaceBackend) {
    let path = dir.join("Test.designspace");
    let mut backend = DesignspaceBackend::create(&path).unwrap();
    backend.put_axes(weight_axes()).unwrap();
    backend
        .put_glyph("A", &two_source_glyph("A"), vec![0x41])
        .unwrap();
    (path, backend)
}

fn default_glif_path(backend: &DesignspaceBackend, file_name: &str) -> PathBuf {
    backend
        .default_source()
        .unwrap()
        .layer
        .path
        .join("glyphs")
        .join(file_name)
}

#[test]
fn new_glyph_creates_one_package_per_pole_source() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());

    assert_eq!(backend.kind(), BackendKind::Designspace);
    assert_eq!(backend.sources().len(), 2);
    assert!(dir.path().join("Test_Light.ufo").is_dir());
    assert!(dir.path().join("Test_Bold.ufo").is_dir());
    assert_eq!(backend.glyph_map().get("A"), Some(&vec![0x41]));

    let glyph = backend.get_glyph("A").unwrap().unwrap();
    assert_eq!(glyph.sources.len(), 2);
    let layer_names: BTreeSet<&str> = glyph.layers.keys().map(String::as_str).collect();
    assert_eq!(layer_names, BTreeSet::from(["Bold", "Light"]));
    for source in &glyph.sources {
        assert!(glyph.layers.contains_key(&source.layer_name));
        let base = source.location_base.as_deref().unwrap();
        assert!(backend
            .sources()
            .iter()
            .any(|ds_source| ds_source.identifier == base));
    }
    assert_eq!(glyph.layers["Bold"].glyph.x_advance, Some(600.0));

    let reopened = DesignspaceBackend::open(&path).unwrap();
    assert_eq!(reopened.axes(), weight_axes());
    assert_eq!(reopened.sources().len(), 2);
    let default = reopened.default_source().unwrap();
    assert_eq!(default.location, location(0.0));
    assert_eq!(default.name, "Light");
}

#[test]
fn glyph_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());
    let written = backend.get_glyph("A").unwrap().unwrap();
    drop(backend);

    let mut reopened = DesignspaceBackend::open(&path).unwrap();
    let read = reopened.get_glyph("A").unwrap().unwrap();
    assert_eq!(read.sources, written.sources);
    assert_eq!(read.layers["Light"].glyph.path, square(100.0, 400.0).path);
    assert_eq!(read.layers["Bold"].glyph.x_advance, Some(600.0));
    assert!(reopened.get_glyph("missing").unwrap().is_none());
}

#[test]
fn deleted_glyph_stays_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());

    backend.delete_glyph("A").unwrap();
    assert!(!backend.glyph_map().contains_key("A"));
    assert!(matches!(
        backend.delete_glyph("A"),
        Err(BackendError::GlyphNotFound(name)) if name == "A"
    ));

    let mut reopened = DesignspaceBackend::open(&path).unwrap();
    assert!(reopened.get_glyph("A").unwrap().is_none());
    assert!(reopened.glyph_map().is_empty());
}

#[tokio::test]
async fn component_users_are_tracked() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());

    let mut aacute = VariableGlyph::new("Aacute");
    aacute.sources = vec![glyph_source("Light", 0.0)];
    let mut layer_glyph = StaticGlyph::default();
    layer_glyph.components.push(Component::new("A"));
    aacute.layers.insert("Light".into(), Layer::new(layer_glyph));
    backend.put_glyph("Aacute", &aacute, vec![0xC1]).unwrap();

    let users = backend.find_glyphs_that_use_glyph("A").await.unwrap();
    assert_eq!(users, vec!["Aacute".to_string()]);
    assert!(backend
        .find_glyphs_that_use_glyph("Aacute")
        .await
        .unwrap()
        .is_empty());
}

#[test]
fn kerning_groups_merge_across_packages() {
    let dir = tempfile::tempdir().unwrap();
    let (path, backend) = two_source_project(dir.path());
    let identifiers: Vec<String> = backend
        .sources()
        .iter()
        .map(|source| source.identifier.clone())
        .collect();
    drop(backend);

    let light = UfoPackage::open(&dir.path().join("Test_Light.ufo")).unwrap();
    light
        .write_groups(&BTreeMap::from([(
            "public.kern1.O".to_string(),
            vec!["O".to_string(), "D".to_string()],
        )]))
        .unwrap();
    let bold = UfoPackage::open(&dir.path().join("Test_Bold.ufo")).unwrap();
    bold.write_groups(&BTreeMap::from([(
        "public.kern1.O".to_string(),
        vec!["O".to_string(), "Q".to_string()],
    )]))
    .unwrap();
    bold.write_kerning(&BTreeMap::from([(
        "public.kern1.O".to_string(),
        BTreeMap::from([("V".to_string(), -30.0)]),
    )]))
    .unwrap();

    let backend = DesignspaceBackend::open(&path).unwrap();
    let tables = backend.get_kerning().unwrap();
    let kerning = &tables["kern"];
    assert_eq!(kerning.source_identifiers, identifiers);
    assert_eq!(kerning.groups_side1["O"], vec!["O", "D", "Q"]);
    assert!(kerning.groups_side2.is_empty());
    assert_eq!(kerning.values["@O"]["V"], vec![None, Some(-30.0)]);
}

#[test]
fn kerning_writes_reach_every_package() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let identifiers: Vec<String> = backend
        .sources()
        .iter()
        .map(|source| source.identifier.clone())
        .collect();

    let table = Kerning {
        groups_side1: BTreeMap::from([("A".to_string(), vec!["A".to_string()])]),
        groups_side2: BTreeMap::new(),
        source_identifiers: identifiers.clone(),
        values: BTreeMap::from([(
            "@A".to_string(),
            BTreeMap::from([("V".to_string(), vec![Some(-10.0), Some(-20.0)])]),
        )]),
    };
    backend
        .put_kerning(&BTreeMap::from([("kern".to_string(), table.clone())]))
        .unwrap();
    assert_eq!(backend.get_kerning().unwrap()["kern"], table);

    let bold = UfoPackage::open(&dir.path().join("Test_Bold.ufo")).unwrap();
    assert_eq!(bold.read_kerning().unwrap()["public.kern1.A"]["V"], -20.0);

    let unknown = Kerning {
        source_identifiers: vec!["nope".into()],
        ..Default::default()
    };
    assert!(matches!(
        backend.put_kerning(&BTreeMap::from([("kern".to_string(), unknown)])),
        Err(BackendError::UnknownKerningSources(ids)) if ids == vec!["nope".to_string()]
    ));
}

#[tokio::test]
async fn external_edit_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let (feed, injector) = ChangeFeed::channel();
    backend.watch_external_changes(feed).unwrap();
    assert!(injector
        .subscribed()
        .contains(&dir.path().join("Test.designspace")));

    let glif = default_glif_path(&backend, "A_.glif");
    File::options()
        .write(true)
        .open(&glif)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    injector.send(vec![(ChangeKind::Modified, glif)]);

    let pattern = backend.next_external_change().await.unwrap();
    assert_eq!(
        pattern,
        Some(ReloadPattern::Partial {
            glyphs: BTreeSet::from(["A".to_string()]),
            glyph_map: BTreeMap::new(),
        })
    );

    backend.close();
    assert!(injector.is_closed());
}

#[tokio::test]
async fn own_writes_are_not_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let glif = default_glif_path(&backend, "A_.glif");

    let pattern = backend
        .process_external_changes(vec![(ChangeKind::Modified, glif.clone())])
        .await
        .unwrap();
    assert_eq!(pattern, None);

    // One recorded time per written layer; each echo uses one up
    backend
        .process_external_changes(vec![(ChangeKind::Modified, glif.clone())])
        .await
        .unwrap();
    let pattern = backend
        .process_external_changes(vec![(ChangeKind::Modified, glif)])
        .await
        .unwrap();
    assert!(matches!(pattern, Some(ReloadPattern::Partial { .. })));
}

#[tokio::test]
async fn externally_deleted_glyph_leaves_the_glyph_map() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let glif = default_glif_path(&backend, "A_.glif");
    std::fs::remove_file(&glif).unwrap();

    let pattern = backend
        .process_external_changes(vec![(ChangeKind::Deleted, glif)])
        .await
        .unwrap();
    assert_eq!(
        pattern,
        Some(ReloadPattern::Partial {
            glyphs: BTreeSet::from(["A".to_string()]),
            glyph_map: BTreeMap::from([("A".to_string(), None)]),
        })
    );
    assert!(!backend.glyph_map().contains_key("A"));
}

#[test]
fn one_unknown_location_base_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let default_alias = backend.default_source().unwrap().layer.alias.clone();

    let based_on = |glyph_name: &str, base: &str| {
        let mut glyph = VariableGlyph::new(glyph_name);
        glyph.sources = vec![GlyphSource {
            layer_name: default_alias.clone(),
            location_base: Some(base.to_string()),
            ..Default::default()
        }];
        glyph
            .layers
            .insert(default_alias.clone(), Layer::new(StaticGlyph::default()));
        glyph
    };

    backend.put_glyph("B", &based_on("B", "nope"), vec![]).unwrap();
    backend.put_glyph("C", &based_on("C", "nope"), vec![]).unwrap();
    assert!(matches!(
        backend.put_glyph("D", &based_on("D", "other"), vec![]),
        Err(BackendError::UnknownLocationBase(base)) if base == "other"
    ));
    assert_eq!(backend.sources().len(), 2);
}

#[tokio::test]
async fn put_sources_reloads_all_glyphs() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());

    let mut sources = backend.get_sources().unwrap();
    assert_eq!(sources.len(), 2);
    let bold_id = backend
        .sources()
        .iter()
        .find(|source| source.name == "Bold")
        .unwrap()
        .identifier
        .clone();
    sources.get_mut(&bold_id).unwrap().italic_angle = -8.0;
    backend.put_sources(&sources).unwrap();

    assert_eq!(
        backend.next_external_change().await.unwrap(),
        Some(ReloadPattern::AllGlyphs)
    );
    let mut reopened = DesignspaceBackend::open(&path).unwrap();
    assert_eq!(reopened.get_sources().unwrap()[&bold_id].italic_angle, -8.0);
}

#[test]
fn sparse_flag_cannot_flip() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());

    let mut sources = backend.get_sources().unwrap();
    let (identifier, source) = sources.iter_mut().next().unwrap();
    let identifier = identifier.clone();
    source.is_sparse = true;
    assert!(matches!(
        backend.put_sources(&sources),
        Err(BackendError::SparseFlagChange(id)) if id == identifier
    ));
}

#[test]
fn single_ufo_has_no_axes_and_one_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Single.ufo");
    let mut backend = DesignspaceBackend::create(&path).unwrap();
    assert_eq!(backend.kind(), BackendKind::SingleUfo);
    assert_eq!(backend.sources().len(), 1);

    backend.put_axes(Axes::default()).unwrap();
    assert!(matches!(
        backend.put_axes(weight_axes()),
        Err(BackendError::SingleUfoAxes)
    ));

    let mut sources = backend.get_sources().unwrap();
    let extra = sources.values().next().unwrap().clone();
    sources.insert("extra".into(), extra);
    assert!(matches!(
        backend.put_sources(&sources),
        Err(BackendError::SingleUfoSources)
    ));

    let mut glyph = VariableGlyph::new("a");
    glyph.sources = vec![GlyphSource {
        name: "default".into(),
        layer_name: "default".into(),
        ..Default::default()
    }];
    glyph
        .layers
        .insert("default".into(), Layer::new(square(50.0, 300.0)));
    backend.put_glyph("a", &glyph, vec![0x61]).unwrap();
    assert!(path.join("glyphs").join("a.glif").is_file());
    assert!(!dir.path().join("Single.designspace").exists());
}

#[test]
fn font_info_and_units_per_em_reach_every_package() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());

    let info = FontInfo {
        family_name: Some("Test Sans".into()),
        copyright: Some("(c) Test".into()),
        ..Default::default()
    };
    backend.put_font_info(&info).unwrap();
    backend.put_units_per_em(2048.0).unwrap();
    assert_eq!(backend.get_units_per_em().unwrap(), 2048.0);

    let mut reopened = DesignspaceBackend::open(&path).unwrap();
    let read = reopened.get_font_info().unwrap();
    assert_eq!(read.family_name.as_deref(), Some("Test Sans"));
    assert_eq!(read.copyright.as_deref(), Some("(c) Test"));
    assert_eq!(reopened.get_units_per_em().unwrap(), 2048.0);

    let bold = UfoPackage::open(&dir.path().join("Test_Bold.ufo")).unwrap();
    let bold_info = bold.read_info().unwrap();
    assert_eq!(
        bold_info.get("familyName").and_then(|v| v.as_string()),
        Some("Test Sans")
    );
}

/// Glyph "S" with a local weight axis shadowing the global one, and
/// sources below, at and above its local default.
fn shadowing_glyph() -> VariableGlyph {
    let mut glyph = VariableGlyph::new("S");
    glyph.axes = vec![GlyphAxis {
        name: "weight".into(),
        min_value: 0.0,
        default_value: 500.0,
        max_value: 1000.0,
    }];
    glyph.sources = vec![
        glyph_source("Def", 500.0),
        glyph_source("Lo", 0.0),
        glyph_source("Hi", 1000.0),
    ];
    for (name, size) in [("Def", 150.0), ("Lo", 100.0), ("Hi", 200.0)] {
        glyph
            .layers
            .insert(name.into(), Layer::new(square(size, 500.0)));
    }
    glyph
}

#[test]
fn local_sources_keep_their_locations_across_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());
    backend
        .put_glyph("S", &shadowing_glyph(), vec![0x53])
        .unwrap();
    // Everything lives next to the default source
    assert_eq!(backend.sources().len(), 2);

    let first = backend.get_glyph("S").unwrap().unwrap();
    let by_name = |glyph: &VariableGlyph, name: &str| {
        glyph
            .sources
            .iter()
            .find(|source| source.name == name)
            .cloned()
            .unwrap()
    };
    assert_eq!(first.sources.len(), 3);
    assert_eq!(by_name(&first, "Def").location, location(500.0));
    assert_eq!(by_name(&first, "Lo").location, location(0.0));
    assert_eq!(by_name(&first, "Hi").location, location(1000.0));
    assert_eq!(by_name(&first, "Lo").layer_name, "Lo");
    assert_eq!(first.layers["Lo"].glyph.path, square(100.0, 500.0).path);

    backend.put_glyph("S", &first, vec![0x53]).unwrap();
    let second = backend.get_glyph("S").unwrap().unwrap();
    assert_eq!(second.sources, first.sources);
    assert_eq!(second.layers.len(), 3);

    let light = UfoPackage::open(&dir.path().join("Test_Light.ufo")).unwrap();
    let stored = light
        .glyph_set(light.default_layer_name())
        .unwrap()
        .read_glyph("S")
        .unwrap();
    let records = stored.lib["com.black-foundry.glyph-designspace"]
        .as_dictionary()
        .unwrap()["sources"]
        .as_array()
        .unwrap();
    let layer_names: BTreeSet<&str> = records
        .iter()
        .filter_map(|record| record.as_dictionary()?.get("layername")?.as_string())
        .collect();
    assert_eq!(layer_names, BTreeSet::from(["Hi", "Lo"]));
    assert!(light.glyph_set("Lo").unwrap().contains("S"));

    let mut reopened = DesignspaceBackend::open(&path).unwrap();
    assert_eq!(reopened.get_glyph("S").unwrap().unwrap().sources, first.sources);
}

#[test]
fn off_pole_source_becomes_a_layer_of_the_pole_package() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());

    let mut glyph = two_source_glyph("A");
    glyph.sources.push(glyph_source("Medium", 500.0));
    glyph
        .layers
        .insert("Medium".into(), Layer::new(square(150.0, 500.0)));
    backend.put_glyph("A", &glyph, vec![0x41]).unwrap();

    assert_eq!(backend.sources().len(), 3);
    assert!(!dir.path().join("Test_Medium.ufo").exists());
    let medium = backend
        .sources()
        .iter()
        .find(|source| source.name == "Medium")
        .unwrap();
    assert!(medium.is_sparse());
    assert_eq!(medium.location, location(500.0));
    assert_eq!(medium.layer.path, dir.path().join("Test_Light.ufo"));
    assert_eq!(medium.layer.name, "Medium");

    let read = backend.get_glyph("A").unwrap().unwrap();
    assert_eq!(read.sources.len(), 3);
    assert_eq!(read.layers["Medium"].glyph.x_advance, Some(500.0));

    let reopened = DesignspaceBackend::open(&path).unwrap();
    let medium = reopened
        .sources()
        .iter()
        .find(|source| source.name == "Medium")
        .unwrap();
    assert!(medium.is_sparse());
    assert_eq!(medium.layer.name, "Medium");
}

#[test]
fn dropped_sources_prune_their_layers() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let bold_path = dir.path().join("Test_Bold.ufo");
    let light_path = dir.path().join("Test_Light.ufo");
    for package_path in [&light_path, &bold_path] {
        let package = UfoPackage::open(package_path).unwrap();
        let mut lib = package.read_lib().unwrap();
        lib.insert(
            "public.glyphOrder".into(),
            plist::Value::Array(vec![plist::Value::String("A".into())]),
        );
        package.write_lib(&lib).unwrap();
    }

    let mut glyph = VariableGlyph::new("A");
    glyph.sources = vec![glyph_source("Light", 0.0)];
    glyph
        .layers
        .insert("Light".into(), Layer::new(square(100.0, 400.0)));
    backend.put_glyph("A", &glyph, vec![0x41]).unwrap();
    backend.put_glyph("B", &glyph, vec![0x42]).unwrap();

    assert!(!bold_path.join("glyphs").join("A_.glif").exists());
    assert!(light_path.join("glyphs").join("A_.glif").is_file());
    let read = backend.get_glyph("A").unwrap().unwrap();
    assert_eq!(read.sources.len(), 1);
    assert_eq!(read.layers.keys().collect::<Vec<_>>(), vec!["Light"]);

    let glyph_order = |package_path: &Path| -> Vec<String> {
        UfoPackage::open(package_path).unwrap().read_lib().unwrap()["public.glyphOrder"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|name| name.as_string().map(str::to_string))
            .collect()
    };
    assert!(glyph_order(&bold_path).is_empty());
    assert_eq!(glyph_order(&light_path), vec!["A", "B"]);
}

#[tokio::test]
async fn document_edits_reload_unless_they_are_our_own() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());

    backend.put_axes(weight_axes()).unwrap();
    let pattern = backend
        .process_external_changes(vec![(ChangeKind::Modified, path.clone())])
        .await
        .unwrap();
    assert_eq!(pattern, None);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(r#"maximum="1000""#));
    std::fs::write(&path, text.replace(r#"maximum="1000""#, r#"maximum="2000""#)).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    let pattern = backend
        .process_external_changes(vec![(ChangeKind::Modified, path.clone())])
        .await
        .unwrap();
    assert_eq!(pattern, Some(ReloadPattern::Everything));
    assert_eq!(
        backend.axes().axes,
        vec![FontAxis::continuous("weight", "wght", 0.0, 0.0, 2000.0)]
    );
    assert_eq!(backend.sources().len(), 2);

    // The reload took the new time as our own
    let pattern = backend
        .process_external_changes(vec![(ChangeKind::Modified, path)])
        .await
        .unwrap();
    assert_eq!(pattern, None);
}

#[cfg(unix)]
#[tokio::test]
async fn events_through_a_symlinked_directory_are_recognized() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut backend) = two_source_project(dir.path());
    let elsewhere = tempfile::tempdir().unwrap();
    let linked = elsewhere.path().join("project");
    std::os::unix::fs::symlink(dir.path(), &linked).unwrap();

    std::fs::remove_file(default_glif_path(&backend, "A_.glif")).unwrap();
    let pattern = backend
        .process_external_changes(vec![(
            ChangeKind::Deleted,
            linked.join("Test_Light.ufo").join("glyphs").join("A_.glif"),
        )])
        .await
        .unwrap();
    assert_eq!(
        pattern,
        Some(ReloadPattern::Partial {
            glyphs: BTreeSet::from(["A".to_string()]),
            glyph_map: BTreeMap::from([("A".to_string(), None)]),
        })
    );

    let document = dir.path().join("Test.designspace");
    File::options()
        .write(true)
        .open(&document)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    let pattern = backend
        .process_external_changes(vec![(
            ChangeKind::Modified,
            linked.join("Test.designspace"),
        )])
        .await
        .unwrap();
    assert_eq!(pattern, Some(ReloadPattern::Everything));
}

#[test]
fn layer_names_holding_the_glyph_get_a_counter() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut backend) = two_source_project(dir.path());
    let mut glyph = two_source_glyph("A");
    glyph
        .layers
        .insert("sketch".into(), Layer::new(square(50.0, 400.0)));

    backend.put_glyph("A", &glyph, vec![0x41]).unwrap();
    backend.put_glyph("A", &glyph, vec![0x41]).unwrap();
    let light_path = dir.path().join("Test_Light.ufo");
    let light = UfoPackage::open(&light_path).unwrap();
    assert!(light.glyph_set("sketch").unwrap().contains("A"));
    assert!(!light.has_layer("sketch#1"));
    drop(backend);

    // After a reopen the layer goes by its owner-qualified name, so a
    // plain "sketch" is a new layer that must not clash with the old one.
    let mut reopened = DesignspaceBackend::open(&path).unwrap();
    reopened.put_glyph("A", &glyph, vec![0x41]).unwrap();
    let light = UfoPackage::open(&light_path).unwrap();
    assert!(light.glyph_set("sketch#1").unwrap().contains("A"));
    assert!(!light.glyph_set("sketch").unwrap().contains("A"));

    let read = reopened.get_glyph("A").unwrap().unwrap();
    assert_eq!(read.layers["sketch"].glyph.path, square(50.0, 400.0).path);
}
