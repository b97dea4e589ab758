//! Conversion between norad glyphs and static glyph data
//!
//! Plain components go into the `.glif` outline as affine components.
//! Components that carry a location or a transform centre cannot be
//! expressed there and are stored in the glyph lib instead.

use std::path::PathBuf;

use kurbo::Affine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::plist_json::{as_number, dict_to_json, json_to_plist, number_value};
use crate::core::errors::{BackendError, BackendResult};
use crate::model::{
    Anchor, BackgroundImage, Component, ContourData, DecomposedTransform, Guideline,
    OutlineData, PointData, PointTypeData, RgbaColor, StaticGlyph,
};
use crate::space::Location;

pub const VARIABLE_COMPONENTS_LIB_KEY: &str = "com.black-foundry.variable-components";
pub const VERTICAL_ORIGIN_LIB_KEY: &str = "public.verticalOrigin";
pub const GUIDELINE_LOCK_LIB_PREFIX: &str = "com.typemytype.robofont.guideline.locked.";

fn parse_name(name: &str) -> BackendResult<norad::Name> {
    name.parse()
        .map_err(|_| BackendError::InvalidName(name.to_string()))
}

/// Build the static glyph data of one layer from its `.glif` contents.
pub fn static_glyph_from_norad(glyph: &norad::Glyph) -> StaticGlyph {
    let mut components: Vec<Component> = glyph
        .components
        .iter()
        .map(|component| {
            let t = component.transform;
            let affine = Affine::new([
                t.x_scale, t.xy_scale, t.yx_scale, t.y_scale, t.x_offset, t.y_offset,
            ]);
            Component {
                name: component.base.to_string(),
                transformation: DecomposedTransform::from_affine(affine),
                location: Location::new(),
            }
        })
        .collect();
    components.extend(unpack_variable_components(&glyph.lib));

    StaticGlyph {
        path: outline_from_norad(&glyph.contours),
        components,
        x_advance: Some(glyph.width),
        // An unset UFO height reads as 0
        y_advance: (glyph.height != 0.0).then_some(glyph.height),
        vertical_origin: glyph.lib.get(VERTICAL_ORIGIN_LIB_KEY).and_then(as_number),
        anchors: glyph
            .anchors
            .iter()
            .map(|anchor| Anchor {
                name: anchor.name.as_ref().map(|n| n.to_string()),
                x: anchor.x,
                y: anchor.y,
            })
            .collect(),
        guidelines: glyph
            .guidelines
            .iter()
            .map(|guideline| unpack_guideline(guideline, &glyph.lib))
            .collect(),
        background_image: glyph.image.as_ref().map(unpack_background_image),
    }
}

/// Write `static_glyph` into `glyph`, keeping whatever else `glyph` holds.
pub fn populate_norad_glyph(
    glyph: &mut norad::Glyph,
    static_glyph: &StaticGlyph,
    force_variable_components: bool,
    image_file_name: Option<&str>,
) -> BackendResult<()> {
    glyph.width = static_glyph.x_advance.unwrap_or(0.0);
    if let Some(height) = static_glyph.y_advance {
        glyph.height = height;
    }
    if let Some(origin) = static_glyph.vertical_origin {
        glyph
            .lib
            .insert(VERTICAL_ORIGIN_LIB_KEY.into(), number_value(origin));
    }

    glyph.contours = outline_to_norad(&static_glyph.path)?;

    glyph.anchors = static_glyph
        .anchors
        .iter()
        .map(|anchor| {
            let name = anchor.name.as_deref().map(parse_name).transpose()?;
            Ok(norad::Anchor::new(anchor.x, anchor.y, name, None, None))
        })
        .collect::<BackendResult<_>>()?;

    glyph.guidelines = pack_guidelines(&static_glyph.guidelines, &mut glyph.lib)?;

    glyph.image = match (&static_glyph.background_image, image_file_name) {
        (Some(image), Some(file_name)) => Some(pack_background_image(image, file_name)),
        _ => None,
    };

    let mut plain = Vec::new();
    let mut variable = Vec::new();
    for component in &static_glyph.components {
        if !component.location.is_empty() || force_variable_components {
            variable.push(pack_variable_component(component));
        } else {
            let a = component.transformation.to_affine().as_coeffs();
            let transform = norad::AffineTransform {
                x_scale: a[0],
                xy_scale: a[1],
                yx_scale: a[2],
                y_scale: a[3],
                x_offset: a[4],
                y_offset: a[5],
            };
            plain.push(norad::Component::new(parse_name(&component.name)?, transform, None));
        }
    }
    glyph.components = plain;
    store_in_lib(
        &mut glyph.lib,
        VARIABLE_COMPONENTS_LIB_KEY,
        plist::Value::Array(variable),
    );
    Ok(())
}

/// Store `value` under `key`, or remove the key when `value` is empty.
pub fn store_in_lib(lib: &mut plist::Dictionary, key: &str, value: plist::Value) {
    let empty = match &value {
        plist::Value::Array(items) => items.is_empty(),
        plist::Value::Dictionary(dict) => dict.is_empty(),
        plist::Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        lib.remove(key);
    } else {
        lib.insert(key.to_string(), value);
    }
}

fn outline_from_norad(contours: &[norad::Contour]) -> OutlineData {
    OutlineData {
        contours: contours
            .iter()
            .map(|contour| ContourData {
                points: contour
                    .points
                    .iter()
                    .map(|point| PointData {
                        x: point.x,
                        y: point.y,
                        point_type: match point.typ {
                            norad::PointType::Move => PointTypeData::Move,
                            norad::PointType::Line => PointTypeData::Line,
                            norad::PointType::OffCurve => PointTypeData::OffCurve,
                            norad::PointType::Curve => PointTypeData::Curve,
                            norad::PointType::QCurve => PointTypeData::QCurve,
                        },
                        smooth: point.smooth,
                        name: point.name.as_ref().map(|n| n.to_string()),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn outline_to_norad(outline: &OutlineData) -> BackendResult<Vec<norad::Contour>> {
    outline
        .contours
        .iter()
        .map(|contour| {
            let points = contour
                .points
                .iter()
                .map(|point| {
                    let typ = match point.point_type {
                        PointTypeData::Move => norad::PointType::Move,
                        PointTypeData::Line => norad::PointType::Line,
                        PointTypeData::OffCurve => norad::PointType::OffCurve,
                        PointTypeData::Curve => norad::PointType::Curve,
                        PointTypeData::QCurve => norad::PointType::QCurve,
                    };
                    let name = point.name.as_deref().map(parse_name).transpose()?;
                    Ok(norad::ContourPoint::new(
                        point.x,
                        point.y,
                        typ,
                        point.smooth,
                        name,
                        None,
                    ))
                })
                .collect::<BackendResult<Vec<_>>>()?;
            Ok(norad::Contour::new(points, None))
        })
        .collect()
}

fn unpack_variable_components(lib: &plist::Dictionary) -> Vec<Component> {
    let Some(entries) = lib.get(VARIABLE_COMPONENTS_LIB_KEY).and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let dict = entry.as_dictionary()?;
            let name = dict.get("base")?.as_string()?.to_string();
            let transformation = dict
                .get("transformation")
                .and_then(|t| t.as_dictionary())
                .map(dict_to_json)
                .and_then(|json| {
                    serde_json::from_value(serde_json::Value::Object(json)).ok()
                })
                .unwrap_or_default();
            let location = dict
                .get("location")
                .and_then(|l| l.as_dictionary())
                .map(|l| {
                    l.iter()
                        .filter_map(|(axis, value)| Some((axis.clone(), as_number(value)?)))
                        .collect()
                })
                .unwrap_or_default();
            Some(Component {
                name,
                transformation,
                location,
            })
        })
        .collect()
}

fn pack_variable_component(component: &Component) -> plist::Value {
    let mut dict = plist::Dictionary::new();
    dict.insert("base".into(), plist::Value::String(component.name.clone()));
    let location: plist::Dictionary = component
        .location
        .iter()
        .map(|(axis, value)| (axis.clone(), number_value(*value)))
        .collect();
    dict.insert("location".into(), plist::Value::Dictionary(location));
    if !component.transformation.is_identity() {
        let packed = serde_json::to_value(component.transformation)
            .ok()
            .and_then(|json| json_to_plist(&json));
        if let Some(packed) = packed {
            dict.insert("transformation".into(), packed);
        }
    }
    plist::Value::Dictionary(dict)
}

fn unpack_guideline(guideline: &norad::Guideline, lib: &plist::Dictionary) -> Guideline {
    let (x, y, angle) = match guideline.line {
        norad::Line::Vertical(x) => (x, 0.0, 90.0),
        norad::Line::Horizontal(y) => (0.0, y, 0.0),
        norad::Line::Angle { x, y, degrees } => (x, y, degrees),
    };
    let locked = guideline
        .identifier()
        .and_then(|id| lib.get(&format!("{GUIDELINE_LOCK_LIB_PREFIX}{}", id.as_str())))
        .and_then(|v| v.as_boolean())
        .unwrap_or(false);
    Guideline {
        name: guideline.name.as_ref().map(|n| n.to_string()),
        x,
        y,
        angle,
        locked,
    }
}

/// Guidelines for a `.glif`. Locked ones get an identifier and a lock
/// entry in `lib`; stale lock entries are removed.
fn pack_guidelines(
    guidelines: &[Guideline],
    lib: &mut plist::Dictionary,
) -> BackendResult<Vec<norad::Guideline>> {
    let stale: Vec<String> = lib
        .keys()
        .filter(|key| key.starts_with(GUIDELINE_LOCK_LIB_PREFIX))
        .cloned()
        .collect();
    for key in stale {
        lib.remove(&key);
    }

    guidelines
        .iter()
        .enumerate()
        .map(|(index, guideline)| {
            let name = guideline.name.as_deref().map(parse_name).transpose()?;
            let identifier = if guideline.locked {
                let id = format!("fontra-guideline-{index}");
                lib.insert(
                    format!("{GUIDELINE_LOCK_LIB_PREFIX}{id}"),
                    plist::Value::Boolean(true),
                );
                norad::Identifier::new(&id).ok()
            } else {
                None
            };
            let line = norad::Line::Angle {
                x: guideline.x,
                y: guideline.y,
                degrees: guideline.angle,
            };
            Ok(norad::Guideline::new(line, name, None, identifier))
        })
        .collect()
}

fn unpack_background_image(image: &norad::Image) -> BackgroundImage {
    let t = image.transform;
    let affine = Affine::new([
        t.x_scale, t.xy_scale, t.yx_scale, t.y_scale, t.x_offset, t.y_offset,
    ]);

    let mut opacity = 1.0;
    let mut color = None;
    if let Some(c) = &image.color {
        let (red, green, blue, alpha) = c.channels();
        opacity = alpha;
        if (red, green, blue) != (0.0, 0.0, 0.0) {
            color = Some(RgbaColor {
                red,
                green,
                blue,
                alpha: 1.0,
            });
        }
    }

    BackgroundImage {
        identifier: image.file_name().to_string_lossy().into_owned(),
        transformation: DecomposedTransform::from_affine(affine),
        opacity,
        color,
    }
}

fn pack_background_image(image: &BackgroundImage, file_name: &str) -> norad::Image {
    let a = image.transformation.to_affine().as_coeffs();
    let color = match image.color {
        Some(c) => norad::Color::new(c.red, c.green, c.blue, image.opacity).ok(),
        None if image.opacity != 1.0 => norad::Color::new(0.0, 0.0, 0.0, image.opacity).ok(),
        None => None,
    };
    norad::Image {
        file_name: PathBuf::from(file_name),
        color,
        transform: norad::AffineTransform {
            x_scale: a[0],
            xy_scale: a[1],
            yx_scale: a[2],
            y_scale: a[3],
            x_offset: a[4],
            y_offset: a[5],
        },
    }
}

/// Glyph name and code points of a `.glif` document, read without parsing
/// the outline.
pub fn extract_name_and_codepoints(glif: &str) -> Result<(String, Vec<u32>), String> {
    let mut reader = Reader::from_str(glif);
    let mut name = None;
    let mut codepoints = Vec::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(element) | Event::Empty(element) => match element.name().as_ref() {
                b"glyph" => name = attribute(&element, b"name")?,
                b"unicode" => {
                    if let Some(hex) = attribute(&element, b"hex")? {
                        let value = u32::from_str_radix(hex.trim(), 16)
                            .map_err(|_| format!("invalid unicode hex value '{hex}'"))?;
                        codepoints.push(value);
                    }
                }
                b"outline" | b"lib" => break,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    let name = name.ok_or("glif has no glyph name")?;
    Ok((name, codepoints))
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StaticGlyph {
        StaticGlyph {
            path: OutlineData {
                contours: vec![ContourData {
                    points: vec![
                        PointData {
                            x: 0.0,
                            y: 0.0,
                            point_type: PointTypeData::Line,
                            smooth: false,
                            name: None,
                        },
                        PointData {
                            x: 100.0,
                            y: 0.0,
                            point_type: PointTypeData::Line,
                            smooth: false,
                            name: None,
                        },
                        PointData {
                            x: 100.0,
                            y: 100.0,
                            point_type: PointTypeData::Line,
                            smooth: false,
                            name: None,
                        },
                    ],
                }],
            },
            components: vec![Component {
                name: "acute".into(),
                transformation: DecomposedTransform {
                    translate_x: 20.0,
                    ..Default::default()
                },
                location: Location::new(),
            }],
            x_advance: Some(600.0),
            y_advance: None,
            vertical_origin: Some(880.0),
            anchors: vec![Anchor {
                name: Some("top".into()),
                x: 50.0,
                y: 700.0,
            }],
            guidelines: vec![Guideline {
                name: Some("stem".into()),
                x: 80.0,
                y: 0.0,
                angle: 90.0,
                locked: true,
            }],
            background_image: None,
        }
    }

    #[test]
    fn static_glyph_survives_norad() {
        let mut glyph = norad::Glyph::new("a");
        populate_norad_glyph(&mut glyph, &sample(), false, None).unwrap();
        let lock_key = format!("{GUIDELINE_LOCK_LIB_PREFIX}fontra-guideline-0");
        assert!(glyph.lib.contains_key(&lock_key));
        assert!(!glyph.lib.contains_key(VARIABLE_COMPONENTS_LIB_KEY));

        let back = static_glyph_from_norad(&glyph);
        assert_eq!(back.path, sample().path);
        assert_eq!(back.x_advance, Some(600.0));
        assert_eq!(back.vertical_origin, Some(880.0));
        assert_eq!(back.anchors, sample().anchors);
        assert_eq!(back.guidelines, sample().guidelines);
        assert_eq!(back.components.len(), 1);
        assert_eq!(back.components[0].transformation.translate_x, 20.0);
    }

    #[test]
    fn located_components_go_to_the_lib() {
        let mut static_glyph = sample();
        static_glyph.components[0]
            .location
            .insert("weight".into(), 500.0);
        let mut glyph = norad::Glyph::new("a");
        populate_norad_glyph(&mut glyph, &static_glyph, false, None).unwrap();
        assert!(glyph.components.is_empty());

        let back = static_glyph_from_norad(&glyph);
        assert_eq!(back.components, static_glyph.components);
    }

    #[test]
    fn image_color_and_opacity_are_separated() {
        let image = BackgroundImage {
            identifier: "ignored".into(),
            transformation: DecomposedTransform::default(),
            opacity: 0.5,
            color: None,
        };
        let packed = pack_background_image(&image, "img.png");
        let unpacked = unpack_background_image(&packed);
        assert_eq!(unpacked.identifier, "img.png");
        assert_eq!(unpacked.opacity, 0.5);
        assert_eq!(unpacked.color, None);
    }

    #[test]
    fn header_scan_reads_name_and_codepoints() {
        let glif = r#"<?xml version="1.0" encoding="UTF-8"?>
<glyph name="A&amp;B" format="2">
  <advance width="500"/>
  <unicode hex="0041"/>
  <unicode hex="00C0"/>
  <outline/>
</glyph>"#;
        let (name, codepoints) = extract_name_and_codepoints(glif).unwrap();
        assert_eq!(name, "A&B");
        assert_eq!(codepoints, vec![0x41, 0xC0]);
        assert!(extract_name_and_codepoints("<glyph/>").is_err());
    }
}
