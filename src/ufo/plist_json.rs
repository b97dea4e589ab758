//! Conversion between plist values and JSON custom data
//!
//! Lib entries carry arbitrary client data. Clients see it as JSON, the
//! packages store it as plist. Dates become RFC 3339 strings and binary data
//! becomes an array of byte values; JSON `null` has no plist counterpart and
//! is dropped.

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value as Json};

use crate::model::CustomData;

pub fn plist_to_json(value: &plist::Value) -> Json {
    match value {
        plist::Value::Array(items) => Json::Array(items.iter().map(plist_to_json).collect()),
        plist::Value::Dictionary(dict) => Json::Object(dict_to_json(dict)),
        plist::Value::Boolean(b) => Json::Bool(*b),
        plist::Value::Data(bytes) => {
            Json::Array(bytes.iter().map(|b| Json::Number((*b).into())).collect())
        }
        plist::Value::Date(date) => {
            let time: std::time::SystemTime = (*date).into();
            Json::String(DateTime::<Utc>::from(time).to_rfc3339())
        }
        plist::Value::Real(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        plist::Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
            (Some(signed), _) => Json::Number(signed.into()),
            (None, Some(unsigned)) => Json::Number(unsigned.into()),
            (None, None) => Json::Null,
        },
        plist::Value::String(s) => Json::String(s.clone()),
        _ => Json::Null,
    }
}

pub fn dict_to_json(dict: &plist::Dictionary) -> CustomData {
    dict.iter()
        .map(|(key, value)| (key.clone(), plist_to_json(value)))
        .filter(|(_, value)| !value.is_null())
        .collect()
}

pub fn json_to_plist(value: &Json) -> Option<plist::Value> {
    Some(match value {
        Json::Null => return None,
        Json::Bool(b) => plist::Value::Boolean(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                plist::Value::Integer(i.into())
            } else if let Some(u) = n.as_u64() {
                plist::Value::Integer(u.into())
            } else {
                plist::Value::Real(n.as_f64().unwrap_or_default())
            }
        }
        Json::String(s) => plist::Value::String(s.clone()),
        Json::Array(items) => {
            plist::Value::Array(items.iter().filter_map(json_to_plist).collect())
        }
        Json::Object(map) => plist::Value::Dictionary(json_to_dict(map)),
    })
}

pub fn json_to_dict(map: &Map<String, Json>) -> plist::Dictionary {
    let mut dict = plist::Dictionary::new();
    for (key, value) in map {
        if let Some(value) = json_to_plist(value) {
            dict.insert(key.clone(), value);
        }
    }
    dict
}

/// Plist number as `f64`, accepting both integers and reals.
pub fn as_number(value: &plist::Value) -> Option<f64> {
    match value {
        plist::Value::Real(f) => Some(*f),
        plist::Value::Integer(i) => i.as_signed().map(|i| i as f64),
        _ => None,
    }
}

/// Store a whole number as a plist integer, anything else as a real.
pub fn number_value(value: f64) -> plist::Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        plist::Value::Integer((value as i64).into())
    } else {
        plist::Value::Real(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_custom_data_survives_the_trip() {
        let data = json!({
            "status": 2,
            "weight": 0.5,
            "flags": [true, false],
            "nested": {"name": "x"},
        });
        let plist = json_to_plist(&data).unwrap();
        assert_eq!(plist_to_json(&plist), data);
    }

    #[test]
    fn null_entries_are_dropped() {
        let data = json!({"keep": 1, "drop": null});
        let dict = json_to_dict(data.as_object().unwrap());
        assert!(dict.contains_key("keep"));
        assert!(!dict.contains_key("drop"));
    }

    #[test]
    fn whole_numbers_are_stored_as_integers() {
        assert!(matches!(number_value(500.0), plist::Value::Integer(_)));
        assert!(matches!(number_value(12.5), plist::Value::Real(_)));
        assert_eq!(as_number(&number_value(-250.0)), Some(-250.0));
    }
}
