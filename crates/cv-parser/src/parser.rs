//! Field extraction over a decoded JSON object.

use cv_core::{Error, Result};
use serde_json::{Map, Value};

use crate::types::ParsedMetadata;

type Object = Map<String, Value>;

pub(crate) fn parse(bytes: &[u8]) -> Result<ParsedMetadata> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| Error::MalformedMetadata(e.to_string()))?;

    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(Error::MalformedMetadata(format!(
                "expected a JSON object, found {}",
                kind_of(&other)
            )))
        }
    };

    let id = first_identifier(&obj, &["id", "display_id"]).ok_or(Error::MissingIdentifier)?;

    Ok(ParsedMetadata {
        id,
        title: first_non_empty_str(&obj, &["fulltitle", "title"]),
        description: get_str(&obj, "description"),
        uploader: get_str(&obj, "uploader"),
        uploader_url: get_str(&obj, "uploader_url"),
        webpage_url: get_str(&obj, "webpage_url"),
        thumbnail: get_str(&obj, "thumbnail"),
        duration: get_f64(&obj, "duration"),
        width: get_i64(&obj, "width"),
        height: get_i64(&obj, "height"),
        aspect_ratio: get_f64(&obj, "aspect_ratio"),
        like_count: get_i64(&obj, "like_count"),
        repost_count: get_i64(&obj, "repost_count"),
        comment_count: get_i64(&obj, "comment_count"),
        extractor: get_str(&obj, "extractor"),
        post_timestamp: get_i64(&obj, "timestamp"),
        epoch: get_i64(&obj, "epoch"),
        tags: get_tags(&obj, "tags"),
    })
}

/// Identifier lookup: strings must be non-blank, integral numbers are
/// rendered in decimal.
fn first_identifier(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    })
}

fn first_non_empty_str(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| get_str(obj, key).filter(|s| !s.is_empty()))
}

fn get_str(obj: &Object, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(String::from)
}

fn get_f64(obj: &Object, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Integers, plus floats without a fractional part (`1920.0`).
fn get_i64(obj: &Object, key: &str) -> Option<i64> {
    let value = obj.get(key)?;
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn get_tags(obj: &Object, key: &str) -> Vec<String> {
    let Some(Value::Array(items)) = obj.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
