//! DSDF stream-header property parsing.
//!
//! A das2 server answers `?server=dsdf&dataset=...` with a small stream
//! header whose `<properties ... />` element carries everything known about
//! the dataset as `key="value"` attributes. Keys ending in a two-digit index
//! (`param_00`, `coord01`) are families; they collapse into one map keyed by
//! the base name, with the index as subkey. Unindexed keys land at subkey
//! `"00"`.

use crate::error::CatalogError;
use std::collections::BTreeMap;

/// Parsed properties: base key -> (two-digit subkey -> value).
pub type PropMap = BTreeMap<String, BTreeMap<String, String>>;

/// Extract and parse the `<properties ... />` element of a DSDF response.
pub fn parse_props(url: &str, text: &str) -> Result<PropMap, CatalogError> {
    let start = text.find("<properties").ok_or_else(|| {
        CatalogError::Server(format!("no stream properties element in reply from '{}'", url))
    })? + "<properties".len();
    let end = text.rfind(" />").ok_or_else(|| {
        CatalogError::Server(format!(
            "unterminated stream properties element in reply from '{}'",
            url
        ))
    })?;
    if end < start {
        return Err(CatalogError::Server(format!(
            "malformed stream properties element in reply from '{}'",
            url
        )));
    }

    let mut props = PropMap::new();
    for (key, value) in scan_pairs(&text[start..end]) {
        let (base, sub) = split_numbered(&key);
        props.entry(base).or_default().insert(sub, value);
    }
    Ok(props)
}

/// Is the property's unindexed value one of the usual true spellings?
pub fn prop_is_true(props: &PropMap, key: &str) -> bool {
    match first_value(props, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => false,
    }
}

/// The `"00"` entry for a property, if present.
pub fn first_value<'a>(props: &'a PropMap, key: &str) -> Option<&'a str> {
    props.get(key)?.get("00").map(String::as_str)
}

/// Split a raw attribute name into family base and two-digit subkey.
///
/// An underscore followed by exactly two digits indexes a family
/// (`param_03` -> `("param", "03")`), as does a bare two-digit suffix
/// (`coord01` -> `("coord", "01")`). Anything else is a plain key at
/// subkey `"00"`.
fn split_numbered(key: &str) -> (String, String) {
    if let Some(n) = key.find('_') {
        let sub = &key[n + 1..];
        if sub.len() == 2 && sub.bytes().all(|b| b.is_ascii_digit()) {
            return (key[..n].to_string(), sub.to_string());
        }
        return (key.to_string(), "00".to_string());
    }
    if key.len() > 2 {
        let tail = &key[key.len() - 2..];
        if tail.bytes().all(|b| b.is_ascii_digit()) {
            return (key[..key.len() - 2].to_string(), tail.to_string());
        }
    }
    (key.to_string(), "00".to_string())
}

/// Scan `key="value"` pairs out of attribute text.
///
/// Keys start with a letter and continue with word characters; values run
/// to the next double quote with no escape convention, matching how the
/// headers are produced. Anything that does not fit the pattern is skipped
/// one byte at a time.
fn scan_pairs(text: &str) -> Vec<(String, String)> {
    let bytes = text.as_bytes();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let key_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        let key_end = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'"' {
            continue;
        }
        i += 1;
        let val_start = i;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let value = unescape_entities(text[val_start..i].trim());
        pairs.push((text[key_start..key_end].to_string(), value));
        i += 1;
    }
    pairs
}

fn unescape_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let mut replaced = false;
        for (entity, ch) in [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ] {
            if let Some(after) = rest.strip_prefix(entity) {
                out.push(ch);
                rest = after;
                replaced = true;
                break;
            }
        }
        if !replaced {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}
