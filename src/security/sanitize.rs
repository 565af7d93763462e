//! Shallow input sanitization.
//!
//! Trims surrounding whitespace and strips `<` / `>` from string values in
//! route parameters, query parameters and top-level JSON body fields. Nested
//! body structures are left untouched.

use std::collections::HashMap;

use serde_json::Value;

/// Sanitize a single string value.
pub fn clean(value: &str) -> String {
    value.trim().chars().filter(|c| *c != '<' && *c != '>').collect()
}

/// Sanitize every value of a parameter map in place.
pub fn clean_params(params: &mut HashMap<String, String>) {
    for value in params.values_mut() {
        *value = clean(value);
    }
}

/// Rebuild a raw query string with every value sanitized.
///
/// Returns `None` when nothing changed so the original URI can be kept.
pub fn clean_query(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let cleaned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.clone(), clean(v)))
        .collect();

    if cleaned == pairs {
        return None;
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &cleaned {
        serializer.append_pair(key, value);
    }
    Some(serializer.finish())
}

/// Sanitize top-level string fields of a JSON object body.
///
/// Returns true when any field changed.
pub fn clean_body(body: &mut Value) -> bool {
    let Value::Object(fields) = body else {
        return false;
    };

    let mut changed = false;
    for value in fields.values_mut() {
        if let Value::String(text) = value {
            let cleaned = clean(text);
            if cleaned != *text {
                *text = cleaned;
                changed = true;
            }
        }
    }
    changed
}
