// Template substitution for action configs

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

use super::context::EventContext;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder pattern is valid"));

/// Replace every `{{dot.path}}` placeholder in the string leaves of `value`.
///
/// Object keys, numbers and booleans are left alone. A placeholder that does
/// not resolve, or resolves to null, becomes the empty string.
pub fn render(value: &Value, context: &EventContext) -> Value {
    match value {
        Value::String(text) => Value::String(render_str(text, context)),
        Value::Array(items) => Value::Array(items.iter().map(|item| render(item, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), render(item, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Single pass: text inserted from the context is not scanned again.
pub fn render_str(text: &str, context: &EventContext) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            context
                .resolve(&caps[1])
                .map(stringify)
                .unwrap_or_default()
        })
        .into_owned()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
