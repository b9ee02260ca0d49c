use crate::navigate::lookup;
use crate::path::parse_key;
use crate::tree::{display_or_undefined, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(.*?)\}").unwrap());

/// Resolve thunks and `${path}` placeholders throughout a value tree.
///
/// The input is consumed and a resolved tree returned; subtrees without
/// thunks or placeholders are moved through untouched. Thunks are forced
/// (repeatedly, if they return thunks) and their results resolved in turn.
/// Placeholders are looked up in `scope`, which is only read.
pub fn resolve(value: Value, scope: &Value) -> Value {
    match value.force() {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, child)| (key, resolve(child, scope)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|child| resolve(child, scope))
                .collect(),
        ),
        Value::String(text) => {
            let replaced = match substitute(&text, scope) {
                Cow::Borrowed(_) => None,
                Cow::Owned(replaced) => Some(replaced),
            };
            Value::String(replaced.unwrap_or(text))
        }
        other => other,
    }
}

/// Replace every `${path}` in `text` with the display form of the value
/// found at `path` in `scope`.
///
/// Each placeholder is resolved against the original text, so substituted
/// text is never re-expanded. A path that misses renders as `undefined`.
pub fn substitute<'t>(text: &'t str, scope: &Value) -> Cow<'t, str> {
    PLACEHOLDER_RE.replace_all(text, |caps: &Captures| placeholder_text(&caps[1], scope))
}

fn placeholder_text(expr: &str, scope: &Value) -> String {
    // `${user.getName()}` reads the same slot as `${user.getName}`.
    let cleaned = expr.replace("()", "");
    let found = parse_key(cleaned.trim()).and_then(|path| lookup(scope, &path));
    if found.is_none() {
        tracing::debug!(placeholder = expr, "placeholder did not resolve");
    }
    display_or_undefined(found.as_ref())
}
