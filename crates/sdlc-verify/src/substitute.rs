use std::collections::HashMap;

/// Per-scenario variable bag: names captured from earlier responses,
/// substituted into later requests via `${name}` (spec.md §4.4, GLOSSARY).
pub type VariableBag = HashMap<String, String>;

/// Replaces every `${name}` occurrence in `input` with its bound value.
/// A name with no binding is left untouched rather than erased, which is
/// what keeps this idempotent (spec.md §8 property 7): re-running
/// substitution against the same bag never changes a string that has
/// already been substituted, because every resolvable token was already
/// resolved and nothing we substitute in re-introduces a `${...}` token
/// that the same bag would resolve differently.
pub fn substitute(input: &str, bag: &VariableBag) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + end];
        match bag.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + end + 1]),
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}

/// Substitutes every string value of a JSON body in place (spec.md §4.4:
/// substitution applies to `endpoint`, `body`, and `headers`).
pub fn substitute_json(value: &serde_json::Value, bag: &VariableBag) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(substitute(s, bag)),
        serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(|v| substitute_json(v, bag)).collect()),
        serde_json::Value::Object(map) => {
            serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), substitute_json(v, bag))).collect())
        }
        other => other.clone(),
    }
}

/// Resolves a dotted path like `response.user.token` into a captured
/// response body. The leading `response` segment is conventional and
/// stripped before navigating (spec.md §4.4). Returns `None` on a missing
/// path, which the caller binds to the empty string and logs a warning
/// for, rather than failing the step (spec.md §4.4, §7).
pub fn resolve_dotted_path(response_body: &serde_json::Value, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    match segments.next() {
        Some("response") => {}
        _ => return None,
    }
    let mut current = response_body;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(match current {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
