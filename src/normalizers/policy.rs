//! Reading IAM-style policy documents
//!
//! Only the parsing lives here. Whether a wildcard principal makes a resource
//! internet exposed is decided by each normalizer.

use serde_json::Value;

/// Parse a policy that may arrive as an embedded JSON string
pub fn parse_document(doc: &Value) -> Option<Value> {
    match doc {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Object(_) => Some(doc.clone()),
        _ => None,
    }
}

fn statements(doc: &Value) -> Vec<Value> {
    match doc.get("Statement") {
        Some(Value::Array(items)) => items.clone(),
        Some(stmt @ Value::Object(_)) => vec![stmt.clone()],
        _ => Vec::new(),
    }
}

fn principal_values(principal: &Value) -> Vec<String> {
    match principal {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(principal_values).collect(),
        Value::Object(map) => map.values().flat_map(principal_values).collect(),
        _ => Vec::new(),
    }
}

/// Every principal named by an `Allow` statement
pub fn allowed_principals(doc: &Value) -> Vec<String> {
    let Some(doc) = parse_document(doc) else {
        return Vec::new();
    };
    let mut principals: Vec<String> = statements(&doc)
        .iter()
        .filter(|s| s.get("Effect").and_then(Value::as_str) == Some("Allow"))
        .filter_map(|s| s.get("Principal"))
        .flat_map(principal_values)
        .collect();
    principals.sort();
    principals.dedup();
    principals
}

/// True when an unconditional `Allow` statement names the `*` principal
pub fn grants_anonymous_access(doc: &Value) -> bool {
    let Some(doc) = parse_document(doc) else {
        return false;
    };
    statements(&doc).iter().any(|s| {
        s.get("Effect").and_then(Value::as_str) == Some("Allow")
            && s.get("Condition").is_none()
            && s
                .get("Principal")
                .map(|p| principal_values(p).iter().any(|v| v == "*"))
                .unwrap_or(false)
    })
}
