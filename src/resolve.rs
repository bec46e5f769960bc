//! Name resolution: translating a query-facing (possibly dotted) field name
//! into the expression the backend understands. All backend-specific path
//! extraction and cast syntax lives here.

use crate::fields::{FieldMap, FieldType};

/// Resolve a dotted query name against the field registry.
///
/// Walking segments left to right: a JSON-container field turns the
/// remaining segments into nested `jsonb_extract_path(jsonb_strip_nulls(..))`
/// calls with a trailing cast for the leaf's declared type; an opaque
/// composite field turns them into `(parent).segment` access. Names that do
/// not hit a nested container resolve to their physical name (single
/// segment) or pass through verbatim, which also makes resolution
/// idempotent: output never matches the registry again.
pub fn resolve(fields: &FieldMap, query_name: &str) -> String {
    if !query_name.contains('.') {
        return match fields.get(query_name) {
            Some(desc) => desc.db_name.clone(),
            None => query_name.to_string(),
        };
    }

    let segments: Vec<&str> = query_name.split('.').collect();
    let Some(head) = fields.get(segments[0]) else {
        return query_name.to_string();
    };
    let head_is_container = matches!(head.kind, FieldType::Object | FieldType::Custom)
        || (head.kind == FieldType::Json && head.nested);
    if !head_is_container {
        return query_name.to_string();
    }

    let mut expr = head.db_name.clone();
    let mut kind = head.kind;
    let mut prefix = segments[0].to_string();
    let mut extracted = false;
    for seg in &segments[1..] {
        match kind {
            FieldType::Json => {
                expr = format!("jsonb_extract_path(jsonb_strip_nulls({expr}), '{seg}')");
                extracted = true;
            }
            FieldType::Object | FieldType::Custom => {
                expr = format!("({expr}).{seg}");
            }
            // A scalar in the middle of a dotted name: nothing to descend
            // into, leave the name alone.
            _ => return query_name.to_string(),
        }
        prefix = format!("{prefix}.{seg}");
        kind = fields.kind(&prefix).unwrap_or(kind);
    }

    if extracted {
        format!("{expr}{}", cast_suffix(fields.kind(query_name)))
    } else {
        expr
    }
}

// Outer cast applied to an extracted JSON leaf so comparisons see the
// declared type. Container leaves stay uncast.
fn cast_suffix(leaf: Option<FieldType>) -> &'static str {
    match leaf {
        Some(FieldType::Str | FieldType::StringArray) => "::text",
        Some(FieldType::Bool) => "::boolean",
        Some(FieldType::Time) => "::timestamptz",
        Some(FieldType::Int | FieldType::Float) => "::numeric",
        _ => "",
    }
}
