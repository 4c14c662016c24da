//! Parsing Engine
//!
//! Turns raw `ovn-nbctl` output into [`Resource`]s. JSON goes through a
//! three-stage chain (strict, single-quote repair, `data` extraction); text
//! is read either as a pipe-delimited table or line by line.
//!
//! The public entry points never fail: a failed parse yields an empty list
//! and a logged diagnostic.

use super::model::{synthesized_name, FieldMap, Resource};
use super::registry::{describe, ResourceKind};
use crate::error::{excerpt, IngestError, IngestResult, ParseFormat};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Token marking the identifier column of table output
pub const ID_COLUMN: &str = "_uuid";

const DATA_MARKER: &str = "\"data\":";
const HEADINGS_MARKER: &str = "\"headings\":";

/// Signature shared by every per-kind text parser
pub type TextParseFn = fn(ResourceKind, &str, Option<&str>) -> Vec<Resource>;

struct Patterns {
    quoted_literal: Regex,
    quoted_key: Regex,
    quoted_value: Regex,
    id_with_name: Regex,
    id_only: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        quoted_literal: compile(r"'(true|false|null)'"),
        quoted_key: compile(r"'([^']+)':"),
        quoted_value: compile(r": '([^']+)'"),
        id_with_name: compile(r"^([0-9a-fA-F-]+(?:-[0-9a-fA-F-]+)+)\s*\(([^)]+)\)"),
        id_only: compile(r"^([0-9a-fA-F-]+(?:-[0-9a-fA-F-]+)+)$"),
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid built-in pattern {}: {}", pattern, e))
}

// =============================================================================
// JSON
// =============================================================================

/// Rewrite single-quoted pseudo-JSON into double-quoted JSON.
///
/// Applied in a fixed order: quoted literals, quoted keys, quoted scalar
/// values, then every remaining single quote. Text without single quotes is
/// returned untouched.
pub fn normalize_json(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\'') {
        return Cow::Borrowed(raw);
    }

    let p = patterns();
    let step = p.quoted_literal.replace_all(raw, "\"$1\"");
    let step = p.quoted_key.replace_all(&step, "\"$1\":");
    let step = p.quoted_value.replace_all(&step, ": \"$1\"");
    Cow::Owned(step.replace('\'', "\""))
}

/// Best-effort repair used when storing snapshots: the original text unless
/// normalizing it produces strictly valid JSON.
pub fn repair_json(raw: &str) -> Cow<'_, str> {
    if serde_json::from_str::<Value>(raw).is_ok() {
        return Cow::Borrowed(raw);
    }

    match normalize_json(raw) {
        Cow::Owned(normalized) if serde_json::from_str::<Value>(&normalized).is_ok() => {
            tracing::info!("Normalized single-quoted JSON payload");
            Cow::Owned(normalized)
        }
        _ => {
            tracing::warn!("JSON normalization failed, keeping original payload");
            Cow::Borrowed(raw)
        }
    }
}

/// Last-resort recovery: cut the rows between `"data":` and `"headings":`
fn extract_data_rows(text: &str) -> Option<Value> {
    let start = text.find(DATA_MARKER)? + DATA_MARKER.len();
    let mut part = &text[start..];

    if let Some(end) = part.find(HEADINGS_MARKER) {
        part = part[..end].trim();
        part = part.strip_suffix(',').unwrap_or(part);
    }

    let rows: Value = serde_json::from_str(part.trim()).ok()?;
    let mut wrapped = serde_json::Map::new();
    wrapped.insert("data".to_string(), rows);
    Some(Value::Object(wrapped))
}

/// Run the three JSON stages and return the first successfully parsed value
fn decode_json(kind: ResourceKind, raw: &str) -> IngestResult<Value> {
    let strict_err = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    tracing::info!("Attempting to normalize JSON data for {}", kind);
    let normalized = normalize_json(raw);
    let normalized_err = match serde_json::from_str::<Value>(&normalized) {
        Ok(value) => {
            tracing::info!("Successfully normalized and parsed JSON for {}", kind);
            return Ok(value);
        }
        Err(e) => e,
    };
    tracing::warn!("Simple normalization failed for {}: {}", kind, normalized_err);

    if let Some(value) = extract_data_rows(&normalized) {
        tracing::info!("Extracted and parsed data part for {}", kind);
        return Ok(value);
    }

    Err(IngestError::parse(
        kind,
        ParseFormat::Json,
        format!("{} (after normalization: {})", strict_err, normalized_err),
        raw,
    ))
}

/// Unwrap a one-element sequence used as a key, then render it as a string
fn pair_key(key: &Value) -> String {
    let key = match key {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    };
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build one record out of a `data` row
fn row_fields(headings: &[String], row: &[Value]) -> FieldMap {
    if !headings.is_empty() && headings.len() == row.len() {
        return headings.iter().cloned().zip(row.iter().cloned()).collect();
    }

    row.chunks_exact(2)
        .map(|pair| (pair_key(&pair[0]), pair[1].clone()))
        .collect()
}

fn record_source(fields: &FieldMap) -> String {
    serde_json::to_string(fields).unwrap_or_default()
}

/// Interpret an already-decoded JSON value
pub fn resources_from_value(kind: ResourceKind, data: Value) -> Vec<Resource> {
    match data {
        Value::Object(mut map) if matches!(map.get("data"), Some(Value::Array(_))) => {
            tracing::info!("Processing data in 'data' field for {}", kind);

            let headings: Vec<String> = match map.remove("headings") {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(|h| match h {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                _ => Vec::new(),
            };

            let Some(Value::Array(rows)) = map.remove("data") else {
                return Vec::new();
            };

            rows.into_iter()
                .filter_map(|row| match row {
                    Value::Array(values) => Some(row_fields(&headings, &values)),
                    Value::Object(fields) => Some(fields),
                    other => {
                        tracing::debug!("Skipping non-record row for {}: {}", kind, other);
                        None
                    }
                })
                .map(|fields| {
                    let source = record_source(&fields);
                    Resource::from_fields(kind, fields, &source)
                })
                .collect()
        }
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => {
                    let source = record_source(&fields);
                    Some(Resource::from_fields(kind, fields, &source))
                }
                other => {
                    tracing::warn!("Skipping non-object array element for {}: {}", kind, other);
                    None
                }
            })
            .collect(),
        Value::Object(fields) if fields.is_empty() => Vec::new(),
        Value::Object(fields) => {
            let source = record_source(&fields);
            vec![Resource::from_fields(kind, fields, &source)]
        }
        Value::Null => Vec::new(),
        other => {
            tracing::error!(
                "Unexpected JSON data type for {}: {}",
                kind,
                excerpt(&other.to_string())
            );
            Vec::new()
        }
    }
}

/// Parse JSON output, surfacing the diagnostic when every stage fails
pub fn try_parse_json(kind: ResourceKind, raw: &str) -> IngestResult<Vec<Resource>> {
    let data = decode_json(kind, raw)?;
    Ok(resources_from_value(kind, data))
}

/// Parse JSON output. Never fails; see [`try_parse_json`].
pub fn parse_json(kind: ResourceKind, raw: &str) -> Vec<Resource> {
    try_parse_json(kind, raw).unwrap_or_else(|e| {
        tracing::error!("{}", e);
        Vec::new()
    })
}

// =============================================================================
// Text
// =============================================================================

fn is_table(text: &str) -> bool {
    text.contains(ID_COLUMN) && text.contains('\n') && text.contains('|')
}

fn is_separator(line: &str) -> bool {
    line.contains("---")
        || line
            .trim()
            .chars()
            .all(|c| matches!(c, '-' | '+' | '|' | '=' | ' '))
}

fn split_cells(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse pipe-delimited table output
fn parse_table(kind: ResourceKind, text: &str) -> Vec<Resource> {
    let lines: Vec<&str> = text.trim().lines().collect();

    let Some(header_idx) = lines.iter().position(|line| line.contains(ID_COLUMN)) else {
        tracing::warn!("Could not find header in table output for {}", kind);
        return Vec::new();
    };

    let columns = split_cells(lines[header_idx]);
    tracing::debug!("Found {} columns in table header: {:?}", columns.len(), columns);

    let mut resources = Vec::new();
    for line in &lines[header_idx + 1..] {
        if line.trim().is_empty() || is_separator(line) {
            continue;
        }

        let values = split_cells(line);
        if values.len() == columns.len() {
            let fields: FieldMap = columns
                .iter()
                .cloned()
                .zip(values.into_iter().map(Value::String))
                .collect();
            resources.push(Resource::from_fields(kind, fields, line.trim()));
            continue;
        }

        tracing::warn!(
            "Column count mismatch in {} row: expected {}, got {}",
            kind,
            columns.len(),
            values.len()
        );

        let fields: FieldMap = columns
            .iter()
            .cloned()
            .zip(values.into_iter().map(Value::String))
            .collect();

        if fields.contains_key(ID_COLUMN) || fields.contains_key("name") {
            resources.push(Resource::from_fields(kind, fields, line.trim()));
        } else {
            tracing::debug!("Discarding unsalvageable row: {}", excerpt(line));
        }
    }

    tracing::info!("Parsed {} rows from table format for {}", resources.len(), kind);
    resources
}

/// Read one `uuid (name)` / bare `uuid` / free-form line.
/// Returns `None` for blank lines.
fn parse_line(kind: ResourceKind, line: &str) -> Option<Resource> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let p = patterns();
    let mut fields = FieldMap::new();

    if let Some(caps) = p.id_with_name.captures(line) {
        tracing::debug!("Matched UUID and name: {}, {}", &caps[1], &caps[2]);
        fields.insert(ID_COLUMN.to_string(), Value::String(caps[1].to_string()));
        fields.insert("name".to_string(), Value::String(caps[2].trim().to_string()));
    } else if let Some(caps) = p.id_only.captures(line) {
        tracing::debug!("Matched UUID only: {}", &caps[1]);
        fields.insert(ID_COLUMN.to_string(), Value::String(caps[1].to_string()));
        fields.insert(
            "name".to_string(),
            Value::String(synthesized_name(kind, &caps[1])),
        );
    } else {
        tracing::debug!("Using line as name: {}", line);
        fields.insert("name".to_string(), Value::String(line.to_string()));
    }

    Some(Resource::from_fields(kind, fields, line))
}

fn stamp_owner(resources: &mut [Resource], owner_id: Option<&str>) {
    if let Some(owner) = owner_id {
        for resource in resources {
            resource.set_owner(owner);
        }
    }
}

/// Parse text output: table format when detected, otherwise line patterns.
/// `owner_id` is stamped onto every resource as its owning router.
pub fn parse_text(kind: ResourceKind, raw: &str, owner_id: Option<&str>) -> Vec<Resource> {
    parse_text_with(kind, raw, owner_id, true)
}

/// Router port listings: like [`parse_text`], but free-form lines without an
/// identifier never become ports. Salvaged table rows are kept.
pub fn parse_router_port_text(
    kind: ResourceKind,
    raw: &str,
    owner_id: Option<&str>,
) -> Vec<Resource> {
    parse_text_with(kind, raw, owner_id, false)
}

fn parse_text_with(
    kind: ResourceKind,
    raw: &str,
    owner_id: Option<&str>,
    anonymous_lines: bool,
) -> Vec<Resource> {
    if raw.trim().is_empty() {
        tracing::debug!("Empty text input for {}", kind);
        return Vec::new();
    }

    tracing::debug!("Parsing text for {}: {}", kind, excerpt(raw));

    let mut resources: Vec<Resource> = if is_table(raw) {
        tracing::info!("Detected table format for {}", kind);
        parse_table(kind, raw)
    } else {
        raw.lines()
            .filter_map(|line| parse_line(kind, line))
            .filter(|resource| {
                let keep = anonymous_lines || !resource.id.is_empty();
                if !keep {
                    tracing::debug!("Dropping line without identifier: {}", resource.name);
                }
                keep
            })
            .collect()
    };

    stamp_owner(&mut resources, owner_id);

    if resources.is_empty() {
        tracing::warn!(
            "{}",
            IngestError::parse(kind, ParseFormat::Text, "no records recognized", raw)
        );
    } else {
        tracing::info!("Parsed {} resources from text for {}", resources.len(), kind);
    }
    resources
}

/// Text parser used for each kind
pub fn text_parser(kind: ResourceKind) -> TextParseFn {
    match kind {
        ResourceKind::RouterPort => parse_router_port_text,
        ResourceKind::Switch
        | ResourceKind::Router
        | ResourceKind::SwitchPort
        | ResourceKind::LoadBalancer
        | ResourceKind::Acl
        | ResourceKind::AddressSet
        | ResourceKind::DhcpOptions
        | ResourceKind::Qos
        | ResourceKind::Nat => parse_text,
    }
}

// =============================================================================
// Fallback selection
// =============================================================================

/// Parse list output for `kind`: JSON first when the kind supports it, then
/// the kind's text parser if every JSON stage failed.
///
/// Valid JSON with no rows is an empty table, not a reason to retry as text.
pub fn parse_output(kind: ResourceKind, raw: &str, json_requested: bool) -> Vec<Resource> {
    let text = text_parser(kind);

    if !(json_requested && describe(kind).json_supported) {
        return text(kind, raw, None);
    }

    match try_parse_json(kind, raw) {
        Ok(resources) => resources,
        Err(_) if raw.trim().is_empty() => Vec::new(),
        Err(e) => {
            tracing::info!("{}; retrying as text", e);
            text(kind, raw, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID_A: &str = "12345678-1234-5678-1234-567812345678";
    const UUID_B: &str = "87654321-8765-4321-8765-432187654321";

    #[test]
    fn test_headings_shape() {
        let raw = r#"{"headings":["_uuid","name"],"data":[["u1","n1"],["u2","n2"]]}"#;
        let resources = parse_json(ResourceKind::Switch, raw);
        assert_eq!(resources.len(), 2);
        assert_eq!((resources[0].id.as_str(), resources[0].name.as_str()), ("u1", "n1"));
        assert_eq!((resources[1].id.as_str(), resources[1].name.as_str()), ("u2", "n2"));
    }

    #[test]
    fn test_headings_row_length_mismatch_uses_pairs() {
        let raw = r#"{"headings":["_uuid","name","mac"],"data":[[["_uuid"],"u1","name","n1"]]}"#;
        let resources = parse_json(ResourceKind::RouterPort, raw);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "u1");
        assert_eq!(resources[0].name, "n1");
    }

    #[test]
    fn test_ovsdb_json_rows() {
        let raw = concat!(
            r#"{"data":[[["uuid","5b35d6ab-b7c0-4afb-887c-d8caff5fe520"],"ls0",["set",[]]]],"#,
            r#""headings":["_uuid","name","ports"]}"#
        );
        let resources = parse_json(ResourceKind::Switch, raw);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "5b35d6ab-b7c0-4afb-887c-d8caff5fe520");
        assert_eq!(resources[0].name, "ls0");
        assert!(resources[0].fields.contains_key("ports"));
    }

    #[test]
    fn test_bare_array_and_mapping() {
        let raw = r#"[{"_uuid": "uuid1", "name": "name1"}, {"_uuid": "uuid2", "name": "name2"}]"#;
        let resources = parse_json(ResourceKind::Switch, raw);
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[1].id, "uuid2");

        let resources = parse_json(ResourceKind::Switch, r#"{"_uuid": "uuid1", "name": "name1"}"#);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "name1");
    }

    #[test]
    fn test_scalar_top_level_is_empty() {
        assert!(parse_json(ResourceKind::Acl, "42").is_empty());
        assert!(parse_json(ResourceKind::Acl, "{}").is_empty());
        assert!(parse_json(ResourceKind::Acl, "[]").is_empty());
    }

    #[test]
    fn test_single_quoted_json_is_normalized() {
        let quoted = parse_json(ResourceKind::Switch, "{'a': 'b', 'c': 'true'}");
        let plain = parse_json(ResourceKind::Switch, r#"{"a":"b","c":"true"}"#);
        assert_eq!(quoted.len(), 1);
        assert_eq!(quoted[0].fields, plain[0].fields);
    }

    #[test]
    fn test_normalize_leaves_double_quoted_json_alone() {
        let raw = r#"{"a":"b","c":"true"}"#;
        assert!(matches!(normalize_json(raw), Cow::Borrowed(_)));
        assert_eq!(repair_json(raw), raw);
    }

    #[test]
    fn test_normalize_order() {
        assert_eq!(normalize_json("{'k': 'null'}"), r#"{"k": "null"}"#);
        assert_eq!(normalize_json("['a', 'b']"), r#"["a", "b"]"#);
    }

    #[test]
    fn test_repair_keeps_original_when_unrecoverable() {
        let raw = "{'a': 'it's broken'";
        assert_eq!(repair_json(raw), raw);
    }

    #[test]
    fn test_data_extraction_stage() {
        // Trailing garbage after the headings breaks whole-document parsing
        let raw = r#"{'data': [['u1', 'n1']], 'headings': ['_uuid', 'name'] trailing"#;
        let resources = try_parse_json(ResourceKind::Router, raw).unwrap();
        assert_eq!(resources.len(), 1);
        // no headings survive extraction, so the row is read as a key/value pair
        assert_eq!(resources[0].fields["u1"], "n1");
    }

    #[test]
    fn test_total_failure_reports_diagnostic() {
        let err = try_parse_json(ResourceKind::Nat, "not json at all").unwrap_err();
        assert!(matches!(err, IngestError::ParseFailure { format: ParseFormat::Json, .. }));
        assert!(parse_json(ResourceKind::Nat, "not json at all").is_empty());
    }

    #[test]
    fn test_text_uuid_and_name() {
        let raw = format!("{} (myswitch)", UUID_A);
        let resources = parse_text(ResourceKind::Switch, &raw, None);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, UUID_A);
        assert_eq!(resources[0].name, "myswitch");
    }

    #[test]
    fn test_text_uuid_without_space_before_name() {
        let raw = format!("{}(lr0)", UUID_B);
        let resources = parse_text(ResourceKind::Router, &raw, None);
        assert_eq!(resources[0].id, UUID_B);
        assert_eq!(resources[0].name, "lr0");
    }

    #[test]
    fn test_text_bare_uuid() {
        let resources = parse_text(ResourceKind::Switch, UUID_A, None);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, UUID_A);
        assert_eq!(resources[0].name, "Switch-12345678");
    }

    #[test]
    fn test_text_free_form_line() {
        let resources = parse_text(ResourceKind::LoadBalancer, "  no load balancers  \n\n", None);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "");
        assert_eq!(resources[0].name, "no load balancers");
    }

    #[test]
    fn test_text_blank_input() {
        assert!(parse_text(ResourceKind::Switch, "   \n\t", None).is_empty());
    }

    #[test]
    fn test_table_format() {
        let raw = "_uuid | name | mac\n-----+------+-----\n\
                   u1 | p1 | 00:00:00:00:00:01\nu2 | p2\n | | \n";
        let resources = parse_text(ResourceKind::RouterPort, raw, None);
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].field_str("mac"), "00:00:00:00:00:01");
        // salvaged row keeps the overlapping prefix
        assert_eq!(resources[1].id, "u2");
        assert_eq!(resources[1].name, "p2");
        assert!(!resources[1].fields.contains_key("mac"));
    }

    #[test]
    fn test_table_discards_row_without_identity() {
        let raw = "name | _uuid | mac\nonly-one-cell\n";
        let resources = parse_text(ResourceKind::RouterPort, raw, None);
        // prefix salvage maps the single cell to `name`, so it is kept
        assert_eq!(resources.len(), 1);

        let raw = "mac | _uuid | name\n00:00:00:00:00:01\n";
        assert!(parse_text(ResourceKind::RouterPort, raw, None).is_empty());
    }

    #[test]
    fn test_owner_is_stamped() {
        let raw = format!("{} (name1)\n{} (name2)", UUID_A, UUID_B);
        let ports = parse_text(ResourceKind::RouterPort, &raw, Some("test-router-uuid"));
        assert_eq!(ports.len(), 2);
        for port in &ports {
            assert_eq!(port.field_str("router"), "test-router-uuid");
        }
    }

    #[test]
    fn test_router_port_parser_drops_free_form_lines() {
        let raw = format!("{} (lrp0)\nsome noise\n", UUID_A);
        let parse = text_parser(ResourceKind::RouterPort);
        let ports = parse(ResourceKind::RouterPort, &raw, Some("r"));
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "lrp0");
    }

    #[test]
    fn test_router_port_parser_keeps_salvaged_table_rows() {
        let raw = "name | _uuid | mac\nlrp-name-only\n";
        let parse = text_parser(ResourceKind::RouterPort);
        let ports = parse(ResourceKind::RouterPort, raw, Some("lr-uuid"));
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].id, "");
        assert_eq!(ports[0].name, "lrp-name-only");
        assert_eq!(ports[0].field_str("router"), "lr-uuid");
    }

    #[test]
    fn test_fallback_to_text_when_json_fails() {
        let raw = format!("{} (sw0)", UUID_A);
        let resources = parse_output(ResourceKind::Switch, &raw, true);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "sw0");
    }

    #[test]
    fn test_empty_json_table_is_not_retried_as_text() {
        let raw = "{\"data\":[],\"headings\":[\"_uuid\",\"action\"]}\n";
        assert!(parse_output(ResourceKind::Acl, raw, true).is_empty());
        assert!(parse_output(ResourceKind::Nat, "[]", true).is_empty());
        assert!(parse_output(ResourceKind::Qos, "null", true).is_empty());
    }

    #[test]
    fn test_fallback_skipped_for_blank_output() {
        assert!(parse_output(ResourceKind::Switch, "", true).is_empty());
    }

    #[test]
    fn test_json_not_requested_goes_to_text() {
        // A valid JSON object read as text becomes a single free-form line
        let resources = parse_output(ResourceKind::Switch, r#"{"name":"x"}"#, false);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "");
    }
}
