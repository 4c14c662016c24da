//! Property-based tests using proptest
//!
//! These tests check the parsers against randomized `ovn-nbctl` style
//! output: malformed input must degrade to fewer resources, never a panic.

use ovnscope::resource::{normalize_json, parse_json, parse_output, parse_text, ResourceKind};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_kind() -> impl Strategy<Value = ResourceKind> {
    prop::sample::select(ResourceKind::ALL.to_vec())
}

/// Generate a row as `ovn-nbctl --format=json list` prints it
fn arb_row() -> impl Strategy<Value = Value> {
    (
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}", // _uuid
        "[a-z][a-z0-9-]{0,20}",                                        // name
        prop_oneof!["router", "localnet", "patch", ""],               // type
    )
        .prop_map(|(id, name, port_type)| json!([["uuid", id], name, port_type]))
}

/// Generate a full headings/data document
fn arb_listing() -> impl Strategy<Value = Value> {
    prop::collection::vec(arb_row(), 0..50).prop_map(|rows| {
        json!({
            "data": rows,
            "headings": ["_uuid", "name", "type"]
        })
    })
}

proptest! {
    /// Text with no single quotes is returned as is
    #[test]
    fn normalize_leaves_double_quoted_json(doc in arb_listing()) {
        let raw = doc.to_string();
        let normalized = normalize_json(&raw);
        prop_assert_eq!(normalized.as_ref(), raw.as_str());
    }

    /// Every generated row becomes exactly one resource
    #[test]
    fn listing_row_count_is_preserved(doc in arb_listing()) {
        let rows = doc["data"].as_array().map(Vec::len).unwrap_or(0);
        let resources = parse_json(ResourceKind::SwitchPort, &doc.to_string());
        prop_assert_eq!(resources.len(), rows);
    }

    /// Quoting the whole listing with single quotes parses the same
    #[test]
    fn single_quoted_listing_parses_like_double_quoted(doc in arb_listing()) {
        let raw = doc.to_string();
        let single = raw.replace('"', "'");

        let expected = parse_json(ResourceKind::SwitchPort, &raw);
        let repaired = parse_json(ResourceKind::SwitchPort, &single);

        prop_assert_eq!(
            repaired.iter().map(|r| (&r.id, &r.name)).collect::<Vec<_>>(),
            expected.iter().map(|r| (&r.id, &r.name)).collect::<Vec<_>>()
        );
    }

    /// Arbitrary input never panics either parser
    #[test]
    fn parsers_never_panic(kind in arb_kind(), raw in ".*", json in any::<bool>()) {
        let _ = parse_json(kind, &raw);
        let _ = parse_text(kind, &raw, None);
        let _ = parse_output(kind, &raw, json);
    }

    /// Lines made of structural noise never panic the table parser
    #[test]
    fn table_noise_never_panics(kind in arb_kind(), raw in "(_uuid|[|+=\n -]|[a-z0-9]){0,200}") {
        let _ = parse_text(kind, &raw, Some("owner"));
    }

    /// Blank input is empty, never a placeholder resource
    #[test]
    fn blank_text_is_empty(kind in arb_kind(), raw in "[ \t\r\n]{0,20}") {
        prop_assert!(parse_text(kind, &raw, None).is_empty());
    }

    /// An owner is stamped on every parsed line
    #[test]
    fn owner_is_stamped(lines in prop::collection::vec("[a-z][a-z0-9 ]{0,15}", 1..20)) {
        let raw = lines.join("\n");
        for resource in parse_text(ResourceKind::Switch, &raw, Some("lr-owner")) {
            prop_assert_eq!(resource.field_str("router"), "lr-owner");
        }
    }
}

/// Tests for identifier-derived names
mod name_tests {
    use super::*;
    use uuid::Uuid;

    proptest! {
        /// A bare identifier line is named after the kind and its first 8 chars
        #[test]
        fn bare_id_line_is_named_from_prefix(kind in arb_kind(), _seed in any::<u8>()) {
            let id = Uuid::new_v4().to_string();
            let resources = parse_text(kind, &id, None);

            prop_assert_eq!(resources.len(), 1);
            prop_assert_eq!(&resources[0].id, &id);
            prop_assert!(resources[0].name.ends_with(&id[..8]));
            prop_assert_eq!(&resources[0].name, &format!("{}-{}", kind.label(), &id[..8]));
        }

        /// `uuid (name)` lines keep the name inside the parentheses
        #[test]
        fn named_id_line_keeps_name(kind in arb_kind(), name in "[a-z][a-z0-9_-]{0,20}") {
            let id = Uuid::new_v4().to_string();
            let resources = parse_text(kind, &format!("{} ({})", id, name), None);

            prop_assert_eq!(resources.len(), 1);
            prop_assert_eq!(&resources[0].id, &id);
            prop_assert_eq!(&resources[0].name, &name);
        }
    }
}
