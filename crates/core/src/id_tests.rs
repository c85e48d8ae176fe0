// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

// --- define_id! macro tests ---

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn define_id_generates_prefixed_uuid() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
    assert_eq!(id.suffix().len(), 32);
}

#[test]
fn define_id_unique_across_calls() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
}

#[test]
fn define_id_hash_map_lookup() {
    let mut map = HashMap::new();
    map.insert(TestId::from_string("tst-k"), 42);
    assert_eq!(map.get("tst-k"), Some(&42));
}

#[test]
fn define_id_suffix_strips_prefix() {
    let id = TestId::from_string("tst-abcdef");
    assert_eq!(id.suffix(), "abcdef");
}

// --- short() tests ---

#[test]
fn define_id_short_truncates() {
    let id = TestId::from_string("tst-abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
}

#[test]
fn define_id_short_returns_full_when_shorter() {
    let id = TestId::from_string("tst-abc");
    assert_eq!(id.short(8), "abc");
}

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

// --- IdBuf tests ---

#[test]
fn idbuf_roundtrips_through_serde() {
    let id = TestId::new();
    let json = serde_json::to_string(&id).unwrap();
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn idbuf_rejects_oversized_input_on_deserialize() {
    let long = format!("\"tst-{}\"", "a".repeat(ID_MAX_LEN));
    let result: Result<TestId, _> = serde_json::from_str(&long);
    assert!(result.is_err());
}

#[test]
fn idbuf_empty_is_empty() {
    assert!(IdBuf::empty().is_empty());
    assert!(!IdBuf::new("x").is_empty());
}
