//! Content-addressed identity: equivalent parameter documents must
//! fingerprint identically.

use crate::prelude::*;
use serde_json::json;
use xpm_core::digest::{digest, unique_identifier};

#[test]
fn default_equal_arguments_are_transparent() {
    let bed = testbed();
    let v1 = bed.build(json!({ "$type": "test.Echo", "message": "m" }));
    let v2 = bed.build(json!({ "$type": "test.Echo", "message": "m", "extra": 2 }));
    assert_eq!(digest(&v1), digest(&v2));

    // a non-default value does change the digest
    let v3 = bed.build(json!({ "$type": "test.Echo", "message": "m", "extra": 3 }));
    assert_ne!(digest(&v1), digest(&v3));
}

#[test]
fn path_values_are_transparent() {
    let bed = testbed();
    // bare strings cast to the declared path type on insertion
    let v1 = bed.build(json!({ "$type": "test.Echo", "message": "m", "out": "/x" }));
    let v2 = bed.build(json!({ "$type": "test.Echo", "message": "m", "out": "/y" }));
    assert_eq!(digest(&v1), digest(&v2));

    let v3 = bed.build(json!({ "$type": "test.Echo", "message": "m", "out": { "$type": "path", "$value": "/z" } }));
    assert_eq!(digest(&v1), digest(&v3));
}

#[test]
fn wrapped_scalars_equal_their_bare_form() {
    let bed = testbed();
    let v1 = bed.build(json!({ "a": 1 }));
    let v2 = bed.build(json!({ "a": { "$value": 1, "z": "ignored" } }));
    assert_eq!(digest(&v1), digest(&v2));
}

#[test]
fn key_order_and_whitespace_do_not_matter() {
    let bed = testbed();
    let d1: serde_json::Value =
        serde_json::from_str(r#"{"$type":"test.Echo","message":"m","extra":5}"#).unwrap();
    let d2: serde_json::Value = serde_json::from_str(
        r#"{
            "extra":    5,
            "message":  "m",
            "$type":    "test.Echo"
        }"#,
    )
    .unwrap();
    assert_eq!(digest(&bed.build(d1)), digest(&bed.build(d2)));
}

#[test]
fn the_identifier_is_lowercase_hex() {
    let bed = testbed();
    let value = bed.build(json!({ "$type": "test.Echo", "message": "m" }));
    let id = unique_identifier(&value);
    assert_eq!(id.len(), 40);
    assert!(id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
}

#[test]
fn generation_does_not_change_the_identifier() {
    let bed = testbed();
    let mut value = bed.build(json!({ "$type": "test.Echo", "message": "m" }));
    let before = unique_identifier(&value);
    let registry = bed.registry.read();
    let ctx = xpm_registry::GeneratorContext::for_root(bed.workspace.jobs_dir(), &value);
    registry.validate(&mut value).unwrap();
    registry.configure(&mut value, &ctx).unwrap();
    assert_eq!(unique_identifier(&value), before);
}
