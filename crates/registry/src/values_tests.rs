// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use xpm_core::{digest, ScalarKind};

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .load_json(&json!({
            "types": {
                "t": {
                    "arguments": {
                        "a": "integer",
                        "b": { "type": "integer", "default": 2 },
                    }
                }
            }
        }))
        .unwrap();
    registry
}

#[test]
fn scalars_build_from_bare_json() {
    let mut registry = Registry::new();
    let value = registry.build(&json!(3)).unwrap();
    assert_eq!(value.as_scalar().unwrap().scalar, Scalar::Integer(3));

    let value = registry.build(&json!("hello")).unwrap();
    assert_eq!(
        value.as_scalar().unwrap().scalar,
        Scalar::String("hello".into())
    );

    let value = registry.build(&json!(null)).unwrap();
    assert!(value.is_null());
}

#[test]
fn arrays_build_from_json_arrays() {
    let mut registry = Registry::new();
    let value = registry.build(&json!([1, 2, 3])).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 3);
}

#[test]
fn maps_carry_their_declared_type() {
    let mut registry = registry();
    let value = registry.build(&json!({ "$type": "t", "a": 1 })).unwrap();
    let map = value.as_map().unwrap();
    assert_eq!(map.type_name.as_str(), "t");
    assert_eq!(
        map.get("a").unwrap().as_scalar().unwrap().scalar,
        Scalar::Integer(1)
    );
}

#[test]
fn unknown_type_registers_a_placeholder() {
    let mut registry = Registry::new();
    registry.build(&json!({ "$type": "later.T" })).unwrap();
    let t = registry.get_type(&Typename::new("later.T")).unwrap();
    assert!(t.placeholder);
}

#[test]
fn default_equal_entries_are_flagged() {
    let mut registry = registry();
    let value = registry
        .build(&json!({ "$type": "t", "a": 1, "b": 2 }))
        .unwrap();
    let map = value.as_map().unwrap();
    assert!(map.get("b").unwrap().can_ignore());
    assert!(!map.get("a").unwrap().can_ignore());
}

#[test]
fn wrapped_value_discards_extra_keys() {
    let mut registry = Registry::new();
    let plain = registry.build(&json!(1)).unwrap();
    let wrapped = registry
        .build(&json!({ "$value": 1, "z": "ignored" }))
        .unwrap();
    assert_eq!(digest::digest(&plain), digest::digest(&wrapped));
}

#[test]
fn wrapped_value_casts_to_the_declared_type() {
    let mut registry = Registry::new();
    let value = registry
        .build(&json!({ "$type": "path", "$value": "/x/y" }))
        .unwrap();
    assert_eq!(value.as_scalar().unwrap().scalar.kind(), ScalarKind::Path);
}

#[test]
fn wrapped_value_rejects_lossy_casts() {
    let mut registry = Registry::new();
    let err = registry.build(&json!({ "$type": "integer", "$value": 2.5 }));
    assert!(err.is_err());
}

#[test]
fn wrapped_integer_is_accepted_as_real() {
    // real accepts integer through the castable whitelist; no cast happens
    let mut registry = Registry::new();
    let value = registry
        .build(&json!({ "$type": "real", "$value": 3 }))
        .unwrap();
    assert_eq!(
        value.as_scalar().unwrap().scalar.kind(),
        ScalarKind::Integer
    );
}

#[test]
fn wrapped_array_values_build() {
    let mut registry = Registry::new();
    let value = registry
        .build(&json!({ "$type": "integer[]", "$value": [1, 2] }))
        .unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
}

#[test]
fn job_tag_becomes_a_token() {
    let mut registry = Registry::new();
    let value = registry
        .build(&json!({ "$type": "t", "$job": { "locator": "/jobs/t/abc/x" } }))
        .unwrap();
    let token = value.as_map().unwrap().job.clone().unwrap();
    assert_eq!(token.locator.raw(), "/jobs/t/abc/x");

    let value = registry
        .build(&json!({ "$job": "/jobs/t/def/x" }))
        .unwrap();
    assert!(value.as_map().unwrap().job.is_some());
}

#[test]
fn task_tag_is_kept() {
    let mut registry = Registry::new();
    let value = registry
        .build(&json!({ "$type": "t", "$task": "t.task" }))
        .unwrap();
    assert_eq!(
        value.as_map().unwrap().task.as_ref().unwrap().as_str(),
        "t.task"
    );
}

#[test]
fn unknown_reserved_keys_are_rejected() {
    let mut registry = Registry::new();
    let err = registry.build(&json!({ "$mystery": 1 }));
    assert!(err.is_err());
}

#[test]
fn unknown_reserved_keys_are_rejected_next_to_a_wrapped_value() {
    // plain keys are discarded by the wrapped-value rule; reserved ones
    // are not
    let mut registry = Registry::new();
    let err = registry.build(&json!({ "$value": 1, "$mystery": 2 }));
    assert!(err.is_err());

    let mut registry = Registry::new();
    let ok = registry.build(&json!({ "$value": 1, "z": "ignored" }));
    assert!(ok.is_ok());
}

#[test]
fn key_order_does_not_change_the_digest() {
    let mut registry = registry();
    let v1 = registry
        .build(&serde_json::from_str(r#"{"$type":"t","a":1,"b":3}"#).unwrap())
        .unwrap();
    let v2 = registry
        .build(&serde_json::from_str(r#"{"b":3,"a":1,"$type":"t"}"#).unwrap())
        .unwrap();
    assert_eq!(digest::digest(&v1), digest::digest(&v2));
}
