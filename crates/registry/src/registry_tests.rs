// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use xpm_core::{Scalar, Value};

fn registry_with_hierarchy() -> Registry {
    let mut registry = Registry::new();
    registry
        .load_json(&json!({
            "types": {
                "base.A": {},
                "base.B": { "parent": "base.A" },
                "base.C": { "parent": "base.B" },
                "other.X": { "parent": "base.A" },
            }
        }))
        .unwrap();
    registry
}

#[test]
fn predefined_types_are_installed() {
    let registry = Registry::new();
    for name in ["any", "boolean", "integer", "real", "string", "path"] {
        assert!(
            registry.get_type(&Typename::new(name)).is_some(),
            "missing predefined type {}",
            name
        );
    }
}

#[test]
fn every_type_accepts_itself() {
    let registry = registry_with_hierarchy();
    for name in ["any", "integer", "base.A", "base.C"] {
        let name = Typename::new(name);
        assert!(registry.accepts(&name, &name), "{} should accept itself", name);
    }
}

#[test]
fn any_accepts_everything() {
    let registry = registry_with_hierarchy();
    let any = Typename::new("any");
    for name in ["integer", "path", "base.C", "integer[]"] {
        assert!(registry.accepts(&any, &Typename::new(name)));
    }
}

#[test]
fn acceptance_follows_the_hierarchy() {
    let registry = registry_with_hierarchy();
    assert!(registry.accepts(&Typename::new("base.A"), &Typename::new("base.C")));
    assert!(!registry.accepts(&Typename::new("base.C"), &Typename::new("base.A")));
}

#[test]
fn real_accepts_integer_but_not_conversely() {
    let registry = Registry::new();
    assert!(registry.accepts(&Typename::new("real"), &Typename::new("integer")));
    assert!(!registry.accepts(&Typename::new("integer"), &Typename::new("real")));
}

#[test]
fn lca_is_commutative_and_an_ancestor() {
    let registry = registry_with_hierarchy();
    let b = Typename::new("base.B");
    let x = Typename::new("other.X");
    let lca = registry.lca(&b, &x);
    assert_eq!(lca, registry.lca(&x, &b));
    assert_eq!(lca.as_str(), "base.A");
    assert!(registry.ancestors(&b).contains(&lca));
    assert!(registry.ancestors(&x).contains(&lca));
}

#[test]
fn lca_of_unrelated_types_is_any() {
    let registry = registry_with_hierarchy();
    assert_eq!(
        registry
            .lca(&Typename::new("integer"), &Typename::new("base.A"))
            .as_str(),
        "any"
    );
}

#[test]
fn lca_of_equal_types_is_identity() {
    let registry = registry_with_hierarchy();
    let c = Typename::new("base.C");
    assert_eq!(registry.lca(&c, &c), c);
}

#[test]
fn array_suffix_resolves_lazily() {
    let registry = Registry::new();
    let t = registry.get_type(&Typename::new("integer[]")).unwrap();
    assert_eq!(t.name.as_str(), "integer[]");
    assert!(registry.get_type(&Typename::new("missing[]")).is_none());
}

#[test]
fn array_value_type_uses_element_lca() {
    let registry = registry_with_hierarchy();
    let mut array = Value::array();
    if let Value::Array(inner) = &mut array {
        inner.push(Value::scalar(Scalar::Integer(1))).unwrap();
        inner.push(Value::scalar(Scalar::Real(1.5))).unwrap();
    }
    // integer and real only meet at the root
    assert_eq!(registry.value_type(&array).as_str(), "any[]");

    let empty = Value::array();
    assert_eq!(registry.value_type(&empty).as_str(), "any[]");

    let mut ints = Value::array();
    if let Value::Array(inner) = &mut ints {
        inner.push(Value::scalar(Scalar::Integer(1))).unwrap();
        inner.push(Value::scalar(Scalar::Integer(2))).unwrap();
    }
    assert_eq!(registry.value_type(&ints).as_str(), "integer[]");
}

#[test]
fn set_entry_casts_bare_strings_for_path_arguments() {
    let mut registry = Registry::new();
    registry
        .load_json(&json!({
            "types": {
                "t": { "arguments": { "a": "integer", "b": "path" } }
            }
        }))
        .unwrap();
    let v1 = registry.build(&json!({ "$type": "t", "a": 1, "b": "/x" })).unwrap();
    let b = v1.as_map().unwrap().get("b").unwrap();
    assert!(matches!(
        &b.as_scalar().unwrap().scalar,
        xpm_core::Scalar::Path(_)
    ));
    // paths are digest-transparent whatever they point at
    let v2 = registry.build(&json!({ "$type": "t", "a": 1, "b": "/y" })).unwrap();
    assert_eq!(xpm_core::digest::digest(&v1), xpm_core::digest::digest(&v2));
}

#[test]
fn set_entry_flags_default_equal_values() {
    let mut registry = Registry::new();
    registry
        .load_json(&json!({
            "types": {
                "t": { "arguments": { "b": { "type": "integer", "default": 2 } } }
            }
        }))
        .unwrap();
    let mut value = registry.build(&json!({ "$type": "t" })).unwrap();
    let map = value.as_map_mut().unwrap();
    registry
        .set_entry(map, "b", Value::scalar(Scalar::Integer(2)))
        .unwrap();
    assert!(map.get("b").unwrap().can_ignore());

    registry
        .set_entry(map, "c", Value::scalar(Scalar::Integer(3)))
        .unwrap();
    assert!(!map.get("c").unwrap().can_ignore());
}
