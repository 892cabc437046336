//! Type acceptance and LCA laws

use crate::prelude::*;
use serde_json::json;
use xpm_core::Typename;

#[test]
fn every_type_accepts_itself_and_any_accepts_all() {
    let bed = testbed();
    let registry = bed.registry.read();
    let any = Typename::new("any");
    for name in ["any", "boolean", "integer", "real", "string", "path", "test.Echo"] {
        let name = Typename::new(name);
        assert!(registry.accepts(&name, &name), "{} accepts itself", name);
        assert!(registry.accepts(&any, &name), "any accepts {}", name);
    }
}

#[test]
fn real_accepts_integer_but_not_conversely() {
    let bed = testbed();
    let registry = bed.registry.read();
    assert!(registry.accepts(&Typename::new("real"), &Typename::new("integer")));
    assert!(!registry.accepts(&Typename::new("integer"), &Typename::new("real")));
}

#[test]
fn lca_is_commutative_and_an_ancestor_of_both() {
    let bed = testbed();
    bed.registry
        .write()
        .load_json(&json!({
            "types": {
                "h.Base": {},
                "h.Left": { "parent": "h.Base" },
                "h.Right": { "parent": "h.Base" },
            }
        }))
        .unwrap();
    let registry = bed.registry.read();
    let left = Typename::new("h.Left");
    let right = Typename::new("h.Right");
    let lca = registry.lca(&left, &right);
    assert_eq!(lca, registry.lca(&right, &left));
    assert_eq!(lca.as_str(), "h.Base");
    assert!(registry.ancestors(&left).contains(&lca));
    assert!(registry.ancestors(&right).contains(&lca));
}

#[test]
fn mixed_arrays_take_the_lca_component() {
    let bed = testbed();
    let value = bed.build(json!([1, 2.5]));
    assert_eq!(bed.registry.read().value_type(&value).as_str(), "any[]");

    let ints = bed.build(json!([1, 2]));
    assert_eq!(bed.registry.read().value_type(&ints).as_str(), "integer[]");
}

#[test]
fn placeholders_promote_transparently() {
    let bed = testbed();
    bed.registry
        .write()
        .load_json(&json!({
            "types": { "fwd.User": { "arguments": { "dep": "fwd.Later" } } }
        }))
        .unwrap();
    assert!(bed
        .registry
        .read()
        .get_type(&Typename::new("fwd.Later"))
        .unwrap()
        .placeholder);

    bed.registry
        .write()
        .load_json(&json!({
            "types": { "fwd.Later": { "arguments": { "x": "integer" } } }
        }))
        .unwrap();

    // the reference taken before the definition now sees the full type
    let registry = bed.registry.read();
    let user = registry.get_type(&Typename::new("fwd.User")).unwrap();
    let dep_type = registry.get_type(&user.argument("dep").unwrap().type_name).unwrap();
    assert!(!dep_type.placeholder);
    assert!(dep_type.argument("x").is_some());
}
