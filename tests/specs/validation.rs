//! Validation and configuration of parameter values

use crate::prelude::*;
use serde_json::json;
use xpm_core::ValueError;
use xpm_registry::GeneratorContext;

#[test]
fn missing_required_argument_reports_its_path() {
    let bed = testbed();
    let mut value = bed.build(json!({ "$type": "test.Consume" }));
    let err = bed.registry.read().validate(&mut value).unwrap_err();
    match &err {
        ValueError::Parameter { path, .. } => {
            assert_eq!(path.as_slice(), ["input".to_string()]);
        }
        other => panic!("expected a parameter error, got {}", other),
    }
    assert!(err.to_string().starts_with("error with parameter input:"));
}

#[test]
fn nested_validation_failures_carry_dotted_paths() {
    let bed = testbed();
    let mut value = bed.build(json!({
        "$type": "test.Consume",
        "input": { "$type": "test.Out", "tag": 3 },
    }));
    let err = bed.registry.read().validate(&mut value).unwrap_err();
    assert!(
        err.to_string().starts_with("error with parameter input.tag:"),
        "unexpected: {}",
        err
    );
}

#[test]
fn validate_generate_and_seal_are_idempotent() {
    let bed = testbed();
    let mut value = bed.build(json!({ "$type": "test.Echo", "message": "m" }));
    let registry = bed.registry.read();
    let ctx = GeneratorContext::for_root(bed.workspace.jobs_dir(), &value);

    registry.validate(&mut value).unwrap();
    registry.validate(&mut value).unwrap();
    registry.generate(&mut value, &ctx).unwrap();
    let after_first = value.to_json().unwrap();
    registry.generate(&mut value, &ctx).unwrap();
    assert_eq!(value.to_json().unwrap(), after_first);

    value.seal();
    value.seal();
    assert!(value.is_sealed());
}

#[test]
fn sealed_values_reject_mutation() {
    let bed = testbed();
    let mut value = bed.build(json!({ "$type": "test.Echo", "message": "m" }));
    value.seal();
    let map = value.as_map_mut().unwrap();
    let err = map.insert("message", xpm_core::Value::scalar(xpm_core::Scalar::None));
    assert!(matches!(err, Err(ValueError::Sealed)));
}

#[test]
fn generators_fill_the_job_directory_path() {
    let bed = testbed();
    let mut value = bed.build(json!({ "$type": "test.Echo", "message": "m" }));
    let registry = bed.registry.read();
    let ctx = GeneratorContext::for_root(bed.workspace.jobs_dir(), &value);
    registry.generate(&mut value, &ctx).unwrap();

    let out = value.as_map().unwrap().get("out").unwrap();
    let path = out.as_scalar().unwrap().scalar.as_path().unwrap();
    assert!(path.raw().starts_with(bed.workspace.jobs_dir().raw()));
    assert!(path.raw().ends_with("/out"));
}
