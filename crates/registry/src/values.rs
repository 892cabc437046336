// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Value construction from parameter JSON
//!
//! Builds a [`Value`] from the `$type`/`$task`/`$value`/`$job` document
//! convention. Unknown types register as placeholders so documents can
//! reference types defined later.

use crate::registry::{Registry, RegistryError};
use serde_json::Value as Json;
use xpm_core::{
    HostPath, JobToken, MapValue, Scalar, TypeKind, Typename, Value, ValueError, KEY_JOB, KEY_TASK,
    KEY_TYPE, KEY_VALUE,
};

impl Registry {
    /// Build a value from parameter JSON.
    pub fn build(&mut self, doc: &Json) -> Result<Value, RegistryError> {
        match doc {
            Json::Object(object) => {
                let declared = match object.get(KEY_TYPE) {
                    Some(Json::String(name)) => {
                        let name = Typename::new(name.clone());
                        self.ensure_type(&name);
                        Some(name)
                    }
                    Some(other) => {
                        return Err(RegistryError::Document(format!(
                            "{} must be a string, got {}",
                            KEY_TYPE, other
                        )))
                    }
                    None => None,
                };

                // Unknown reserved keys are rejected before anything else,
                // including the wrapped-value short circuit below.
                for key in object.keys() {
                    if key.starts_with('$')
                        && !matches!(key.as_str(), KEY_TYPE | KEY_TASK | KEY_VALUE | KEY_JOB)
                    {
                        return Err(ValueError::Argument(format!(
                            "cannot directly set reserved key {}",
                            key
                        ))
                        .into());
                    }
                }

                // A wrapped simple value: use it and discard the rest.
                if let Some(wrapped) = object.get(KEY_VALUE) {
                    return self.build_wrapped(wrapped, declared.as_ref());
                }

                let mut map = MapValue {
                    type_name: declared.unwrap_or_else(|| Typename::new("any")),
                    ..MapValue::default()
                };

                if let Some(task) = object.get(KEY_TASK) {
                    let name = task.as_str().ok_or_else(|| {
                        RegistryError::Document(format!("{} must be a string", KEY_TASK))
                    })?;
                    map.task = Some(Typename::new(name));
                }
                if let Some(job) = object.get(KEY_JOB) {
                    map.job = Some(job_token(job)?);
                }

                // Entries insert in sorted key order so the digest is
                // insensitive to the document's key order.
                let mut keys: Vec<&String> = object.keys().collect();
                keys.sort();
                for key in keys {
                    let key = key.as_str();
                    // reserved keys were consumed (or rejected) above
                    if key.starts_with('$') {
                        continue;
                    }
                    let Some(child) = object.get(key) else {
                        continue;
                    };
                    let value = self.build(child)?;
                    self.set_entry(&mut map, key, value)?;
                }
                Ok(Value::Map(map))
            }
            Json::Array(items) => {
                let mut array = Value::array();
                if let Value::Array(inner) = &mut array {
                    for item in items {
                        inner.push(self.build(item)?)?;
                    }
                }
                Ok(array)
            }
            other => Ok(Value::scalar(Scalar::from_json(other)?)),
        }
    }

    /// Build the payload of a `$value` key, casting to the declared type
    /// where the hierarchy does not already accept it.
    fn build_wrapped(
        &mut self,
        wrapped: &Json,
        declared: Option<&Typename>,
    ) -> Result<Value, RegistryError> {
        let value = match wrapped {
            Json::Array(items) => {
                let mut array = Value::array();
                if let Value::Array(inner) = &mut array {
                    for item in items {
                        inner.push(self.build(item)?)?;
                    }
                }
                array
            }
            other => Value::scalar(Scalar::from_json(other)?),
        };

        let Some(declared) = declared else {
            return Ok(value);
        };
        if value.is_null() {
            return Ok(value);
        }
        let actual = self.value_type(&value);
        if self.accepts(declared, &actual) {
            return Ok(value);
        }

        // Last resort: a lossless scalar cast to the declared simple type.
        tracing::debug!(from = %actual, to = %declared, "casting wrapped value");
        let kind = match self.get_type(declared).map(|t| t.kind) {
            Some(TypeKind::Simple(kind)) => Some(kind),
            _ => None,
        };
        let cast = kind.and_then(|kind| {
            value
                .as_scalar()
                .and_then(|s| s.scalar.cast(kind).ok().map(Value::scalar))
        });
        cast.ok_or_else(|| {
            RegistryError::Document(format!(
                "incompatible types: {} (given) cannot be converted to {} (expected)",
                actual, declared
            ))
        })
    }
}

/// Parse a `$job` tag: a locator string or `{"locator": ...}` metadata.
fn job_token(doc: &Json) -> Result<JobToken, RegistryError> {
    let locator = match doc {
        Json::String(s) => s.clone(),
        Json::Object(object) => match object.get("locator") {
            Some(Json::String(s)) => s.clone(),
            _ => {
                return Err(RegistryError::Document(
                    "$job metadata must carry a locator".to_string(),
                ))
            }
        },
        _ => {
            return Err(RegistryError::Document(format!(
                "invalid $job metadata: {}",
                doc
            )))
        }
    };
    Ok(JobToken {
        locator: HostPath::local(locator),
    })
}

#[cfg(test)]
#[path = "values_tests.rs"]
mod tests;
