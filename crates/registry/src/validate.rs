// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema validation of values
//!
//! Checks a value against its declared type and all ancestors. Errors carry
//! a dotted argument path; array elements contribute `[i]` segments. The
//! VALIDATED flag makes the walk idempotent.

use crate::registry::Registry;
use xpm_core::{Flag, Value, ValueError};

impl Registry {
    /// Validate a value subtree against its declared types.
    ///
    /// A stored `None` counts as missing; a missing required argument is
    /// tolerated when a generator will fill it.
    pub fn validate(&self, value: &mut Value) -> Result<(), ValueError> {
        if value.flags().get(Flag::Validated) {
            return Ok(());
        }
        match value {
            Value::Scalar(_) => {}
            Value::Array(array) => {
                for (i, item) in array.items.iter_mut().enumerate() {
                    self.validate(item).map_err(|e| e.at(format!("[{}]", i)))?;
                }
            }
            Value::Map(map) => {
                let ty = map.type_name.clone();
                for arg in self.all_arguments(&ty) {
                    match map.entries.get_mut(&arg.name) {
                        None => {
                            if arg.required && arg.generator.is_none() && arg.constant.is_none() {
                                return Err(ValueError::parameter(format!(
                                    "was required but not given for {}",
                                    ty
                                ))
                                .at(arg.name.as_str()));
                            }
                        }
                        Some(stored) if stored.is_null() => {
                            if arg.required && arg.generator.is_none() && arg.constant.is_none() {
                                return Err(ValueError::parameter(format!(
                                    "was required but not given for {}",
                                    ty
                                ))
                                .at(arg.name.as_str()));
                            }
                        }
                        Some(stored) => {
                            let actual = self.value_type(stored);
                            if !self.accepts(&arg.type_name, &actual) {
                                return Err(ValueError::parameter(format!(
                                    "type is {}, but requested type was {}",
                                    actual, arg.type_name
                                ))
                                .at(arg.name.as_str()));
                            }
                            if let Some(constant) = &arg.constant {
                                if !constant.equals(stored) {
                                    return Err(ValueError::parameter(
                                        "does not match the declared constant",
                                    )
                                    .at(arg.name.as_str()));
                                }
                            }
                            self.validate(stored).map_err(|e| e.at(arg.name.as_str()))?;
                        }
                    }
                }
            }
        }
        value.flags_mut().set(Flag::Validated, true);
        Ok(())
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
