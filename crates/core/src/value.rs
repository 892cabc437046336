// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed parameter value tree
//!
//! A value is a scalar, a map or an array, tagged with lifecycle flags.
//! Maps carry their declared type, an optional producing task and an
//! optional back-reference to the job that produced them. The job
//! back-reference is indirected through the job's locator so the value
//! tree never owns engine objects.

use crate::error::ValueError;
use crate::path::HostPath;
use crate::scalar::Scalar;
use crate::typename::Typename;
use indexmap::IndexMap;
use serde_json::json;

/// Lifecycle flags of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// The value is frozen; mutation fails.
    Sealed,
    /// The value was filled in from a default (excluded from the digest).
    Default,
    /// Validation already ran on this subtree.
    Validated,
    /// Generation already ran on this subtree.
    Generated,
    /// Explicitly excluded from the digest.
    Ignore,
}

impl Flag {
    fn bit(self) -> u8 {
        match self {
            Flag::Sealed => 1,
            Flag::Default => 2,
            Flag::Validated => 4,
            Flag::Generated => 8,
            Flag::Ignore => 16,
        }
    }
}

/// Bitset over [`Flag`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        if value {
            self.0 |= flag.bit();
        } else {
            self.0 &= !flag.bit();
        }
    }
}

/// Locator-keyed reference to the job that produced a value.
///
/// Resolution back to a live job goes through the workspace's job table;
/// a token reconstructed from a `$job` tag may refer to a job the current
/// process never submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobToken {
    pub locator: HostPath,
}

/// A scalar leaf.
#[derive(Debug, Clone, Default)]
pub struct ScalarValue {
    pub scalar: Scalar,
    pub flags: Flags,
}

/// A map node with a declared type.
#[derive(Debug, Clone)]
pub struct MapValue {
    pub type_name: Typename,
    pub entries: IndexMap<String, Value>,
    pub task: Option<Typename>,
    pub job: Option<JobToken>,
    pub flags: Flags,
}

impl Default for MapValue {
    fn default() -> Self {
        Self {
            type_name: Typename::new("any"),
            entries: IndexMap::new(),
            task: None,
            job: None,
            flags: Flags::new(),
        }
    }
}

impl MapValue {
    /// Insert an entry, honoring sealing and reserved keys.
    pub fn insert(&mut self, key: &str, value: Value) -> Result<Option<Value>, ValueError> {
        if self.flags.get(Flag::Sealed) {
            return Err(ValueError::Sealed);
        }
        if key.starts_with('$') {
            return Err(ValueError::Argument(format!(
                "cannot directly set reserved key {}",
                key
            )));
        }
        Ok(self.entries.insert(key.to_string(), value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// An ordered array node.
#[derive(Debug, Clone, Default)]
pub struct ArrayValue {
    pub items: Vec<Value>,
    pub flags: Flags,
}

impl ArrayValue {
    pub fn push(&mut self, value: Value) -> Result<(), ValueError> {
        if self.flags.get(Flag::Sealed) {
            return Err(ValueError::Sealed);
        }
        self.items.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A parameter value: scalar, map or array.
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(ScalarValue),
    Map(MapValue),
    Array(ArrayValue),
}

impl Value {
    pub fn scalar(scalar: Scalar) -> Value {
        Value::Scalar(ScalarValue {
            scalar,
            flags: Flags::new(),
        })
    }

    pub fn map() -> Value {
        Value::Map(MapValue::default())
    }

    pub fn array() -> Value {
        Value::Array(ArrayValue::default())
    }

    pub fn flags(&self) -> Flags {
        match self {
            Value::Scalar(v) => v.flags,
            Value::Map(v) => v.flags,
            Value::Array(v) => v.flags,
        }
    }

    pub fn flags_mut(&mut self) -> &mut Flags {
        match self {
            Value::Scalar(v) => &mut v.flags,
            Value::Map(v) => &mut v.flags,
            Value::Array(v) => &mut v.flags,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.flags().get(Flag::Sealed)
    }

    /// True when this value is `None` (or carries no scalar at all).
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Scalar(ScalarValue {
                scalar: Scalar::None | Scalar::Unset,
                ..
            })
        )
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Value::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapValue> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value is transparent to the digest: explicitly ignored,
    /// filled from a default, or of an ignorable type (paths).
    pub fn can_ignore(&self) -> bool {
        let flags = self.flags();
        if flags.get(Flag::Ignore) || flags.get(Flag::Default) {
            return true;
        }
        matches!(
            self,
            Value::Scalar(ScalarValue {
                scalar: Scalar::Path(_),
                ..
            })
        )
    }

    /// Seal the subtree, post-order. Idempotent.
    pub fn seal(&mut self) {
        if self.is_sealed() {
            return;
        }
        match self {
            Value::Scalar(_) => {}
            Value::Map(map) => {
                for child in map.entries.values_mut() {
                    child.seal();
                }
            }
            Value::Array(array) => {
                for child in array.items.iter_mut() {
                    child.seal();
                }
            }
        }
        self.flags_mut().set(Flag::Sealed, true);
    }

    /// Structural equality, ignoring flags and job back-references.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a.scalar == b.scalar,
            (Value::Array(a), Value::Array(b)) => {
                a.items.len() == b.items.len()
                    && a.items.iter().zip(&b.items).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.type_name == b.type_name
                    && a.task == b.task
                    && a.entries.len() == b.entries.len()
                    && a.entries
                        .iter()
                        .all(|(k, v)| b.entries.get(k).is_some_and(|w| v.equals(w)))
            }
            _ => false,
        }
    }

    /// Visit each direct child.
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Value)) {
        match self {
            Value::Scalar(_) => {}
            Value::Map(map) => {
                for child in map.entries.values() {
                    f(child);
                }
            }
            Value::Array(array) => {
                for child in &array.items {
                    f(child);
                }
            }
        }
    }

    /// Plain JSON rendering (no parameter-file conventions).
    ///
    /// An empty, untyped, task-less map renders as `null`.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        match self {
            Value::Scalar(v) => v.scalar.to_json(),
            Value::Array(v) => {
                let mut items = Vec::with_capacity(v.items.len());
                for item in &v.items {
                    items.push(item.to_json()?);
                }
                Ok(serde_json::Value::Array(items))
            }
            Value::Map(map) => {
                let untyped = map.type_name.as_str() == "any";
                if map.entries.is_empty() && map.task.is_none() && untyped {
                    return Ok(serde_json::Value::Null);
                }
                let mut object = serde_json::Map::new();
                if !untyped {
                    object.insert(crate::KEY_TYPE.to_string(), json!(map.type_name.as_str()));
                }
                if let Some(task) = &map.task {
                    object.insert(crate::KEY_TASK.to_string(), json!(task.as_str()));
                }
                for (key, child) in &map.entries {
                    object.insert(key.clone(), child.to_json()?);
                }
                Ok(serde_json::Value::Object(object))
            }
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::scalar(scalar)
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
