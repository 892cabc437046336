// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scalar values and their conversions

use crate::error::ValueError;
use crate::path::HostPath;
use crate::typename::Typename;
use crate::{KEY_TYPE, KEY_VALUE};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static RE_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static RE_REAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(0|[1-9]\d*)(\.\d*)?([eE][+-]?\d+)?$")
        .expect("constant regex pattern is valid")
});

/// The kind of a scalar, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Unset,
    None,
    Integer,
    Real,
    Boolean,
    String,
    Path,
}

impl ScalarKind {
    /// Predefined type name for values of this kind.
    ///
    /// Unset and none values carry no information and type as `any`.
    pub fn type_name(self) -> Typename {
        match self {
            ScalarKind::Unset | ScalarKind::None => Typename::new("any"),
            ScalarKind::Integer => Typename::new("integer"),
            ScalarKind::Real => Typename::new("real"),
            ScalarKind::Boolean => Typename::new("boolean"),
            ScalarKind::String => Typename::new("string"),
            ScalarKind::Path => Typename::new("path"),
        }
    }

    /// Stable byte tag used by the digest stream.
    pub(crate) fn digest_byte(self) -> u8 {
        match self {
            ScalarKind::Unset => 0,
            ScalarKind::None => 1,
            ScalarKind::Integer => 2,
            ScalarKind::Real => 3,
            ScalarKind::Boolean => 4,
            ScalarKind::String => 5,
            ScalarKind::Path => 6,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Unset => "unset",
            ScalarKind::None => "none",
            ScalarKind::Integer => "integer",
            ScalarKind::Real => "real",
            ScalarKind::Boolean => "boolean",
            ScalarKind::String => "string",
            ScalarKind::Path => "path",
        };
        write!(f, "{}", name)
    }
}

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Unset,
    None,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    Path(HostPath),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Unset => ScalarKind::Unset,
            Scalar::None => ScalarKind::None,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Real(_) => ScalarKind::Real,
            Scalar::Boolean(_) => ScalarKind::Boolean,
            Scalar::String(_) => ScalarKind::String,
            Scalar::Path(_) => ScalarKind::Path,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Scalar::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::None)
    }

    /// Type name of the scalar.
    pub fn type_name(&self) -> Typename {
        self.kind().type_name()
    }

    /// Convert to an integer. Reals convert only when integral-valued.
    pub fn as_integer(&self) -> Result<i64, ValueError> {
        match self {
            Scalar::Integer(i) => Ok(*i),
            Scalar::Boolean(b) => Ok(i64::from(*b)),
            Scalar::Real(r) if r.trunc() == *r => Ok(*r as i64),
            Scalar::Real(r) => Err(ValueError::Cast(format!(
                "cannot convert real {} to integer",
                r
            ))),
            other => Err(ValueError::Cast(format!(
                "cannot convert {} to integer",
                other.kind()
            ))),
        }
    }

    /// Convert to a real. Integers and booleans widen losslessly.
    pub fn as_real(&self) -> Result<f64, ValueError> {
        match self {
            Scalar::Real(r) => Ok(*r),
            Scalar::Integer(i) => Ok(*i as f64),
            Scalar::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(ValueError::Cast(format!(
                "cannot convert {} to real",
                other.kind()
            ))),
        }
    }

    pub fn as_boolean(&self) -> Result<bool, ValueError> {
        match self {
            Scalar::Boolean(b) => Ok(*b),
            Scalar::Integer(0) => Ok(false),
            Scalar::Integer(1) => Ok(true),
            other => Err(ValueError::Cast(format!(
                "cannot convert {} to boolean",
                other.kind()
            ))),
        }
    }

    pub fn as_string(&self) -> Result<String, ValueError> {
        match self {
            Scalar::String(s) => Ok(s.clone()),
            Scalar::Integer(i) => Ok(i.to_string()),
            Scalar::Real(r) => Ok(r.to_string()),
            Scalar::Boolean(b) => Ok(b.to_string()),
            Scalar::Path(p) => Ok(p.to_string()),
            other => Err(ValueError::Cast(format!(
                "cannot convert {} to string",
                other.kind()
            ))),
        }
    }

    pub fn as_path(&self) -> Result<HostPath, ValueError> {
        match self {
            Scalar::Path(p) => Ok(p.clone()),
            Scalar::String(s) => Ok(HostPath::local(s.clone())),
            other => Err(ValueError::Cast(format!(
                "cannot convert {} to path",
                other.kind()
            ))),
        }
    }

    /// Cast to another scalar kind, where lossless.
    pub fn cast(&self, kind: ScalarKind) -> Result<Scalar, ValueError> {
        match kind {
            ScalarKind::Integer => Ok(Scalar::Integer(self.as_integer()?)),
            ScalarKind::Real => Ok(Scalar::Real(self.as_real()?)),
            ScalarKind::Boolean => Ok(Scalar::Boolean(self.as_boolean()?)),
            ScalarKind::String => Ok(Scalar::String(self.as_string()?)),
            ScalarKind::Path => Ok(Scalar::Path(self.as_path()?)),
            ScalarKind::None | ScalarKind::Unset => Ok(self.clone()),
        }
    }

    /// Parse a string under a declared-kind hint.
    pub fn parse(s: &str, kind: ScalarKind) -> Result<Scalar, ValueError> {
        match kind {
            ScalarKind::String => Ok(Scalar::String(s.to_string())),
            ScalarKind::Path => Ok(Scalar::Path(HostPath::local(s))),
            ScalarKind::Integer => {
                if RE_INTEGER.is_match(s) {
                    s.parse::<i64>()
                        .map(Scalar::Integer)
                        .map_err(|e| ValueError::Cast(format!("{}: {}", s, e)))
                } else {
                    Err(ValueError::Argument(format!(
                        "{} cannot be interpreted as an integer",
                        s
                    )))
                }
            }
            ScalarKind::Real => {
                if RE_REAL.is_match(s) {
                    s.parse::<f64>()
                        .map(Scalar::Real)
                        .map_err(|e| ValueError::Cast(format!("{}: {}", s, e)))
                } else {
                    Err(ValueError::Argument(format!(
                        "{} cannot be interpreted as a real",
                        s
                    )))
                }
            }
            ScalarKind::Boolean => match s {
                "Y" | "Yes" | "true" | "ON" => Ok(Scalar::Boolean(true)),
                "N" | "No" | "false" | "OFF" => Ok(Scalar::Boolean(false)),
                _ => Err(ValueError::Argument(format!(
                    "{} cannot be interpreted as a boolean",
                    s
                ))),
            },
            ScalarKind::None | ScalarKind::Unset => Err(ValueError::Argument(format!(
                "cannot parse {} without a scalar type",
                s
            ))),
        }
    }

    /// Build from a JSON value. Integral floats load as integers.
    pub fn from_json(value: &serde_json::Value) -> Result<Scalar, ValueError> {
        use serde_json::Value as Json;
        match value {
            Json::Null => Ok(Scalar::None),
            Json::Bool(b) => Ok(Scalar::Boolean(*b)),
            Json::String(s) => Ok(Scalar::String(s.clone())),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Scalar::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    if f.trunc() == f && f.abs() < i64::MAX as f64 {
                        Ok(Scalar::Integer(f as i64))
                    } else {
                        Ok(Scalar::Real(f))
                    }
                } else {
                    Err(ValueError::Cast(format!("unrepresentable number {}", n)))
                }
            }
            other => Err(ValueError::Argument(format!(
                "cannot build a scalar from JSON {}",
                other
            ))),
        }
    }

    /// Render as JSON. Paths keep their type tag; unset values have none.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        use serde_json::json;
        match self {
            Scalar::None => Ok(serde_json::Value::Null),
            Scalar::Integer(i) => Ok(json!(i)),
            Scalar::Real(r) => Ok(json!(r)),
            Scalar::Boolean(b) => Ok(json!(b)),
            Scalar::String(s) => Ok(json!(s)),
            Scalar::Path(p) => Ok(json!({
                KEY_TYPE: "path",
                KEY_VALUE: p.to_string(),
            })),
            Scalar::Unset => Err(ValueError::Cast("unset value has no JSON form".to_string())),
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Unset
    }
}

impl fmt::Display for Scalar {
    /// Unset and none values render as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_string() {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "scalar_tests.rs"]
mod tests;
