// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dotted type identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dotted identifier naming a type or a task (e.g. `foo.bar.Baz`).
///
/// Equality and hashing are over the full dotted form. Array types are
/// spelled with a trailing `[]` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Typename(String);

impl Typename {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Child name in this namespace: `parent.local`.
    pub fn child(&self, local: &str) -> Typename {
        Typename(format!("{}.{}", self.0, local))
    }

    /// The array type name: `name[]`.
    pub fn array(&self) -> Typename {
        Typename(format!("{}[]", self.0))
    }

    /// Segment after the last dot (the full name when there is none).
    pub fn local_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// True for `name[]` spellings.
    pub fn is_array(&self) -> bool {
        self.0.ends_with("[]")
    }

    /// Strip one trailing `[]`, if present.
    pub fn component(&self) -> Option<Typename> {
        self.0
            .strip_suffix("[]")
            .map(|base| Typename(base.to_string()))
    }
}

impl fmt::Display for Typename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Typename {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Typename {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
#[path = "typename_tests.rs"]
mod tests;
