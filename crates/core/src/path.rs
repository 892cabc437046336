// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-qualified paths
//!
//! A path is a `(share, path)` pair; an empty share denotes the local
//! filesystem. Paths are textual: `.` and `..` components are preserved,
//! never normalized.

use crate::error::ValueError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A path on a (possibly remote) share.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPath {
    share: String,
    path: String,
}

impl HostPath {
    /// A path on a named share.
    pub fn new(share: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            share: share.into(),
            path: path.into(),
        }
    }

    /// A path on the local filesystem.
    pub fn local(path: impl Into<String>) -> Self {
        Self::new("", path)
    }

    pub fn share(&self) -> &str {
        &self.share
    }

    /// The raw path component, independent of the share.
    pub fn raw(&self) -> &str {
        &self.path
    }

    pub fn is_local(&self) -> bool {
        self.share.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// The local filesystem path; errors when the share is non-empty.
    pub fn local_path(&self) -> Result<&str, ValueError> {
        if !self.is_local() {
            return Err(ValueError::Argument(format!(
                "path {} is not local",
                self
            )));
        }
        Ok(&self.path)
    }

    /// Parent path; the root and bare names are their own parent.
    pub fn parent(&self) -> HostPath {
        match self.path.rfind('/') {
            Some(0) => HostPath::new(self.share.clone(), "/"),
            Some(i) => HostPath::new(self.share.clone(), &self.path[..i]),
            None => self.clone(),
        }
    }

    /// Final path component.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[i + 1..],
            None => &self.path,
        }
    }

    /// Append components, POSIX-style.
    pub fn resolve(&self, components: &[&str]) -> HostPath {
        let mut path = if self.path == "/" {
            String::new()
        } else {
            self.path.clone()
        };
        for component in components {
            path.push('/');
            path.push_str(component);
        }
        HostPath::new(self.share.clone(), path)
    }

    /// Relative traversal from `base` to `self`.
    ///
    /// Both paths must be absolute; on a different share, the path is
    /// returned as-is.
    pub fn relative_to(&self, base: &HostPath) -> Result<HostPath, ValueError> {
        if !self.is_absolute() || !base.is_absolute() {
            return Err(ValueError::Argument(
                "cannot relativize with relative paths".to_string(),
            ));
        }
        if self.share != base.share {
            return Ok(self.clone());
        }

        let ours: Vec<&str> = self.path.split('/').filter(|c| !c.is_empty()).collect();
        let theirs: Vec<&str> = base.path.split('/').filter(|c| !c.is_empty()).collect();
        let common = ours
            .iter()
            .zip(theirs.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<&str> = Vec::new();
        for _ in common..theirs.len() {
            segments.push("..");
        }
        segments.extend(&ours[common..]);
        if segments.is_empty() {
            segments.push(".");
        }
        Ok(HostPath::local(segments.join("/")))
    }
}

impl fmt::Display for HostPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.share.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}:{}", self.share, self.path)
        }
    }
}

impl From<&str> for HostPath {
    fn from(path: &str) -> Self {
        HostPath::local(path)
    }
}

impl Serialize for HostPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HostPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        // Paths may legitimately contain ':'; only a share prefix before the
        // first '/' is split off.
        match s.find(':') {
            Some(i) if !s[..i].contains('/') && s[i + 1..].starts_with('/') => {
                Ok(HostPath::new(&s[..i], &s[i + 1..]))
            }
            _ => Ok(HostPath::local(s)),
        }
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
