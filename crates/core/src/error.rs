// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the value model

use std::fmt;
use thiserror::Error;

/// Errors raised by value construction, mutation and validation
#[derive(Debug, Error)]
pub enum ValueError {
    /// Bad user input: unknown key, reserved key, bad parameter path.
    #[error("argument error: {0}")]
    Argument(String),
    /// Validation failure, carrying the dotted path to the offending argument.
    #[error("error with parameter {}: {message}", DottedPath(path))]
    Parameter {
        /// Path segments, innermost first (pushed while unwinding).
        path: Vec<String>,
        message: String,
    },
    /// Mutation of a sealed value.
    #[error("value is sealed: cannot modify")]
    Sealed,
    /// Invalid scalar conversion.
    #[error("cast error: {0}")]
    Cast(String),
}

impl ValueError {
    /// Create a parameter error with an empty path.
    pub fn parameter(message: impl Into<String>) -> Self {
        ValueError::Parameter {
            path: Vec::new(),
            message: message.into(),
        }
    }

    /// Prefix a path segment onto a parameter error; other kinds pass through.
    ///
    /// Segments are pushed innermost-first while the validation walk unwinds,
    /// so the rendered path reads outermost-first.
    pub fn at(self, segment: impl Into<String>) -> Self {
        match self {
            ValueError::Parameter { mut path, message } => {
                path.push(segment.into());
                ValueError::Parameter { path, message }
            }
            other => other,
        }
    }
}

/// Renders a parameter path as `a.b[2].c` (segments stored innermost-first).
struct DottedPath<'a>(&'a [String]);

impl fmt::Display for DottedPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.0.iter().rev() {
            if !first && !segment.starts_with('[') {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
