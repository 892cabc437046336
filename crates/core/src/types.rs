// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The type schema: named types with typed arguments
//!
//! Types form a single-inheritance hierarchy rooted at `any`. Parent and
//! argument types are referenced by name and resolved through the registry,
//! so a type defined after its first reference (a placeholder) is promoted
//! in place without invalidating earlier references.

use crate::scalar::ScalarKind;
use crate::typename::Typename;
use crate::value::Value;
use indexmap::IndexMap;

/// Structural kind of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// The hierarchy root.
    Any,
    /// A predefined scalar leaf.
    Simple(ScalarKind),
    /// A user-defined object type.
    Object,
    /// An array over a component type.
    Array(Typename),
}

/// A strategy computing a missing argument value at generation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    /// Yields `jobs_dir / task / unique-id / name?` as a path scalar.
    Path { name: String },
}

/// A declared argument of a type.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub type_name: Typename,
    pub required: bool,
    /// Excluded from the digest.
    pub ignored: bool,
    pub default_value: Option<Value>,
    pub constant: Option<Value>,
    pub generator: Option<Generator>,
    pub help: Option<String>,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Typename::new("any"),
            required: true,
            ignored: false,
            default_value: None,
            constant: None,
            generator: None,
            help: None,
        }
    }

    /// Setting a default makes the argument optional.
    pub fn set_default(&mut self, value: Value) {
        self.default_value = Some(value);
        self.required = false;
    }
}

/// A named node in the type hierarchy.
#[derive(Debug, Clone)]
pub struct Type {
    pub name: Typename,
    pub parent: Option<Typename>,
    pub kind: TypeKind,
    pub arguments: IndexMap<String, Argument>,
    pub properties: IndexMap<String, Value>,
    pub description: Option<String>,
    /// Referenced before being defined; promoted in place on definition.
    pub placeholder: bool,
    /// Installed at registry construction, not loadable from documents.
    pub predefined: bool,
}

impl Type {
    /// A user-defined object type descending from `any`.
    pub fn object(name: Typename) -> Self {
        Self {
            name,
            parent: None,
            kind: TypeKind::Object,
            arguments: IndexMap::new(),
            properties: IndexMap::new(),
            description: None,
            placeholder: false,
            predefined: false,
        }
    }

    /// A placeholder for a type referenced before its definition.
    pub fn placeholder(name: Typename) -> Self {
        let mut t = Self::object(name);
        t.placeholder = true;
        t
    }

    /// The `any` root.
    pub fn any() -> Self {
        Self {
            name: Typename::new("any"),
            parent: None,
            kind: TypeKind::Any,
            arguments: IndexMap::new(),
            properties: IndexMap::new(),
            description: None,
            placeholder: false,
            predefined: true,
        }
    }

    /// A predefined scalar leaf.
    pub fn simple(kind: ScalarKind) -> Self {
        Self {
            name: kind.type_name(),
            parent: None,
            kind: TypeKind::Simple(kind),
            arguments: IndexMap::new(),
            properties: IndexMap::new(),
            description: None,
            placeholder: false,
            predefined: true,
        }
    }

    /// The array type over a component.
    pub fn array(component: Typename) -> Self {
        Self {
            name: component.array(),
            parent: None,
            kind: TypeKind::Array(component),
            arguments: IndexMap::new(),
            properties: IndexMap::new(),
            description: None,
            placeholder: false,
            predefined: false,
        }
    }

    /// Whether values of this type are digest-transparent (paths only).
    pub fn can_ignore(&self) -> bool {
        matches!(self.kind, TypeKind::Simple(ScalarKind::Path))
    }

    pub fn add_argument(&mut self, argument: Argument) {
        self.arguments.insert(argument.name.clone(), argument);
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.get(name)
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
