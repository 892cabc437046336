// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry: named types, tasks, and the hierarchy relations

use crate::task::Task;
use indexmap::IndexMap;
use std::collections::HashSet;
use thiserror::Error;
use xpm_core::{ScalarKind, Type, Typename, Value, ValueError};

/// Errors from registry loading and value construction
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("invalid document: {0}")]
    Document(String),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Registry of types and tasks.
///
/// Predefined types are installed at construction. Types referenced before
/// their definition are stored as placeholders and promoted in place under
/// the same key, so name-based references stay valid.
pub struct Registry {
    pub(crate) types: IndexMap<Typename, Type>,
    pub(crate) tasks: IndexMap<Typename, Task>,
    /// Explicit (expected, actual) pairs accepted beyond the hierarchy.
    castable: HashSet<(Typename, Typename)>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut types = IndexMap::new();
        for t in [
            Type::any(),
            Type::simple(ScalarKind::Boolean),
            Type::simple(ScalarKind::Integer),
            Type::simple(ScalarKind::Real),
            Type::simple(ScalarKind::String),
            Type::simple(ScalarKind::Path),
        ] {
            types.insert(t.name.clone(), t);
        }
        let mut castable = HashSet::new();
        castable.insert((Typename::new("real"), Typename::new("integer")));
        Self {
            types,
            tasks: IndexMap::new(),
            castable,
        }
    }

    pub fn add_type(&mut self, t: Type) {
        self.types.insert(t.name.clone(), t);
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.insert(task.identifier.clone(), task);
    }

    pub fn get_task(&self, identifier: &Typename) -> Option<&Task> {
        self.tasks.get(identifier)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Exact lookup, no array-suffix resolution.
    pub(crate) fn lookup(&self, name: &Typename) -> Option<&Type> {
        self.types.get(name)
    }

    /// Resolve a type by name; trailing `[]` suffixes resolve lazily to
    /// array types over the component.
    pub fn get_type(&self, name: &Typename) -> Option<Type> {
        if let Some(component) = name.component() {
            return self.get_type(&component).map(|c| Type::array(c.name));
        }
        self.lookup(name).cloned()
    }

    /// Register a placeholder for `name` unless it is already known.
    pub(crate) fn ensure_type(&mut self, name: &Typename) {
        if name.is_array() {
            if let Some(component) = name.component() {
                self.ensure_type(&component);
            }
            return;
        }
        if !self.types.contains_key(name) {
            tracing::warn!(type_name = %name, "unknown type, registering placeholder");
            self.types.insert(name.clone(), Type::placeholder(name.clone()));
        }
    }

    /// Ancestor chain of a type name, starting with the name itself.
    ///
    /// Array names chain through their component's ancestors; unknown
    /// parents terminate the chain.
    pub fn ancestors(&self, name: &Typename) -> Vec<Typename> {
        if let Some(component) = name.component() {
            return self
                .ancestors(&component)
                .into_iter()
                .map(|n| n.array())
                .collect();
        }
        let mut chain = vec![name.clone()];
        let mut current = name.clone();
        while let Some(parent) = self.lookup(&current).and_then(|t| t.parent.clone()) {
            if chain.contains(&parent) {
                tracing::warn!(type_name = %name, "cycle in type hierarchy");
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Whether a value of type `actual` is acceptable where `expected` is
    /// declared: `expected` is `any`, `actual` descends from `expected`, or
    /// the pair is explicitly castable.
    pub fn accepts(&self, expected: &Typename, actual: &Typename) -> bool {
        if expected.as_str() == "any" {
            return true;
        }
        if self.ancestors(actual).contains(expected) {
            return true;
        }
        self.castable
            .contains(&(expected.clone(), actual.clone()))
    }

    /// Lowest common ancestor of two type names, `any` when unrelated.
    pub fn lca(&self, a: &Typename, b: &Typename) -> Typename {
        match (a.component(), b.component()) {
            (Some(ca), Some(cb)) => return self.lca(&ca, &cb).array(),
            (None, None) => {}
            _ => return Typename::new("any"),
        }
        let ours = self.ancestors(a);
        for candidate in self.ancestors(b) {
            if ours.contains(&candidate) {
                return candidate;
            }
        }
        Typename::new("any")
    }

    /// The type of a value. Array types derive lazily from the LCA of their
    /// element types, `any[]` when empty.
    pub fn value_type(&self, value: &Value) -> Typename {
        match value {
            Value::Scalar(v) => v.scalar.type_name(),
            Value::Map(v) => v.type_name.clone(),
            Value::Array(v) => {
                let mut component: Option<Typename> = None;
                for item in &v.items {
                    let ty = self.value_type(item);
                    component = Some(match component {
                        None => ty,
                        Some(current) => self.lca(&current, &ty),
                    });
                }
                component.unwrap_or_else(|| Typename::new("any")).array()
            }
        }
    }

    /// Look up an argument declared on a type or any of its ancestors.
    pub fn find_argument(&self, ty: &Typename, key: &str) -> Option<&xpm_core::Argument> {
        for name in self.ancestors(ty) {
            if let Some(arg) = self.lookup(&name).and_then(|t| t.argument(key)) {
                return Some(arg);
            }
        }
        None
    }

    /// All arguments declared across the hierarchy, own type first.
    pub fn all_arguments(&self, ty: &Typename) -> Vec<xpm_core::Argument> {
        let mut out = Vec::new();
        for name in self.ancestors(ty) {
            if let Some(t) = self.lookup(&name) {
                out.extend(t.arguments.values().cloned());
            }
        }
        out
    }

    /// Registry-aware map insertion.
    ///
    /// Scalars are cast to the declared argument type where the hierarchy
    /// does not already accept them (a bare string for a path argument).
    /// The entry is flagged DEFAULT when it equals the declared default,
    /// IGNORE when the argument is declared ignored.
    pub fn set_entry(
        &self,
        map: &mut xpm_core::MapValue,
        key: &str,
        mut value: Value,
    ) -> Result<(), ValueError> {
        if let Some(arg) = self.find_argument(&map.type_name, key) {
            let declared_kind = match self.get_type(&arg.type_name).map(|t| t.kind) {
                Some(xpm_core::TypeKind::Simple(kind)) => Some(kind),
                _ => None,
            };
            if let (Some(kind), Value::Scalar(scalar)) = (declared_kind, &value) {
                let actual = scalar.scalar.type_name();
                if !scalar.scalar.is_null() && !self.accepts(&arg.type_name, &actual) {
                    // An impossible cast is left for validation to report.
                    if let Ok(cast) = scalar.scalar.cast(kind) {
                        value = Value::scalar(cast);
                    }
                }
            }
            if let Some(default) = &arg.default_value {
                if default.equals(&value) {
                    value.flags_mut().set(xpm_core::Flag::Default, true);
                }
            }
            if arg.ignored {
                value.flags_mut().set(xpm_core::Flag::Ignore, true);
            }
        }
        map.insert(key, value)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
