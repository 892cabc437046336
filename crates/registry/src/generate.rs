// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Value generation: defaults, constants and path generators
//!
//! Fills absent arguments before sealing. Generated and default entries are
//! DEFAULT-flagged so they stay transparent to the digest. The GENERATED
//! flag makes the walk idempotent; the owned value tree cannot alias, so no
//! explicit cycle stack is needed.

use crate::registry::Registry;
use xpm_core::{digest, Flag, Generator, HostPath, Scalar, Typename, Value, ValueError};

/// Context for generators: where jobs live and which submission is being
/// configured.
///
/// The root identifier is computed once up front; everything generation
/// inserts is digest-transparent, so it cannot drift during the walk.
#[derive(Debug, Clone)]
pub struct GeneratorContext {
    pub jobs_dir: HostPath,
    pub task: Option<Typename>,
    pub root_identifier: String,
}

impl GeneratorContext {
    /// Context for generating within `root`, storing jobs under `jobs_dir`.
    pub fn for_root(jobs_dir: HostPath, root: &Value) -> Self {
        let task = root.as_map().and_then(|map| map.task.clone());
        Self {
            jobs_dir,
            task,
            root_identifier: digest::unique_identifier(root),
        }
    }

    /// The path produced by a `path` generator:
    /// `jobs_dir / task? / unique-id / name?`.
    pub fn generate_path(&self, name: &str) -> HostPath {
        let mut path = self.jobs_dir.clone();
        if let Some(task) = &self.task {
            path = path.resolve(&[task.as_str()]);
        }
        path = path.resolve(&[self.root_identifier.as_str()]);
        if !name.is_empty() {
            path = path.resolve(&[name]);
        }
        path
    }
}

impl Registry {
    /// Fill absent arguments from generators, defaults and constants,
    /// pre-order over the subtree.
    pub fn generate(&self, value: &mut Value, ctx: &GeneratorContext) -> Result<(), ValueError> {
        if value.flags().get(Flag::Generated) {
            return Ok(());
        }
        if value.is_sealed() {
            return Err(ValueError::Sealed);
        }
        match value {
            Value::Scalar(_) => {}
            Value::Array(array) => {
                for item in array.items.iter_mut() {
                    self.generate(item, ctx)?;
                }
            }
            Value::Map(map) => {
                let ty = map.type_name.clone();
                for arg in self.all_arguments(&ty) {
                    if map.contains_key(&arg.name) {
                        continue;
                    }
                    let filled = if let Some(generator) = &arg.generator {
                        let Generator::Path { name } = generator;
                        tracing::debug!(argument = %arg.name, "generating value");
                        let mut value = Value::scalar(Scalar::Path(ctx.generate_path(name)));
                        value.flags_mut().set(Flag::Default, true);
                        Some(value)
                    } else if let Some(default) = &arg.default_value {
                        tracing::debug!(argument = %arg.name, "setting default value");
                        let mut value = default.clone();
                        value.flags_mut().set(Flag::Default, true);
                        value.flags_mut().set(Flag::Ignore, arg.ignored);
                        Some(value)
                    } else if let Some(constant) = &arg.constant {
                        let mut value = constant.clone();
                        value.flags_mut().set(Flag::Default, true);
                        Some(value)
                    } else if !arg.required {
                        let mut value = Value::scalar(Scalar::None);
                        value.flags_mut().set(Flag::Default, true);
                        Some(value)
                    } else {
                        None
                    };
                    if let Some(filled) = filled {
                        map.insert(&arg.name, filled)?;
                    }
                }
                for child in map.entries.values_mut() {
                    self.generate(child, ctx)?;
                }
            }
        }
        value.flags_mut().set(Flag::Generated, true);
        Ok(())
    }

    /// Configure a value for submission: generate, then seal.
    ///
    /// Validation is the caller's preceding step, so a generator-backed
    /// argument may still be absent here.
    pub fn configure(&self, value: &mut Value, ctx: &GeneratorContext) -> Result<(), ValueError> {
        self.generate(value, ctx)?;
        value.seal();
        Ok(())
    }
}

#[cfg(test)]
#[path = "generate_tests.rs"]
mod tests;
