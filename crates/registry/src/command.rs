// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The composable command model
//!
//! A command line is a sequence of commands, each a sequence of components
//! referencing parameters, paths and inline content. Rendering to a shell
//! script happens in the engine; this module owns the data and its JSON
//! form.

use crate::registry::RegistryError;
use std::sync::atomic::{AtomicUsize, Ordering};
use xpm_core::HostPath;

/// Process-unique identity of a command.
///
/// Commands can be shared between command lines, so the render context is
/// keyed by an id assigned at construction rather than by value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(usize);

static NEXT_COMMAND_ID: AtomicUsize = AtomicUsize::new(1);

impl CommandId {
    fn next() -> Self {
        Self(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One element of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandComponent {
    /// Literal text; `{{var}}` references expand against the workspace.
    String(String),
    /// A path, resolved through the connector.
    Path(HostPath),
    /// A workspace variable holding a path.
    PathReference(String),
    /// Inline content written to an auxiliary `.input` file.
    Content { key: String, content: String },
    /// The job's parameters, written to an auxiliary `.params.json` file.
    Parameters,
}

/// A single command: components rendered space-separated, plus optional
/// file redirections.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: CommandId,
    pub components: Vec<CommandComponent>,
    pub stdin: Option<HostPath>,
    pub stdout: Option<HostPath>,
    pub stderr: Option<HostPath>,
}

impl Default for Command {
    fn default() -> Self {
        Self::new()
    }
}

impl Command {
    pub fn new() -> Self {
        Self {
            id: CommandId::next(),
            components: Vec::new(),
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }

    pub fn push(&mut self, component: CommandComponent) {
        self.components.push(component);
    }

    /// Load a command from a JSON component array.
    pub fn from_json(doc: &serde_json::Value) -> Result<Command, RegistryError> {
        let items = doc
            .as_array()
            .ok_or_else(|| RegistryError::Document("command must be an array".to_string()))?;
        let mut command = Command::new();
        for item in items {
            command.push(component_from_json(item)?);
        }
        Ok(command)
    }
}

fn component_from_json(doc: &serde_json::Value) -> Result<CommandComponent, RegistryError> {
    if let Some(s) = doc.as_str() {
        return Ok(CommandComponent::String(s.to_string()));
    }
    let object = doc.as_object().ok_or_else(|| {
        RegistryError::Document(format!("invalid command component: {}", doc))
    })?;
    let kind = object.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let field = |name: &str| -> Result<String, RegistryError> {
        object
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RegistryError::Document(format!("command component missing field {}", name))
            })
    };
    match kind {
        "content" => Ok(CommandComponent::Content {
            key: field("key")?,
            content: field("content")?,
        }),
        "parameters" => Ok(CommandComponent::Parameters),
        "path" => Ok(CommandComponent::Path(HostPath::local(field("path")?))),
        "pathref" => Ok(CommandComponent::PathReference(field("pathref")?)),
        "" if object.contains_key("path") => {
            Ok(CommandComponent::Path(HostPath::local(field("path")?)))
        }
        "" if object.contains_key("pathref") => {
            Ok(CommandComponent::PathReference(field("pathref")?))
        }
        other => Err(RegistryError::Document(format!(
            "unknown type for command component: {}",
            other
        ))),
    }
}

/// A sequence of commands run inside one subshell.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    pub commands: Vec<Command>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Load from JSON: either a single component array, or an array of
    /// command arrays.
    pub fn from_json(doc: &serde_json::Value) -> Result<CommandLine, RegistryError> {
        let items = doc
            .as_array()
            .ok_or_else(|| RegistryError::Document("command line must be an array".to_string()))?;
        let mut line = CommandLine::new();
        if items.is_empty() || !items[0].is_array() {
            line.add(Command::from_json(doc)?);
        } else {
            for item in items {
                line.add(Command::from_json(item)?);
            }
        }
        Ok(line)
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
