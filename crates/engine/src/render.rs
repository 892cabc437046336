// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command rendering
//!
//! Renders command lines into shell text, collecting auxiliary files
//! (inline content, parameter JSON) to be written next to the script.
//! Rendering is synchronous; the script builder performs the writes.

use crate::error::EngineError;
use crate::scriptbuilder::protect_quoted;
use crate::workspace::Workspace;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use xpm_connectors::Connector;
use xpm_core::{HostPath, Scalar, Value, ValueError, KEY_JOB, KEY_TASK, KEY_TYPE, KEY_VALUE};
use xpm_registry::{Command, CommandComponent, CommandId, CommandLine, Registry};

/// State carried through the rendering of one script.
///
/// Named-pipe redirections are keyed by command identity, and auxiliary
/// file names count up per `(name, prefix, suffix)` so scripts are
/// deterministic on replay.
pub struct CommandContext<'a> {
    pub workspace: &'a Workspace,
    pub connector: Arc<dyn Connector>,
    pub registry: &'a Registry,
    pub folder: HostPath,
    pub name: String,
    /// The job's configured parameter value.
    pub parameters: Option<Value>,
    counters: HashMap<String, u32>,
    named_outputs: HashMap<CommandId, Vec<HostPath>>,
    named_errors: HashMap<CommandId, Vec<HostPath>>,
    /// Auxiliary files to materialize, path → contents.
    pub files: Vec<(HostPath, String)>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        workspace: &'a Workspace,
        connector: Arc<dyn Connector>,
        registry: &'a Registry,
        folder: HostPath,
        name: String,
    ) -> Self {
        Self {
            workspace,
            connector,
            registry,
            folder,
            name,
            parameters: None,
            counters: HashMap::new(),
            named_outputs: HashMap::new(),
            named_errors: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// Next auxiliary file path for a `(prefix, suffix)` pair:
    /// `name_NN.prefix.suffix`, NN counting from 01.
    pub fn auxiliary_file(&mut self, prefix: &str, suffix: &str) -> HostPath {
        let reference = format!("{}.{}.{}", self.name, prefix, suffix);
        let count = self.counters.entry(reference).or_insert(0);
        *count += 1;
        self.folder.resolve(&[&format!(
            "{}_{:02}.{}.{}",
            self.name, count, prefix, suffix
        )])
    }

    /// Tee a command's stdout into a named pipe.
    pub fn add_named_output(&mut self, id: CommandId, path: HostPath) {
        self.named_outputs.entry(id).or_default().push(path);
    }

    /// Tee a command's stderr into a named pipe.
    pub fn add_named_error(&mut self, id: CommandId, path: HostPath) {
        self.named_errors.entry(id).or_default().push(path);
    }

    pub fn named_outputs(&self, id: CommandId) -> &[HostPath] {
        self.named_outputs.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn named_errors(&self, id: CommandId) -> &[HostPath] {
        self.named_errors.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Every named pipe of a command (cleanup removes them all).
    pub fn named_pipes(&self, id: CommandId) -> Vec<HostPath> {
        let mut pipes = self.named_outputs(id).to_vec();
        pipes.extend_from_slice(self.named_errors(id));
        pipes
    }
}

/// Expand `{{var}}` references against the workspace variables, in a
/// single non-recursive pass. Unknown variables expand to the empty
/// string.
pub fn expand_variables(workspace: &Workspace, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                out.push_str(&workspace.get(key).unwrap_or_default());
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_component(
    component: &CommandComponent,
    ctx: &mut CommandContext<'_>,
    out: &mut String,
) -> Result<(), EngineError> {
    match component {
        CommandComponent::String(text) => {
            out.push_str(&expand_variables(ctx.workspace, text));
        }
        CommandComponent::Path(path) => {
            out.push_str(&ctx.connector.resolve(path)?);
        }
        CommandComponent::PathReference(key) => {
            let value = ctx.workspace.get(key).ok_or_else(|| {
                EngineError::Value(ValueError::Argument(format!(
                    "workspace has no variable named {}",
                    key
                )))
            })?;
            tracing::debug!(key, value, "path reference");
            out.push_str(&value);
        }
        CommandComponent::Content { key, content } => {
            let path = ctx.auxiliary_file(key, "input");
            ctx.files.push((path.clone(), content.clone()));
            out.push_str(&ctx.connector.resolve(&path)?);
        }
        CommandComponent::Parameters => {
            let parameters = ctx.parameters.clone().ok_or_else(|| {
                EngineError::Assertion("command references parameters but the job has none".into())
            })?;
            let json = parameters_json(&parameters, ctx, true)?;
            let path = ctx.auxiliary_file("params", "json");
            ctx.files.push((path.clone(), json.to_string()));
            out.push_str(&ctx.connector.resolve(&path)?);
        }
    }
    Ok(())
}

fn write_redirection(
    stream: u32,
    path: &HostPath,
    ctx: &CommandContext<'_>,
    out: &mut String,
) -> Result<(), EngineError> {
    out.push_str(&format!(
        " {}> {}",
        stream,
        protect_quoted(&ctx.connector.resolve(path)?)
    ));
    Ok(())
}

fn render_redirections(
    stream: u32,
    explicit: Option<&HostPath>,
    named: &[HostPath],
    ctx: &CommandContext<'_>,
    out: &mut String,
) -> Result<(), EngineError> {
    if named.is_empty() {
        if let Some(path) = explicit {
            write_redirection(stream, path, ctx, out)?;
        }
        return Ok(());
    }
    if named.len() == 1 && explicit.is_none() {
        return write_redirection(stream, &named[0], ctx, out);
    }
    // Multiple consumers tee into every pipe.
    out.push_str(&format!(" {}> >(tee", stream));
    for path in named {
        out.push_str(&format!(
            " \"{}\"",
            protect_quoted(&ctx.connector.resolve(path)?)
        ));
    }
    if let Some(path) = explicit {
        write_redirection(stream, path, ctx, out)?;
    }
    out.push(')');
    Ok(())
}

/// Render one command: named pipes, stdin feed, components, redirections
/// and the error check.
pub fn render_command(
    command: &Command,
    ctx: &mut CommandContext<'_>,
    out: &mut String,
) -> Result<(), EngineError> {
    for pipe in ctx.named_pipes(command.id) {
        out.push_str(&format!(
            " mkfifo \"{}\"\n",
            protect_quoted(&ctx.connector.resolve(&pipe)?)
        ));
    }
    if let Some(stdin) = &command.stdin {
        out.push_str(&format!(
            " cat \"{}\" | ",
            protect_quoted(&ctx.connector.resolve(stdin)?)
        ));
    }
    let mut first = true;
    for component in &command.components {
        if !first {
            out.push(' ');
        }
        render_component(component, ctx, out)?;
        first = false;
    }
    let named_outputs = ctx.named_outputs(command.id).to_vec();
    let named_errors = ctx.named_errors(command.id).to_vec();
    render_redirections(1, command.stdout.as_ref(), &named_outputs, ctx, out)?;
    render_redirections(2, command.stderr.as_ref(), &named_errors, ctx, out)?;
    out.push_str(" || checkerror \"${PIPESTATUS[@]}\" ");
    out.push_str(" || exit $?\n");
    Ok(())
}

/// Render a command line; multiple commands share one subshell.
pub fn render_command_line(
    line: &CommandLine,
    ctx: &mut CommandContext<'_>,
    out: &mut String,
) -> Result<(), EngineError> {
    let wrap = line.commands.len() > 1;
    if wrap {
        out.push_str("(\n");
    }
    for command in &line.commands {
        render_command(command, ctx, out)?;
    }
    if wrap {
        out.push_str(")\n");
    }
    Ok(())
}

/// The parameter-file JSON for a value.
///
/// Simple scalars emit bare JSON (paths keep a `$type`/`$value` envelope
/// with the resolved path); arrays wrap their elements; maps emit their
/// type, job metadata and every declared argument in declaration order,
/// `null` when absent. An empty untyped map is `null`.
pub fn parameters_json(
    value: &Value,
    ctx: &mut CommandContext<'_>,
    root: bool,
) -> Result<serde_json::Value, EngineError> {
    use serde_json::{json, Map as JsonMap, Value as Json};
    match value {
        Value::Scalar(scalar) => match &scalar.scalar {
            Scalar::Path(path) => Ok(json!({
                KEY_TYPE: "path",
                KEY_VALUE: ctx.connector.resolve(path)?,
            })),
            Scalar::Unset | Scalar::None => Ok(Json::Null),
            other => Ok(other.to_json().map_err(EngineError::Value)?),
        },
        Value::Array(array) => {
            let mut items = Vec::with_capacity(array.items.len());
            for item in &array.items {
                items.push(parameters_json(item, ctx, false)?);
            }
            Ok(json!({
                KEY_TYPE: ctx.registry.value_type(value).as_str(),
                KEY_VALUE: items,
            }))
        }
        Value::Map(map) => {
            let untyped = map.type_name.as_str() == "any";
            if map.entries.is_empty() && map.task.is_none() && map.job.is_none() && untyped {
                return Ok(Json::Null);
            }
            let mut object = JsonMap::new();
            object.insert(KEY_TYPE.to_string(), json!(map.type_name.as_str()));
            if root {
                if let Some(task) = &map.task {
                    object.insert(KEY_TASK.to_string(), json!(task.as_str()));
                }
            }
            if let Some(job) = &map.job {
                object.insert(KEY_JOB.to_string(), json!({"locator": job.locator.to_string()}));
            }
            let mut seen = HashSet::new();
            for type_name in ctx.registry.ancestors(&map.type_name) {
                let Some(ty) = ctx.registry.get_type(&type_name) else {
                    continue;
                };
                for (name, _argument) in &ty.arguments {
                    if !seen.insert(name.clone()) {
                        continue;
                    }
                    let child = match map.entries.get(name) {
                        Some(child) => parameters_json(child, ctx, false)?,
                        None => Json::Null,
                    };
                    object.insert(name.clone(), child);
                }
            }
            Ok(Json::Object(object))
        }
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
