// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry loading from YAML/JSON documents
//!
//! YAML is normalized to JSON before loading, so both formats share one
//! semantic path. Documents carry top-level `types` and `tasks` objects.

use crate::command::CommandLine;
use crate::registry::{Registry, RegistryError};
use crate::task::Task;
use serde_json::Value as Json;
use xpm_core::{Argument, Generator, Type, Typename};

impl Registry {
    /// Load a YAML registry document.
    pub fn load_yaml(&mut self, text: &str) -> Result<(), RegistryError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
        let json = serde_json::to_value(yaml)
            .map_err(|e| RegistryError::Document(format!("yaml does not map to json: {}", e)))?;
        self.load_json(&json)
    }

    /// Load a JSON registry document.
    pub fn load_json(&mut self, doc: &Json) -> Result<(), RegistryError> {
        if let Some(types) = doc.get("types") {
            let types = types.as_object().ok_or_else(|| {
                RegistryError::Document("top-level types must be an object".to_string())
            })?;
            for (name, entry) in types {
                self.load_type(name, entry)?;
            }
        }
        if let Some(tasks) = doc.get("tasks") {
            let tasks = tasks.as_object().ok_or_else(|| {
                RegistryError::Document("top-level tasks must be an object".to_string())
            })?;
            for (name, entry) in tasks {
                self.load_task(name, entry)?;
            }
        }
        Ok(())
    }

    fn load_type(&mut self, name: &str, entry: &Json) -> Result<(), RegistryError> {
        let typename = Typename::new(name);
        match self.lookup(&typename) {
            Some(existing) if !existing.placeholder => {
                return Err(RegistryError::Document(format!(
                    "type {} was already defined",
                    typename
                )));
            }
            Some(_) => {
                tracing::debug!(type_name = %typename, "promoting placeholder type");
            }
            None => {}
        }
        let entry = entry.as_object().ok_or_else(|| {
            RegistryError::Document(format!("definition of type {} must be an object", typename))
        })?;

        let mut ty = Type::object(typename.clone());
        if let Some(description) = entry.get("description").and_then(Json::as_str) {
            ty.description = Some(description.to_string());
        }
        if let Some(parent) = entry.get("parent") {
            let parent = parent.as_str().ok_or_else(|| {
                RegistryError::Document(format!("parent of type {} must be a string", typename))
            })?;
            let parent = Typename::new(parent);
            self.ensure_type(&parent);
            ty.parent = Some(parent);
        }
        if let Some(properties) = entry.get("properties").and_then(Json::as_object) {
            for (key, value) in properties {
                let value = self.build(value)?;
                ty.properties.insert(key.clone(), value);
            }
        }
        if let Some(arguments) = entry.get("arguments").and_then(Json::as_object) {
            for (arg_name, definition) in arguments {
                let argument = self.load_argument(&typename, arg_name, definition)?;
                self.ensure_type(&argument.type_name);
                ty.add_argument(argument);
            }
        }

        tracing::debug!(type_name = %typename, "adding type");
        // Insertion under the existing key promotes a placeholder in place;
        // references taken by name stay valid.
        self.add_type(ty);
        Ok(())
    }

    fn load_argument(
        &mut self,
        typename: &Typename,
        name: &str,
        definition: &Json,
    ) -> Result<Argument, RegistryError> {
        let mut argument = Argument::new(name);
        if let Some(type_name) = definition.as_str() {
            argument.type_name = Typename::new(type_name);
            return Ok(argument);
        }
        let definition = definition.as_object().ok_or_else(|| {
            RegistryError::Document(format!(
                "invalid definition for argument {} of type {}",
                name, typename
            ))
        })?;
        let type_name = definition.get("type").and_then(Json::as_str).ok_or_else(|| {
            RegistryError::Document(format!(
                "no defined type for argument {} in definition of type {}",
                name, typename
            ))
        })?;
        argument.type_name = Typename::new(type_name);
        if let Some(help) = definition.get("help").and_then(Json::as_str) {
            argument.help = Some(help.to_string());
        }
        if let Some(required) = definition.get("required").and_then(Json::as_bool) {
            argument.required = required;
        }
        if let Some(ignored) = definition.get("ignored").and_then(Json::as_bool) {
            argument.ignored = ignored;
        }
        if let Some(default) = definition.get("default") {
            tracing::debug!(argument = name, "found a default value");
            let value = self.build(default)?;
            argument.set_default(value);
        }
        if let Some(constant) = definition.get("constant") {
            tracing::debug!(argument = name, "found a constant value");
            argument.constant = Some(self.build(constant)?);
        }
        if let Some(generator) = definition.get("generator") {
            argument.generator = Some(load_generator(generator)?);
        }
        Ok(argument)
    }

    fn load_task(&mut self, name: &str, entry: &Json) -> Result<(), RegistryError> {
        let identifier = Typename::new(name);
        let output_type = entry
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| RegistryError::Document(format!("no type for task {}", identifier)))?;
        let output_type = Typename::new(output_type);
        self.ensure_type(&output_type);

        let command = entry.get("command").ok_or_else(|| {
            RegistryError::Document(format!("no command for task {}", identifier))
        })?;
        let command_line = CommandLine::from_json(command)?;
        self.add_task(Task::new(identifier, output_type, command_line));
        Ok(())
    }
}

fn load_generator(doc: &Json) -> Result<Generator, RegistryError> {
    let kind = doc.get("type").and_then(Json::as_str).unwrap_or("");
    match kind {
        "path" => {
            let name = doc
                .get("name")
                .and_then(Json::as_str)
                .unwrap_or("")
                .to_string();
            Ok(Generator::Path { name })
        }
        other => Err(RegistryError::Document(format!(
            "generator type {} not recognized",
            other
        ))),
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
