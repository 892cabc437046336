// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell script builder
//!
//! Materializes a job into an executable POSIX shell script implementing
//! the run protocol: lock checks, pid/exit-code/done state files, quoted
//! environment exports, a cleanup trap, and the command subshell.

use crate::error::EngineError;
use crate::job::Job;
use crate::render::{render_command_line, CommandContext};
use crate::workspace::Workspace;
use indexmap::IndexMap;
use std::sync::Arc;
use xpm_connectors::Connector;
use xpm_core::HostPath;
use xpm_registry::{CommandId, CommandLine, Registry};

/// Escape characters that are special inside shell double quotes.
pub fn protect_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '"' || c == '$' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A rendered script and its auxiliary files, ready to be written.
pub struct RenderedScript {
    pub script_path: HostPath,
    pub script: String,
    pub files: Vec<(HostPath, String)>,
}

/// Builds `/bin/sh` scripts.
pub struct ShScriptBuilder {
    pub shell_path: String,
    pub environment: IndexMap<String, String>,
    pub notification_url: Option<String>,
    /// Lock files held by the workspace; the script verifies them on entry
    /// and removes them in its cleanup trap.
    pub lock_files: Vec<HostPath>,
    /// Commands emitted before the main command subshell.
    pub preprocess: Option<CommandLine>,
    /// Named pipes teeing a command's stdout, keyed by command identity.
    pub named_outputs: Vec<(CommandId, HostPath)>,
    /// Named pipes teeing a command's stderr, keyed by command identity.
    pub named_errors: Vec<(CommandId, HostPath)>,
}

impl Default for ShScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShScriptBuilder {
    pub fn new() -> Self {
        Self {
            shell_path: "/bin/sh".to_string(),
            environment: IndexMap::new(),
            notification_url: None,
            lock_files: Vec::new(),
            preprocess: None,
            named_outputs: Vec::new(),
            named_errors: Vec::new(),
        }
    }

    /// Render the script text and its auxiliary files.
    pub fn render(
        &self,
        workspace: &Workspace,
        connector: &Arc<dyn Connector>,
        registry: &Registry,
        locator: &HostPath,
        job: &Job,
    ) -> Result<RenderedScript, EngineError> {
        let directory = locator.parent();
        let name = locator.name().to_string();
        let script_path = directory.resolve(&[&format!("{}.sh", name)]);
        tracing::info!(script = %script_path, "writing script");

        let mut ctx = CommandContext::new(
            workspace,
            connector.clone(),
            registry,
            directory.clone(),
            name,
        );
        ctx.parameters = job.parameters();
        for (id, path) in &self.named_outputs {
            ctx.add_named_output(*id, path.clone());
        }
        for (id, path) in &self.named_errors {
            ctx.add_named_error(*id, path.clone());
        }

        let resolve = |path: &HostPath| connector.resolve(path);
        let mut out = String::new();
        out.push_str(&format!("#!{}\n", self.shell_path));
        out.push_str("# Experimaestro generated task\n\n");

        if !self.lock_files.is_empty() {
            out.push_str("# Checks that the locks are set\n");
            for lock_file in &self.lock_files {
                out.push_str(&format!(
                    "if ! test -f {}; then echo Locks not set; exit 017; fi\n",
                    resolve(lock_file)?
                ));
            }
        }
        out.push_str("# Checks that the start lock is set, and removes it\n");
        let start_lock = resolve(&job.start_lock_path())?;
        out.push_str(&format!(
            "if ! test -f {}; then echo start lock not set; exit 017; fi\n",
            start_lock
        ));
        out.push_str(&format!("rm -f {}\n\n", start_lock));

        out.push_str("set -o pipefail\n\n");
        out.push_str(&format!(
            "echo $$ > \"{}\"\n\n",
            protect_quoted(&resolve(&job.pid_path())?)
        ));

        for (key, value) in &self.environment {
            out.push_str(&format!("export {}=\"{}\"\n", key, protect_quoted(value)));
        }
        if let Some(url) = &self.notification_url {
            out.push_str(&format!(
                "export XPM_NOTIFICATION_URL=\"{}/{}\"\n",
                protect_quoted(url),
                job.resource_id().unwrap_or(0)
            ));
        }
        out.push_str(&format!(
            "cd \"{}\"\n",
            protect_quoted(&resolve(&directory)?)
        ));

        if let Some(preprocess) = &self.preprocess {
            render_command_line(preprocess, &mut ctx, &mut out)?;
        }

        let mut body = String::new();
        render_command_line(job.command(), &mut ctx, &mut body)?;

        out.push_str("\ncleanup() {\n");
        out.push_str(" echo Cleaning up 1>&2\n");
        out.push_str(" trap - 0\n");
        out.push_str(&format!(" rm -f {}\n", resolve(&job.pid_path())?));
        for lock_file in &self.lock_files {
            out.push_str(&format!(" rm -f {}\n", resolve(lock_file)?));
        }
        for command in &job.command().commands {
            for pipe in ctx.named_pipes(command.id) {
                out.push_str(&format!(" rm -f {}\n", resolve(&pipe)?));
            }
        }
        if self.notification_url.is_some() {
            out.push_str(
                " wget --tries=1 --connect-timeout=1 --read-timeout=1 --quiet -O \
                 /dev/null \"$XPM_NOTIFICATION_URL/eoj\"\n",
            );
        }
        out.push_str(" test ! -z \"$PID\" && pkill -KILL -P $PID\n");
        out.push_str("}\n\n");

        out.push_str("# Set trap to cleanup when exiting\n");
        out.push_str("trap cleanup 0\n\n");
        out.push_str(
            "checkerror()  { local e; for e in \"$@\"; do [[ \"$e\" != 0 ]] && [[ \"$e\" != 141 ]] \
             && exit $e; done; return 0; }\n\n",
        );

        out.push_str("(\n");
        out.push_str(&body);
        out.push_str(")  & \n");
        out.push_str("PID=$!\n");
        out.push_str("wait $PID\n");
        out.push_str("code=$?\n");
        let exit_code = protect_quoted(&resolve(&job.exit_code_path())?);
        out.push_str("if test $code -ne 0; then\n");
        out.push_str(&format!(" echo $code > \"{}\"\n", exit_code));
        out.push_str(" exit $code\n");
        out.push_str("fi\n");
        out.push_str(&format!("echo 0 > \"{}\"\n", exit_code));
        out.push_str(&format!(
            "touch \"{}\"\n",
            protect_quoted(&resolve(&job.done_path())?)
        ));

        Ok(RenderedScript {
            script_path,
            script: out,
            files: ctx.files,
        })
    }

    /// Render and write the script and auxiliary files, marking the script
    /// executable. Returns the script path.
    pub async fn write(
        &self,
        workspace: &Workspace,
        connector: &Arc<dyn Connector>,
        registry: &Registry,
        locator: &HostPath,
        job: &Job,
    ) -> Result<HostPath, EngineError> {
        let rendered = self.render(workspace, connector, registry, locator, job)?;
        for (path, contents) in &rendered.files {
            connector.write_file(path, contents).await?;
        }
        connector
            .write_file(&rendered.script_path, &rendered.script)
            .await?;
        connector.set_executable(&rendered.script_path, true).await?;
        Ok(rendered.script_path)
    }
}

#[cfg(test)]
#[path = "scriptbuilder_tests.rs"]
mod tests;
