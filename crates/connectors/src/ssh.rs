// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH host connector
//!
//! Drives a remote POSIX host through the OpenSSH client. Remote commands
//! are rendered with single-quote escaping; file I/O streams through
//! `cat`; locks use noclobber redirection. Shares are resolved through
//! configured mount prefixes.

use crate::local::LocalConnector;
use crate::process::{Process, ProcessBuilder, Redirect};
use crate::{Connector, ConnectorError, FileLock, FileType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use xpm_core::HostPath;

/// Timeout for short remote operations (stat, mkdir, chmod).
const SSH_OP_TIMEOUT: Duration = Duration::from_secs(20);

/// Poll interval for contended remote locks and reattached processes.
const REMOTE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Quote a string for a POSIX shell.
pub fn sh_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-/=:".contains(c))
    {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Connector for a host reached over SSH.
pub struct SshConnector {
    host: String,
    user: Option<String>,
    port: Option<u16>,
    /// share name → remote mount prefix
    mounts: HashMap<String, String>,
}

impl SshConnector {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            mounts: HashMap::new(),
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Mount a share at a remote prefix for path resolution.
    pub fn mount(mut self, share: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.mounts.insert(share.into(), prefix.into());
        self
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// The ssh argv prefix, before the remote command.
    fn ssh_args(&self) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(self.destination());
        args.push("--".to_string());
        args
    }

    /// Run a short remote command, capturing its output.
    async fn run(&self, remote: &str) -> Result<std::process::Output, ConnectorError> {
        let mut command = Command::new("ssh");
        command.args(self.ssh_args());
        command.arg(remote);
        command.stdin(Stdio::null());
        let output = tokio::time::timeout(SSH_OP_TIMEOUT, command.output())
            .await
            .map_err(|_| {
                ConnectorError::Io {
                    context: format!("ssh to {} timed out", self.host),
                    source: io::ErrorKind::TimedOut.into(),
                }
            })?
            .map_err(ConnectorError::io(format!("ssh to {} failed", self.host)))?;
        Ok(output)
    }

    /// Run a short remote command and require exit 0.
    async fn run_ok(&self, remote: &str) -> Result<std::process::Output, ConnectorError> {
        let output = self.run(remote).await?;
        if !output.status.success() {
            return Err(ConnectorError::Io {
                context: format!(
                    "remote command failed on {}: {}",
                    self.host,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                source: io::ErrorKind::Other.into(),
            });
        }
        Ok(output)
    }
}

/// A process reattached on the remote host by pid.
struct RemoteExternalProcess {
    connector: Arc<SshConnector>,
    pid: i32,
    exit_code_path: HostPath,
}

impl RemoteExternalProcess {
    async fn alive(&self) -> bool {
        match self.connector.run(&format!("kill -0 {} 2>/dev/null", self.pid)).await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Process for RemoteExternalProcess {
    async fn is_running(&self) -> bool {
        self.alive().await
    }

    async fn exit_code(&self) -> i32 {
        while self.alive().await {
            tokio::time::sleep(REMOTE_POLL_INTERVAL).await;
        }
        match self.connector.read_file(&self.exit_code_path).await {
            Ok(contents) => contents.trim().parse().unwrap_or(-1),
            Err(e) => {
                tracing::error!(path = %self.exit_code_path, error = %e, "could not read exit code file");
                -1
            }
        }
    }

    async fn kill(&self, force: bool) {
        let signal = if force { "TERM" } else { "INT" };
        let _ = self
            .connector
            .run(&format!("kill -{} {}", signal, self.pid))
            .await;
    }

    async fn write(&self, _data: &[u8]) -> Result<i64, ConnectorError> {
        Err(ConnectorError::InvalidOperation(
            "cannot write to an external process".to_string(),
        ))
    }

    async fn eof(&self) -> Result<(), ConnectorError> {
        Err(ConnectorError::InvalidOperation(
            "cannot close the input of an external process".to_string(),
        ))
    }
}

#[async_trait]
impl Connector for SshConnector {
    fn resolve(&self, path: &HostPath) -> Result<String, ConnectorError> {
        if path.share().is_empty() {
            return Ok(path.raw().to_string());
        }
        match self.mounts.get(path.share()) {
            Some(prefix) => Ok(format!("{}{}", prefix, path.raw())),
            None => Err(ConnectorError::Io {
                context: format!("no mount configured for share {}", path.share()),
                source: io::ErrorKind::NotFound.into(),
            }),
        }
    }

    async fn set_executable(&self, path: &HostPath, flag: bool) -> Result<(), ConnectorError> {
        let mode = if flag { "u+x" } else { "u-x" };
        let remote = format!("chmod {} {}", mode, sh_quote(&self.resolve(path)?));
        self.run_ok(&remote).await.map(|_| ())
    }

    async fn mkdirs(
        &self,
        path: &HostPath,
        create_parents: bool,
        error_if_exists: bool,
    ) -> Result<(), ConnectorError> {
        let quoted = sh_quote(&self.resolve(path)?);
        let flag = if create_parents { "-p " } else { "" };
        let remote = format!(
            "if [ -e {p} ]; then if [ -d {p} ]; then exit 41; else exit 42; fi; else mkdir {flag}{p}; fi",
            p = quoted,
            flag = flag,
        );
        let output = self.run(&remote).await?;
        match output.status.code() {
            Some(0) => Ok(()),
            Some(41) if !error_if_exists => Ok(()),
            Some(41) => Err(ConnectorError::Io {
                context: format!("directory {} already exists", path),
                source: io::ErrorKind::AlreadyExists.into(),
            }),
            _ => Err(ConnectorError::Io {
                context: format!("could not create directory {}", path),
                source: io::ErrorKind::Other.into(),
            }),
        }
    }

    async fn mkdir(&self, path: &HostPath) -> Result<(), ConnectorError> {
        let remote = format!("mkdir {}", sh_quote(&self.resolve(path)?));
        self.run_ok(&remote).await.map(|_| ())
    }

    async fn file_type(&self, path: &HostPath) -> Result<FileType, ConnectorError> {
        let quoted = sh_quote(&self.resolve(path)?);
        let remote = format!(
            "if [ -d {p} ]; then echo directory; elif [ -p {p} ]; then echo pipe; \
             elif [ -f {p} ]; then echo file; elif [ -e {p} ]; then echo other; \
             else echo unexisting; fi",
            p = quoted,
        );
        let output = self.run_ok(&remote).await?;
        let kind = String::from_utf8_lossy(&output.stdout);
        Ok(match kind.trim() {
            "directory" => FileType::Directory,
            "pipe" => FileType::Pipe,
            "file" => FileType::File,
            "other" => FileType::Other,
            _ => FileType::Unexisting,
        })
    }

    async fn write_file(&self, path: &HostPath, contents: &str) -> Result<(), ConnectorError> {
        let remote = format!("cat > {}", sh_quote(&self.resolve(path)?));
        let mut command = Command::new("ssh");
        command.args(self.ssh_args());
        command.arg(remote);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::null());
        let mut child = command
            .spawn()
            .map_err(ConnectorError::io(format!("ssh to {} failed", self.host)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(contents.as_bytes())
                .await
                .map_err(ConnectorError::io(format!("could not write {}", path)))?;
        }
        let status = tokio::time::timeout(SSH_OP_TIMEOUT, child.wait())
            .await
            .map_err(|_| ConnectorError::Io {
                context: format!("ssh to {} timed out", self.host),
                source: io::ErrorKind::TimedOut.into(),
            })?
            .map_err(ConnectorError::io(format!("could not write {}", path)))?;
        if !status.success() {
            return Err(ConnectorError::Io {
                context: format!("could not write {}", path),
                source: io::ErrorKind::Other.into(),
            });
        }
        Ok(())
    }

    async fn read_file(&self, path: &HostPath) -> Result<String, ConnectorError> {
        let remote = format!("cat {}", sh_quote(&self.resolve(path)?));
        let output = self.run_ok(&remote).await?;
        String::from_utf8(output.stdout).map_err(|_| ConnectorError::Io {
            context: format!("{} is not valid UTF-8", path),
            source: io::ErrorKind::InvalidData.into(),
        })
    }

    async fn create_file(
        &self,
        path: &HostPath,
        error_if_exists: bool,
    ) -> Result<(), ConnectorError> {
        let quoted = sh_quote(&self.resolve(path)?);
        let remote = if error_if_exists {
            format!("set -C; : > {}", quoted)
        } else {
            format!(": > {}", quoted)
        };
        self.run_ok(&remote).await.map(|_| ())
    }

    async fn remove(&self, path: &HostPath, recursive: bool) -> Result<(), ConnectorError> {
        let quoted = sh_quote(&self.resolve(path)?);
        let remote = if recursive {
            format!("rm -rf {}", quoted)
        } else {
            format!("if [ -d {p} ]; then rmdir {p}; else rm -f {p}; fi", p = quoted)
        };
        self.run_ok(&remote).await.map(|_| ())
    }

    async fn lock(
        self: Arc<Self>,
        path: &HostPath,
        timeout: Duration,
    ) -> Result<FileLock, ConnectorError> {
        let quoted = sh_quote(&self.resolve(path)?);
        let remote = format!("(set -C; : > {}) 2>/dev/null", quoted);
        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };
        loop {
            let output = self.run(&remote).await?;
            if output.status.success() {
                return Ok(FileLock::new(self, path.clone()));
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(ConnectorError::Lock(format!(
                        "timed out waiting for lock {}",
                        path
                    )));
                }
            }
            tokio::time::sleep(REMOTE_POLL_INTERVAL).await;
        }
    }

    async fn spawn(&self, builder: ProcessBuilder) -> Result<Box<dyn Process>, ConnectorError> {
        if builder.command.is_empty() {
            return Err(ConnectorError::InvalidOperation(
                "empty command".to_string(),
            ));
        }
        // Render the remote side: cd, environment, command, file
        // redirections (remote paths). Pipe/inherit streams ride the ssh
        // channel and stay on the local builder.
        let mut remote = String::new();
        if let Some(dir) = &builder.working_directory {
            remote.push_str(&format!("cd {} && ", sh_quote(&self.resolve(dir)?)));
        }
        for (key, value) in &builder.environment {
            remote.push_str(&format!("export {}={} && ", key, sh_quote(value)));
        }
        remote.push_str("exec ");
        let mut first = true;
        for word in &builder.command {
            if !first {
                remote.push(' ');
            }
            remote.push_str(&sh_quote(word));
            first = false;
        }
        if let Redirect::File(path) = &builder.stdin {
            remote.push_str(&format!(" < {}", sh_quote(&self.resolve(path)?)));
        }
        if let Redirect::File(path) = &builder.stdout {
            remote.push_str(&format!(" > {}", sh_quote(&self.resolve(path)?)));
        }
        if let Redirect::File(path) = &builder.stderr {
            remote.push_str(&format!(" 2> {}", sh_quote(&self.resolve(path)?)));
        }

        let local = LocalConnector::new();
        let mut ssh_builder = ProcessBuilder::new(local.clone());
        ssh_builder.command = vec!["ssh".to_string()];
        ssh_builder.command.extend(self.ssh_args());
        ssh_builder.command.push(remote);
        ssh_builder.detach = builder.detach;
        ssh_builder.stdin = match builder.stdin {
            Redirect::File(_) => Redirect::Null,
            other => other,
        };
        ssh_builder.stdout = match builder.stdout {
            Redirect::File(_) => Redirect::Null,
            other => other,
        };
        ssh_builder.stderr = match builder.stderr {
            Redirect::File(_) => Redirect::Null,
            other => other,
        };
        local.spawn(ssh_builder).await
    }

    async fn get_process(
        &self,
        exit_code_path: &HostPath,
        pid: i32,
    ) -> Result<Box<dyn Process>, ConnectorError> {
        Ok(Box::new(RemoteExternalProcess {
            connector: Arc::new(self.clone_config()),
            pid,
            exit_code_path: exit_code_path.clone(),
        }))
    }
}

impl SshConnector {
    fn clone_config(&self) -> SshConnector {
        SshConnector {
            host: self.host.clone(),
            user: self.user.clone(),
            port: self.port,
            mounts: self.mounts.clone(),
        }
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
