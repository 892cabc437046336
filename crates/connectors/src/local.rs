// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local host connector
//!
//! Spawns processes in their own process group, reattaches to externally
//! running processes by pid, and implements advisory locks as
//! O_CREAT|O_EXCL files whose removal is watched for.

use crate::process::{PipeCallback, Process, ProcessBuilder, Redirect, PIPE_CHUNK_SIZE};
use crate::{Connector, ConnectorError, FileLock, FileType};
use async_trait::async_trait;
use nix::sys::signal::{kill as send_signal, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path as StdPath;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use xpm_core::HostPath;

/// Poll interval when reattached to an external process.
const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on a single wait for a lock-removal notification; bounds the
/// race between a removal and the watcher starting.
const LOCK_WAIT_SLICE: Duration = Duration::from_millis(250);

/// Connector for the local POSIX host.
#[derive(Debug, Default)]
pub struct LocalConnector;

impl LocalConnector {
    pub fn new() -> Arc<LocalConnector> {
        Arc::new(LocalConnector)
    }
}

fn map_exit_status(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    if status.signal().is_some() {
        return -2;
    }
    if status.stopped_signal().is_some() {
        return -3;
    }
    -1
}

fn signal_for(force: bool) -> Signal {
    if force {
        Signal::SIGTERM
    } else {
        Signal::SIGINT
    }
}

fn spawn_reader<R>(mut reader: R, callback: PipeCallback) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = [0u8; PIPE_CHUNK_SIZE];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => callback(&buffer[..n]),
            }
        }
    })
}

/// A process spawned by this workspace instance.
struct LocalProcess {
    pid: i32,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    result: Mutex<Option<i32>>,
}

impl LocalProcess {
    async fn join_readers(&self) {
        let mut readers = self.readers.lock().await;
        for handle in readers.drain(..) {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl Process for LocalProcess {
    async fn is_running(&self) -> bool {
        {
            let result = self.result.lock().await;
            if result.is_some() {
                return false;
            }
        }
        let mut child = self.child.lock().await;
        match child.as_mut() {
            None => false,
            Some(c) => match c.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    let mut result = self.result.lock().await;
                    result.get_or_insert(map_exit_status(status));
                    false
                }
                Err(_) => true,
            },
        }
    }

    async fn exit_code(&self) -> i32 {
        let mut result = self.result.lock().await;
        if result.is_none() {
            let code = {
                let mut child = self.child.lock().await;
                match child.as_mut() {
                    Some(c) => match c.wait().await {
                        Ok(status) => map_exit_status(status),
                        Err(e) => {
                            tracing::error!(pid = self.pid, error = %e, "wait failed");
                            -1
                        }
                    },
                    None => -1,
                }
            };
            *result = Some(code);
        }
        let code = result.unwrap_or(-1);
        drop(result);
        self.join_readers().await;
        code
    }

    async fn kill(&self, force: bool) {
        if self.pid <= 0 {
            return;
        }
        if let Err(e) = send_signal(Pid::from_raw(self.pid), signal_for(force)) {
            tracing::debug!(pid = self.pid, error = %e, "kill failed");
        }
    }

    async fn write(&self, data: &[u8]) -> Result<i64, ConnectorError> {
        let mut stdin = self.stdin.lock().await;
        let Some(stdin) = stdin.as_mut() else {
            return Err(ConnectorError::InvalidOperation(
                "process stdin is not piped".to_string(),
            ));
        };
        match stdin.write_all(data).await {
            Ok(()) => Ok(data.len() as i64),
            Err(_) => Ok(-1),
        }
    }

    async fn eof(&self) -> Result<(), ConnectorError> {
        let mut stdin = self.stdin.lock().await;
        stdin.take();
        Ok(())
    }
}

/// A process that was started by someone else and reattached by pid.
struct ExternalProcess {
    pid: i32,
    exit_code_path: HostPath,
}

impl ExternalProcess {
    fn alive(&self) -> bool {
        match send_signal(Pid::from_raw(self.pid), None) {
            Ok(()) => true,
            Err(errno) => errno != nix::errno::Errno::ESRCH,
        }
    }
}

#[async_trait]
impl Process for ExternalProcess {
    async fn is_running(&self) -> bool {
        self.alive()
    }

    async fn exit_code(&self) -> i32 {
        while self.alive() {
            tokio::time::sleep(EXTERNAL_POLL_INTERVAL).await;
        }
        let path = match self.exit_code_path.local_path() {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "exit-code path is not local");
                return -1;
            }
        };
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents.trim().parse().unwrap_or(-1),
            Err(e) => {
                tracing::error!(path, error = %e, "could not read exit code file");
                -1
            }
        }
    }

    async fn kill(&self, force: bool) {
        if let Err(e) = send_signal(Pid::from_raw(self.pid), signal_for(force)) {
            tracing::debug!(pid = self.pid, error = %e, "kill failed");
        }
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
impl Connector for LocalConnector {
    fn resolve(&self, path: &HostPath) -> Result<String, ConnectorError> {
        Ok(path.local_path()?.to_string())
    }

    async fn set_executable(&self, path: &HostPath, flag: bool) -> Result<(), ConnectorError> {
        use std::os::unix::fs::PermissionsExt;
        let local = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&local)
            .await
            .map_err(ConnectorError::io(format!("could not stat {}", path)))?;
        let mut permissions = metadata.permissions();
        let mode = if flag { 0o700 } else { 0o600 };
        permissions.set_mode(mode);
        tokio::fs::set_permissions(&local, permissions)
            .await
            .map_err(ConnectorError::io(format!(
                "could not chmod {} to be executable",
                path
            )))
    }

    async fn mkdirs(
        &self,
        path: &HostPath,
        create_parents: bool,
        error_if_exists: bool,
    ) -> Result<(), ConnectorError> {
        let local = self.resolve(path)?;
        match tokio::fs::metadata(&local).await {
            Ok(metadata) => {
                if !metadata.is_dir() {
                    return Err(ConnectorError::Io {
                        context: format!("{} exists and is not a directory", path),
                        source: io::Error::from(io::ErrorKind::AlreadyExists),
                    });
                }
                if error_if_exists {
                    return Err(ConnectorError::Io {
                        context: format!("directory {} already exists", path),
                        source: io::Error::from(io::ErrorKind::AlreadyExists),
                    });
                }
                Ok(())
            }
            Err(_) => {
                let result = if create_parents {
                    tokio::fs::create_dir_all(&local).await
                } else {
                    tokio::fs::create_dir(&local).await
                };
                result.map_err(ConnectorError::io(format!(
                    "could not create directory {}",
                    path
                )))
            }
        }
    }

    async fn mkdir(&self, path: &HostPath) -> Result<(), ConnectorError> {
        let local = self.resolve(path)?;
        tokio::fs::create_dir(&local)
            .await
            .map_err(ConnectorError::io(format!(
                "could not create directory {}",
                path
            )))
    }

    async fn file_type(&self, path: &HostPath) -> Result<FileType, ConnectorError> {
        let local = self.resolve(path)?;
        match tokio::fs::symlink_metadata(&local).await {
            Err(_) => Ok(FileType::Unexisting),
            Ok(metadata) => {
                let ft = metadata.file_type();
                if ft.is_dir() {
                    Ok(FileType::Directory)
                } else if ft.is_fifo() {
                    Ok(FileType::Pipe)
                } else if ft.is_file() {
                    Ok(FileType::File)
                } else {
                    Ok(FileType::Other)
                }
            }
        }
    }

    async fn write_file(&self, path: &HostPath, contents: &str) -> Result<(), ConnectorError> {
        let local = self.resolve(path)?;
        tokio::fs::write(&local, contents)
            .await
            .map_err(ConnectorError::io(format!("could not write {}", path)))
    }

    async fn read_file(&self, path: &HostPath) -> Result<String, ConnectorError> {
        let local = self.resolve(path)?;
        tokio::fs::read_to_string(&local)
            .await
            .map_err(ConnectorError::io(format!("could not read {}", path)))
    }

    async fn create_file(
        &self,
        path: &HostPath,
        error_if_exists: bool,
    ) -> Result<(), ConnectorError> {
        let local = self.resolve(path)?;
        if error_if_exists {
            std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&local)
                .map(|_| ())
                .map_err(ConnectorError::io(format!("could not create {}", path)))
        } else {
            tokio::fs::write(&local, "")
                .await
                .map_err(ConnectorError::io(format!("could not create {}", path)))
        }
    }

    async fn remove(&self, path: &HostPath, recursive: bool) -> Result<(), ConnectorError> {
        let local = self.resolve(path)?;
        let metadata = tokio::fs::symlink_metadata(&local)
            .await
            .map_err(ConnectorError::io(format!("could not remove {}", path)))?;
        let result = if metadata.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&local).await
            } else {
                tokio::fs::remove_dir(&local).await
            }
        } else {
            tokio::fs::remove_file(&local).await
        };
        result.map_err(ConnectorError::io(format!("could not remove {}", path)))
    }

    async fn lock(
        self: Arc<Self>,
        path: &HostPath,
        timeout: Duration,
    ) -> Result<FileLock, ConnectorError> {
        let local = path.local_path()?.to_string();
        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };
        let result = tokio::task::spawn_blocking(move || acquire_lock_file(&local, deadline))
            .await
            .map_err(|e| ConnectorError::Lock(format!("lock task failed: {}", e)))?;
        result?;
        Ok(FileLock::new(self, path.clone()))
    }

    async fn spawn(&self, builder: ProcessBuilder) -> Result<Box<dyn Process>, ConnectorError> {
        if builder.command.is_empty() {
            return Err(ConnectorError::InvalidOperation(
                "empty command".to_string(),
            ));
        }
        let program = builder.command[0].clone();
        let mut command = Command::new(&program);
        command.args(&builder.command[1..]);
        command.kill_on_drop(false);
        if let Some(dir) = &builder.working_directory {
            command.current_dir(self.resolve(dir)?);
        }
        for (key, value) in &builder.environment {
            command.env(key, value);
        }
        if builder.detach {
            command.process_group(0);
        }

        match &builder.stdin {
            Redirect::Inherit => {
                command.stdin(Stdio::inherit());
            }
            Redirect::Null => {
                command.stdin(Stdio::null());
            }
            Redirect::Pipe(_) => {
                command.stdin(Stdio::piped());
            }
            Redirect::File(path) => {
                let file = std::fs::File::open(self.resolve(path)?)
                    .map_err(ConnectorError::io(format!("could not open {}", path)))?;
                command.stdin(Stdio::from(file));
            }
        }
        for (redirect, output) in [(&builder.stdout, true), (&builder.stderr, false)] {
            let stdio = match redirect {
                Redirect::Inherit => Stdio::inherit(),
                Redirect::Null => Stdio::null(),
                Redirect::Pipe(_) => Stdio::piped(),
                Redirect::File(path) => {
                    let file = std::fs::File::create(self.resolve(path)?)
                        .map_err(ConnectorError::io(format!("could not open {}", path)))?;
                    Stdio::from(file)
                }
            };
            if output {
                command.stdout(stdio);
            } else {
                command.stderr(stdio);
            }
        }

        let mut child = command
            .spawn()
            .map_err(ConnectorError::io(format!("could not spawn {}", program)))?;
        let pid = child.id().map(|p| p as i32).unwrap_or(-1);
        tracing::debug!(pid, program = %program, "spawned local process");

        let mut readers = Vec::new();
        if let Redirect::Pipe(callback) = &builder.stdout {
            if let Some(stdout) = child.stdout.take() {
                readers.push(spawn_reader(stdout, callback.clone()));
            }
        }
        if let Redirect::Pipe(callback) = &builder.stderr {
            if let Some(stderr) = child.stderr.take() {
                readers.push(spawn_reader(stderr, callback.clone()));
            }
        }
        let stdin = child.stdin.take();

        Ok(Box::new(LocalProcess {
            pid,
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(stdin),
            readers: Mutex::new(readers),
            result: Mutex::new(None),
        }))
    }

    async fn get_process(
        &self,
        exit_code_path: &HostPath,
        pid: i32,
    ) -> Result<Box<dyn Process>, ConnectorError> {
        Ok(Box::new(ExternalProcess {
            pid,
            exit_code_path: exit_code_path.clone(),
        }))
    }
}

/// Take the lock file with O_CREAT|O_EXCL, waiting for removal when
/// contended. `None` deadline blocks indefinitely.
fn acquire_lock_file(path: &str, deadline: Option<Instant>) -> Result<(), ConnectorError> {
    use notify::{RecursiveMode, Watcher};
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConnectorError::io(format!(
                    "could not create lock file {}",
                    path
                ))(e))
            }
        }
        if let Ok(metadata) = std::fs::metadata(path) {
            if !metadata.is_file() {
                return Err(ConnectorError::Lock(format!(
                    "lock path {} already exists and is not a file",
                    path
                )));
            }
        }

        tracing::debug!(path, "waiting for lock file to be removed");
        let (tx, rx) = std::sync::mpsc::channel();
        let watched = StdPath::new(path)
            .file_name()
            .map(|n| n.to_os_string());
        let mut watcher = notify::recommended_watcher(
            move |event: Result<notify::Event, notify::Error>| {
                let Ok(event) = event else { return };
                if !event.kind.is_remove() {
                    return;
                }
                let matches = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == watched);
                if matches {
                    let _ = tx.send(());
                }
            },
        )
        .map_err(|e| ConnectorError::Lock(format!("cannot watch {}: {}", path, e)))?;
        let parent = StdPath::new(path)
            .parent()
            .unwrap_or_else(|| StdPath::new("."));
        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .map_err(|e| ConnectorError::Lock(format!("cannot watch {}: {}", path, e)))?;

        while StdPath::new(path).exists() {
            let wait = match deadline {
                None => LOCK_WAIT_SLICE,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ConnectorError::Lock(format!(
                            "timed out waiting for lock {}",
                            path
                        )));
                    }
                    (deadline - now).min(LOCK_WAIT_SLICE)
                }
            };
            let _ = rx.recv_timeout(wait);
        }
        // retry the exclusive create
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
