use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Observed state of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code, `None` when terminated by a signal.
    Exited(Option<i32>),
}

/// The process behind a worker endpoint.
///
/// The pool owns one per worker slot and terminates it on shutdown.
#[async_trait]
pub trait WorkerProcess: Send + Sync {
    /// Non-blocking status poll.
    fn try_status(&mut self) -> io::Result<ProcessState>;

    /// Stop the process and reap it. Must be safe to call more than once.
    async fn terminate(&mut self) -> io::Result<()>;
}

/// A locally spawned worker. Killed on drop if never terminated explicitly.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Spawn `command` with `kill_on_drop` set.
    pub fn spawn(mut command: Command) -> io::Result<Self> {
        command.kill_on_drop(true);
        let child = command.spawn()?;
        debug!(pid = ?child.id(), "worker_process_spawned");
        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn try_status(&mut self) -> io::Result<ProcessState> {
        Ok(match self.child.try_wait()? {
            Some(status) => ProcessState::Exited(status.code()),
            None => ProcessState::Running,
        })
    }

    async fn terminate(&mut self) -> io::Result<()> {
        if let ProcessState::Exited(_) = self.try_status()? {
            return Ok(());
        }
        self.child.start_kill()?;
        let status = self.child.wait().await?;
        debug!(code = ?status.code(), "worker_process_terminated");
        Ok(())
    }
}

/// Stand-in for an endpoint whose process is managed elsewhere.
///
/// Always reports [`ProcessState::Running`]; terminating it is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalProcess;

#[async_trait]
impl WorkerProcess for ExternalProcess {
    fn try_status(&mut self) -> io::Result<ProcessState> {
        Ok(ProcessState::Running)
    }

    async fn terminate(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// How to start one embedding router process.
///
/// Produces `<program> --model-id <model_id> --port <port>
/// --max-client-batch-size <max_client_batch_size> [extra_args..]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub model_id: String,
    pub max_client_batch_size: usize,
    pub extra_args: Vec<String>,
    /// Inherit stdout/stderr instead of discarding router logs.
    pub inherit_output: bool,
}

impl LaunchSpec {
    pub fn new(
        program: impl Into<String>,
        model_id: impl Into<String>,
        max_client_batch_size: usize,
    ) -> Self {
        Self {
            program: program.into(),
            model_id: model_id.into(),
            max_client_batch_size,
            extra_args: Vec::new(),
            inherit_output: true,
        }
    }

    pub fn args(&self, port: u16) -> Vec<String> {
        let mut args = vec![
            "--model-id".to_string(),
            self.model_id.clone(),
            "--port".to_string(),
            port.to_string(),
            "--max-client-batch-size".to_string(),
            self.max_client_batch_size.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    pub fn command(&self, port: u16) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args(port)).stdin(Stdio::null());
        if !self.inherit_output {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        command
    }

    pub fn spawn(&self, port: u16) -> io::Result<ChildProcess> {
        info!(program = %self.program, model_id = %self.model_id, port, "launching_worker");
        ChildProcess::spawn(self.command(port))
    }
}
