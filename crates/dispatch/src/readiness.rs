use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::process::{ProcessState, WorkerProcess};

/// Timing knobs for [`wait_until_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Timeout for each bare connection attempt.
    pub connect_timeout: Duration,
    /// Pause between a failed attempt and the next one.
    pub poll_interval: Duration,
    /// Give up after this long even if the process is still alive.
    /// `None` waits as long as the process lives (model downloads can be slow).
    pub startup_timeout: Option<Duration>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            startup_timeout: None,
        }
    }
}

impl ReadinessConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

/// Block until `addr` accepts a TCP connection.
///
/// Before every retry the worker process is polled: if it has already exited
/// the gate fails with [`DispatchError::FatalStartup`] instead of spinning
/// forever against an endpoint that can never come up.
pub async fn wait_until_ready<P>(
    worker: usize,
    process: &mut P,
    addr: &str,
    cfg: &ReadinessConfig,
) -> Result<(), DispatchError>
where
    P: WorkerProcess + ?Sized,
{
    let start = Instant::now();
    let mut attempts = 0u64;

    loop {
        attempts += 1;
        match tokio::time::timeout(cfg.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                info!(
                    worker,
                    addr,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "worker_ready"
                );
                return Ok(());
            }
            Ok(Err(err)) => debug!(worker, addr, error = %err, "worker_not_ready"),
            Err(_) => debug!(worker, addr, "worker_connect_timeout"),
        }

        match process
            .try_status()
            .map_err(|source| DispatchError::Process { worker, source })?
        {
            ProcessState::Running => {}
            ProcessState::Exited(code) => {
                warn!(worker, addr, code = ?code, attempts, "worker_exited_during_startup");
                return Err(DispatchError::FatalStartup { worker, code });
            }
        }

        if let Some(limit) = cfg.startup_timeout {
            let waited = start.elapsed();
            if waited >= limit {
                warn!(worker, addr, waited_ms = waited.as_millis() as u64, "worker_startup_timeout");
                return Err(DispatchError::StartupTimeout {
                    worker,
                    addr: addr.to_string(),
                    waited,
                });
            }
        }

        tokio::time::sleep(cfg.poll_interval).await;
    }
}
