use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single inference request.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection refused, reset, timed out, or the body stream broke.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The worker answered with a non-success status.
    #[error("worker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The body was not a sequence of float vectors aligned with the inputs.
    #[error("could not decode embeddings: {0}")]
    Decode(String),
}

impl RpcError {
    /// Whether a fresh attempt has a reasonable chance of succeeding.
    ///
    /// Transport hiccups, throttling and server-side errors qualify. Client
    /// errors and undecodable bodies will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            RpcError::Decode(_) => false,
        }
    }
}

/// Errors surfaced by pool warm-up, dispatch and teardown.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker process died before its endpoint ever accepted a connection.
    /// `code` is `None` when the process was killed by a signal.
    #[error("worker {worker} exited unexpectedly with code {code:?} before becoming reachable")]
    FatalStartup { worker: usize, code: Option<i32> },
    /// The worker process is alive but never became reachable within the deadline.
    #[error("worker {worker} not reachable at {addr} after {waited:?}")]
    StartupTimeout {
        worker: usize,
        addr: String,
        waited: Duration,
    },
    /// Spawning or polling the worker process failed at the OS level.
    #[error("worker {worker} process error: {source}")]
    Process {
        worker: usize,
        #[source]
        source: io::Error,
    },
    /// One in-flight batch failed. `index` is the batch's sequence index.
    #[error("batch {index} failed: {source}")]
    Batch {
        index: u64,
        #[source]
        source: RpcError,
    },
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),
    #[error("no ready worker has spare capacity")]
    NoReadyWorkers,
    #[error("worker pool is shut down")]
    PoolClosed,
}

impl DispatchError {
    /// Only batch failures caused by transient RPC errors are worth retrying.
    /// Startup failures are final: a dead process never becomes reachable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Batch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Sequence index of the failing batch, if this is a batch failure.
    pub fn batch_index(&self) -> Option<u64> {
        match self {
            DispatchError::Batch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_retryability() {
        let status = |status| RpcError::Status {
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(413).is_retryable());
        assert!(!RpcError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn fatal_startup_is_never_retryable() {
        let err = DispatchError::FatalStartup {
            worker: 2,
            code: Some(1),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Some(1)"));
        assert!(err.to_string().contains("worker 2"));
    }

    #[test]
    fn batch_error_carries_index() {
        let err = DispatchError::Batch {
            index: 41,
            source: RpcError::Status {
                status: 502,
                body: "bad gateway".into(),
            },
        };
        assert_eq!(err.batch_index(), Some(41));
        assert!(err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("batch 41"));
        assert!(msg.contains("502"));
    }
}
