//! Ordered, capacity-bounded dispatch of text batches to embedding workers.
//!
//! A [`WorkerPool`] owns a fixed set of workers, each an inference endpoint
//! plus the process serving it. The pool is warmed up once, reused for a whole
//! run, then shut down.
//!
//! ## What we do
//!
//! - **Warm-up**: every worker goes through [`wait_until_ready`], a bare TCP
//!   connect loop that fails fast with [`DispatchError::FatalStartup`] when
//!   the process dies before its port opens.
//! - **Dispatch**: [`WorkerPool::dispatch_ordered`] keeps a sliding window of
//!   requests in flight, routes each batch to any ready worker with spare
//!   capacity, and hands results back in submission order through a
//!   [`ReorderBuffer`].
//! - **Failure**: a failed request is tagged with its batch index. Nothing is
//!   retried inside the pool; callers opt in through [`retry`].
//!
//! ```ignore
//! use dispatch::{PoolConfig, WorkerPool};
//!
//! let pool = WorkerPool::attach(PoolConfig::default(), &endpoints).await?;
//! let results = pool.dispatch_ordered(batches).await?;
//! pool.shutdown().await;
//! ```

mod error;
mod pool;
mod process;
mod readiness;
mod reorder;
pub mod retry;
mod rpc;
mod types;
mod worker;

pub use crate::error::{DispatchError, RpcError};
pub use crate::pool::{
    PoolConfig, WorkerPool, WorkerSpec, DEFAULT_ALLOW_CONCURRENT_INPUTS, DEFAULT_N_GPU,
};
pub use crate::process::{ChildProcess, ExternalProcess, LaunchSpec, ProcessState, WorkerProcess};
pub use crate::readiness::{wait_until_ready, ReadinessConfig};
pub use crate::reorder::ReorderBuffer;
pub use crate::retry::{retry_async, RetryConfig, RetryResult};
pub use crate::rpc::{ensure_aligned, parse_embeddings, HttpInferenceClient, InferenceClient};
pub use crate::types::EmbeddingResult;
pub use crate::worker::WorkerHandle;
