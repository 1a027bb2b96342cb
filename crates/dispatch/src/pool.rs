use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use corpus::Batch;
use futures::future::try_join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tracing::{debug, info, warn};

use crate::error::{DispatchError, RpcError};
use crate::process::{ExternalProcess, LaunchSpec, WorkerProcess};
use crate::readiness::{wait_until_ready, ReadinessConfig};
use crate::reorder::ReorderBuffer;
use crate::rpc::{ensure_aligned, HttpInferenceClient, InferenceClient};
use crate::types::EmbeddingResult;
use crate::worker::{SlotGuard, WorkerHandle};

pub const DEFAULT_N_GPU: usize = 6;
pub const DEFAULT_ALLOW_CONCURRENT_INPUTS: usize = 100;

/// Sizing and timing for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on the number of workers.
    pub n_gpu: usize,
    /// In-flight batches each worker accepts.
    pub allow_concurrent_inputs: usize,
    pub readiness: ReadinessConfig,
    /// Per-request timeout for HTTP workers.
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            n_gpu: DEFAULT_N_GPU,
            allow_concurrent_inputs: DEFAULT_ALLOW_CONCURRENT_INPUTS,
            readiness: ReadinessConfig::default(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.n_gpu == 0 {
            return Err(DispatchError::InvalidConfig("n_gpu must be at least 1".into()));
        }
        if self.allow_concurrent_inputs == 0 {
            return Err(DispatchError::InvalidConfig(
                "allow_concurrent_inputs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Window size of [`WorkerPool::dispatch_ordered`] with every worker up.
    pub fn max_in_flight(&self) -> usize {
        self.n_gpu.saturating_mul(self.allow_concurrent_inputs)
    }
}

/// Everything the pool needs to bring one worker online.
pub struct WorkerSpec {
    /// Base URL reported in logs and by [`WorkerHandle::endpoint`].
    pub endpoint: String,
    /// `host:port` the readiness gate connects to.
    pub probe_addr: String,
    pub client: Box<dyn InferenceClient>,
    pub process: Box<dyn WorkerProcess>,
}

/// A fixed set of warmed-up workers with ordered, capacity-bounded dispatch.
///
/// Two counters bound concurrency. The pool-wide semaphore holds one permit
/// per free slot across all ready workers, so a dispatch waits instead of
/// spinning when everything is busy. Each worker's `in_flight` counter is
/// claimed with compare-and-swap, so no worker ever exceeds its own capacity.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    permits: Semaphore,
    cursor: AtomicUsize,
    config: PoolConfig,
}

impl WorkerPool {
    /// Run every worker's readiness gate concurrently and build the pool.
    ///
    /// The first gate to fail aborts warm-up without waiting for its siblings:
    /// all worker processes are terminated and that gate's error is returned.
    pub async fn warm_up(config: PoolConfig, specs: Vec<WorkerSpec>) -> Result<Self, DispatchError> {
        config.validate()?;
        if specs.is_empty() {
            return Err(DispatchError::NoReadyWorkers);
        }
        if specs.len() > config.n_gpu {
            return Err(DispatchError::InvalidConfig(format!(
                "{} workers configured but n_gpu is {}",
                specs.len(),
                config.n_gpu
            )));
        }

        let start = Instant::now();
        let mut probes = Vec::with_capacity(specs.len());
        let mut workers = Vec::with_capacity(specs.len());
        for (id, spec) in specs.into_iter().enumerate() {
            probes.push(spec.probe_addr);
            workers.push(WorkerHandle::new(
                id,
                spec.endpoint,
                config.allow_concurrent_inputs,
                spec.client,
                spec.process,
            ));
        }

        let gates = workers.iter_mut().zip(&probes).map(|(worker, probe)| {
            let id = worker.id();
            wait_until_ready(id, worker.process.as_mut(), probe, &config.readiness)
        });
        let outcome = try_join_all(gates).await;

        if let Err(err) = outcome {
            warn!(error = %err, "pool_warm_up_failed");
            for worker in &mut workers {
                terminate_worker(worker).await;
            }
            return Err(err);
        }

        for worker in &workers {
            worker.set_ready(true);
        }
        let capacity: usize = workers.iter().map(WorkerHandle::capacity).sum();
        info!(
            workers = workers.len(),
            capacity,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pool_ready"
        );

        Ok(Self {
            workers,
            permits: Semaphore::new(capacity),
            cursor: AtomicUsize::new(0),
            config,
        })
    }

    /// Spawn `n_gpu` router processes on consecutive ports and warm them up.
    ///
    /// Worker `i` listens on `base_port + i`. Processes spawned before a
    /// failure are killed when their handles drop.
    pub async fn launch(
        config: PoolConfig,
        launch: &LaunchSpec,
        host: &str,
        base_port: u16,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        let mut specs = Vec::with_capacity(config.n_gpu);
        for worker in 0..config.n_gpu {
            let port = u16::try_from(worker)
                .ok()
                .and_then(|offset| base_port.checked_add(offset))
                .ok_or_else(|| {
                    DispatchError::InvalidConfig(format!(
                        "port range {base_port}+{} overflows",
                        config.n_gpu
                    ))
                })?;
            let endpoint = format!("http://{host}:{port}");
            let client = http_client(&endpoint, config.request_timeout)?;
            let process = launch
                .spawn(port)
                .map_err(|source| DispatchError::Process { worker, source })?;
            specs.push(WorkerSpec {
                endpoint,
                probe_addr: format!("{host}:{port}"),
                client: Box::new(client),
                process: Box::new(process),
            });
        }
        Self::warm_up(config, specs).await
    }

    /// Use endpoints whose processes are managed elsewhere.
    pub async fn attach(config: PoolConfig, endpoints: &[String]) -> Result<Self, DispatchError> {
        let mut specs = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let url = reqwest::Url::parse(endpoint).map_err(|e| {
                DispatchError::InvalidConfig(format!("invalid endpoint {endpoint:?}: {e}"))
            })?;
            let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
                return Err(DispatchError::InvalidConfig(format!(
                    "endpoint {endpoint:?} has no host or port"
                )));
            };
            specs.push(WorkerSpec {
                endpoint: endpoint.clone(),
                probe_addr: format!("{host}:{port}"),
                client: Box::new(http_client(endpoint, config.request_timeout)?),
                process: Box::new(ExternalProcess),
            });
        }
        Self::warm_up(config, specs).await
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Total slots across all workers.
    pub fn capacity(&self) -> usize {
        self.workers.iter().map(WorkerHandle::capacity).sum()
    }

    /// Slots currently free.
    pub fn available_capacity(&self) -> usize {
        self.permits.available_permits()
    }

    /// Requests currently outstanding across all workers.
    pub fn in_flight(&self) -> usize {
        self.workers.iter().map(WorkerHandle::in_flight).sum()
    }

    /// Send every batch to some ready worker and collect results in input order.
    ///
    /// Keeps up to [`capacity`](Self::capacity) requests in flight. After the
    /// first failure no further batches are submitted; requests already in
    /// flight run to completion, then the failure with the lowest batch index
    /// is returned.
    pub async fn dispatch_ordered<I>(&self, batches: I) -> Result<Vec<EmbeddingResult>, DispatchError>
    where
        I: IntoIterator<Item = Batch>,
    {
        let start = Instant::now();
        let mut batches = batches.into_iter().peekable();
        let mut pending = FuturesUnordered::new();
        let mut reorder = ReorderBuffer::new();
        let mut results = Vec::with_capacity(batches.size_hint().0);
        let mut failure: Option<(u64, RpcError)> = None;
        let mut submitted = 0u64;
        let mut total_chars = 0u64;

        loop {
            while failure.is_none() && batches.peek().is_some() {
                let permit = match self.permits.try_acquire() {
                    Ok(permit) => permit,
                    Err(TryAcquireError::NoPermits) if !pending.is_empty() => break,
                    Err(TryAcquireError::NoPermits) => self
                        .permits
                        .acquire()
                        .await
                        .map_err(|_| DispatchError::PoolClosed)?,
                    Err(TryAcquireError::Closed) => return Err(DispatchError::PoolClosed),
                };
                let slot = self.claim(permit)?;
                let Some(batch) = batches.next() else {
                    break;
                };
                pending.push(self.run_batch(submitted, slot, batch));
                submitted += 1;
            }

            let Some((position, index, outcome)) = pending.next().await else {
                break;
            };
            match outcome {
                Ok(result) => {
                    total_chars += result.n_chars;
                    reorder.insert(position, result);
                    while let Some(ready) = reorder.pop_ready() {
                        results.push(ready);
                    }
                }
                Err(source) => {
                    let lower = failure.as_ref().is_none_or(|(first, _)| index < *first);
                    if lower {
                        failure = Some((index, source));
                    }
                }
            }
        }

        if let Some((index, source)) = failure {
            warn!(
                batch = index,
                submitted,
                completed = results.len() + reorder.len(),
                error = %source,
                "dispatch_failed"
            );
            return Err(DispatchError::Batch { index, source });
        }

        info!(
            batches = results.len(),
            total_chars,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dispatch_complete"
        );
        Ok(results)
    }

    /// Stop accepting work and terminate every worker process.
    pub async fn shutdown(mut self) {
        for worker in &self.workers {
            worker.set_ready(false);
        }
        self.permits.close();
        for worker in &mut self.workers {
            terminate_worker(worker).await;
        }
        info!(workers = self.workers.len(), "pool_shutdown");
    }

    /// Claim a slot on the next worker with room, rotating the starting point
    /// so load spreads across workers.
    fn claim<'a>(&'a self, mut permit: SemaphorePermit<'a>) -> Result<SlotGuard<'a>, DispatchError> {
        let n = self.workers.len();
        let first = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..n {
            let worker = &self.workers[(first + offset) % n];
            match worker.try_claim(permit) {
                Ok(slot) => return Ok(slot),
                Err(returned) => permit = returned,
            }
        }
        Err(DispatchError::NoReadyWorkers)
    }

    async fn run_batch<'a>(
        &'a self,
        position: u64,
        slot: SlotGuard<'a>,
        batch: Batch,
    ) -> (u64, u64, Result<EmbeddingResult, RpcError>) {
        let worker = slot.worker();
        let start = Instant::now();
        let n_chars = batch.n_chars();

        let outcome = worker
            .client()
            .embed(&batch.chunks)
            .await
            .and_then(|embeddings| {
                ensure_aligned(batch.len(), &embeddings)?;
                Ok(EmbeddingResult { embeddings, n_chars })
            });
        drop(slot);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => debug!(
                worker = worker.id(),
                batch = batch.index,
                n_chars,
                elapsed_ms,
                "batch_embedded"
            ),
            Err(err) => warn!(
                worker = worker.id(),
                batch = batch.index,
                elapsed_ms,
                error = %err,
                "batch_failed"
            ),
        }
        (position, batch.index, outcome)
    }
}

fn http_client(endpoint: &str, timeout: Duration) -> Result<HttpInferenceClient, DispatchError> {
    HttpInferenceClient::new(endpoint, timeout).map_err(|e| {
        DispatchError::InvalidConfig(format!("cannot build client for {endpoint}: {e}"))
    })
}

async fn terminate_worker(worker: &mut WorkerHandle) {
    let id = worker.id();
    if let Err(err) = worker.process.terminate().await {
        warn!(worker = id, error = %err, "worker_terminate_failed");
    }
}
