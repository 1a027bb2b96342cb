use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::SemaphorePermit;

use crate::process::WorkerProcess;
use crate::rpc::InferenceClient;

/// One live worker in the pool.
///
/// The client and process are owned by this slot and never shared with other
/// workers. `in_flight` is the only field touched by concurrent dispatches; the
/// available capacity is `capacity - in_flight`.
pub struct WorkerHandle {
    id: usize,
    endpoint: String,
    capacity: usize,
    ready: AtomicBool,
    in_flight: AtomicUsize,
    client: Box<dyn InferenceClient>,
    pub(crate) process: Box<dyn WorkerProcess>,
}

impl WorkerHandle {
    pub(crate) fn new(
        id: usize,
        endpoint: String,
        capacity: usize,
        client: Box<dyn InferenceClient>,
        process: Box<dyn WorkerProcess>,
    ) -> Self {
        Self {
            id,
            endpoint,
            capacity,
            ready: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            client,
            process,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Maximum concurrent batches this worker accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub(crate) fn client(&self) -> &dyn InferenceClient {
        self.client.as_ref()
    }

    /// Claim one capacity slot if the worker is ready and has room.
    ///
    /// The returned guard gives the slot back when dropped, whether the request
    /// succeeded, failed, or was cancelled mid-flight.
    pub(crate) fn try_claim<'a>(&'a self, permit: SemaphorePermit<'a>) -> Result<SlotGuard<'a>, SemaphorePermit<'a>> {
        if !self.is_ready() {
            return Err(permit);
        }
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                return Err(permit);
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(SlotGuard {
                        worker: self,
                        _permit: permit,
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("capacity", &self.capacity)
            .field("ready", &self.is_ready())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// A claimed capacity slot on one worker plus its pool-wide permit.
///
/// Drop order matters: the worker slot is released in `Drop::drop`, before the
/// permit field is dropped, so the pool never hands out a permit whose slot is
/// still counted as busy.
pub(crate) struct SlotGuard<'a> {
    worker: &'a WorkerHandle,
    _permit: SemaphorePermit<'a>,
}

impl<'a> SlotGuard<'a> {
    pub(crate) fn worker(&self) -> &'a WorkerHandle {
        self.worker
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.worker.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
