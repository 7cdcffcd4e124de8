//! Bounded capture worker pool with a caller-runs overflow policy.
//!
//! Jobs run on tokio's blocking thread pool, gated by a semaphore so at most
//! `size` captures execute concurrently. When every permit is taken the job
//! runs inline on the submitting task instead of being dropped or queued
//! without bound.
//!
//! On a multi-thread runtime the inline job runs under
//! [`tokio::task::block_in_place`], so a hung capture only holds the
//! submitting task and the runtime moves its other tasks to another worker.
//! A current-thread runtime has nowhere to move them; use a multi-thread
//! runtime whenever more than one device is captured.

use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Semaphore;

/// Where a submitted job ended up running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a pool worker.
    Pooled,
    /// Pool saturated; executed on the caller.
    CallerRuns,
}

#[derive(Debug)]
pub(crate) struct WorkerPool {
    runtime: Handle,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub(crate) fn new(runtime: Handle, size: usize) -> Self {
        let size = size.max(1);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Workers currently busy.
    pub(crate) fn busy(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    pub(crate) fn execute<F>(&self, job: F) -> Dispatch
    where
        F: FnOnce() + Send + 'static,
    {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                self.runtime.spawn_blocking(move || {
                    let _permit = permit;
                    job();
                });
                Dispatch::Pooled
            }
            Err(_) => {
                let on_multi_thread = Handle::try_current()
                    .is_ok_and(|h| h.runtime_flavor() == RuntimeFlavor::MultiThread);
                if on_multi_thread {
                    tokio::task::block_in_place(job);
                } else {
                    job();
                }
                Dispatch::CallerRuns
            }
        }
    }
}
