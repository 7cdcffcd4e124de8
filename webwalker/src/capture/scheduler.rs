//! Per-device periodic capture scheduling.
//!
//! Each online, active device gets one timer task on the tokio runtime. A
//! tick submits a capture-and-store job to the shared [`WorkerPool`], so a
//! capture that hangs only ties up a worker and never the timers of other
//! devices.
//!
//! Lifecycle changes (`start`, `stop`, refresh-rate restarts) are serialized
//! through a single lifecycle lock; the task map itself is a `DashMap` keyed
//! by device, which gives atomic insert-if-absent for `start`.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pool::{Dispatch, WorkerPool};
use super::{CaptureConfig, CaptureStats, DeviceRegistry, ScreenCapture};
use crate::cache::FrameCache;
use crate::config::SharedSettings;
use crate::frame::{is_placeholder, DeviceId, Frame};

/// Shortest period accepted by [`CaptureScheduler::spawn_reconciler`].
const MIN_RECONCILE_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to one device's recurring capture job.
#[derive(Debug)]
struct CaptureTask {
    token: CancellationToken,
    period: Duration,
    _handle: JoinHandle<()>,
}

/// State shared by every timer task and capture job.
struct CaptureContext {
    capture: Arc<dyn ScreenCapture>,
    cache: Arc<FrameCache>,
    pool: WorkerPool,
    frames_stored: AtomicU64,
    failures: AtomicU64,
    placeholders: AtomicU64,
    overflow_runs: AtomicU64,
}

impl CaptureContext {
    /// Capture one frame and store it. Never panics, never propagates.
    fn capture_and_store(&self, device: &DeviceId, token: &CancellationToken) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.capture.capture(device)));

        let image = match result {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(device = %device, error = %e, "Capture failed, skipping frame");
                return;
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(device = %device, "Capture backend panicked, skipping frame");
                return;
            }
        };

        if is_placeholder(&image) {
            self.placeholders.fetch_add(1, Ordering::Relaxed);
            debug!(device = %device, "Placeholder frame received, skipping");
            return;
        }

        // Checked under the cache entry lock; stop() cancels before it clears.
        let frame = Frame::new(device.clone(), image);
        match self.cache.put_if(device, frame, || !token.is_cancelled()) {
            Ok(evicted) => {
                drop(evicted);
                self.frames_stored.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => debug!(device = %device, "Capture finished after stop, discarding"),
        }
    }
}

/// Outcome of one [`CaptureScheduler::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<DeviceId>,
    pub stopped: Vec<DeviceId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// Periodic per-device capture scheduler.
pub struct CaptureScheduler {
    runtime: Handle,
    ctx: Arc<CaptureContext>,
    settings: SharedSettings,
    tasks: DashMap<DeviceId, CaptureTask>,
    lifecycle: Mutex<()>,
}

impl std::fmt::Debug for CaptureScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureScheduler")
            .field("tasks", &self.tasks.len())
            .field("workers", &self.ctx.pool.size())
            .finish_non_exhaustive()
    }
}

impl CaptureScheduler {
    /// Create a scheduler that spawns its tasks on `runtime`.
    pub fn new(
        runtime: Handle,
        capture: Arc<dyn ScreenCapture>,
        cache: Arc<FrameCache>,
        settings: SharedSettings,
        config: CaptureConfig,
    ) -> Self {
        info!(
            workers = config.workers,
            refresh_ms = settings.refresh_rate_ms(),
            "Capture scheduler created"
        );
        let ctx = CaptureContext {
            capture,
            cache,
            pool: WorkerPool::new(runtime.clone(), config.workers),
            frames_stored: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            placeholders: AtomicU64::new(0),
            overflow_runs: AtomicU64::new(0),
        };
        Self {
            runtime,
            ctx: Arc::new(ctx),
            settings,
            tasks: DashMap::new(),
            lifecycle: Mutex::new(()),
        }
    }

    /// The frame cache this scheduler writes into.
    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.ctx.cache
    }

    fn spawn_task(&self, device: DeviceId, period: Duration) -> CaptureTask {
        let token = CancellationToken::new();
        let handle = self.runtime.spawn(run_capture_loop(
            Arc::clone(&self.ctx),
            device,
            period,
            token.clone(),
        ));
        CaptureTask {
            token,
            period,
            _handle: handle,
        }
    }

    /// Start capturing `device`. Returns false if it already has a task.
    pub fn start(&self, device: &DeviceId) -> bool {
        let _guard = self.lifecycle.lock();
        match self.tasks.entry(device.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let period = self.settings.refresh_interval();
                slot.insert(self.spawn_task(device.clone(), period));
                info!(device = %device, period_ms = period.as_millis() as u64, "Capture started");
                true
            }
        }
    }

    /// Stop capturing `device` and drop its cached frames.
    ///
    /// A capture already running is allowed to finish; its frame is discarded.
    pub fn stop(&self, device: &DeviceId) -> bool {
        let _guard = self.lifecycle.lock();
        let Some((_, task)) = self.tasks.remove(device) else {
            return false;
        };
        task.token.cancel();
        self.ctx.cache.clear(device);
        info!(device = %device, "Capture stopped");
        true
    }

    /// Stop every task.
    pub fn shutdown(&self) {
        let _guard = self.lifecycle.lock();
        for entry in self.tasks.iter() {
            entry.token.cancel();
        }
        self.tasks.clear();
    }

    /// Publish a new refresh rate and restart all tasks at that interval.
    pub fn update_refresh_rate(&self, ms: u64) {
        self.settings.set_refresh_rate(ms);
        self.restart_all();
    }

    /// Restart every task whose period differs from the current setting.
    fn restart_all(&self) {
        let _guard = self.lifecycle.lock();
        let period = self.settings.refresh_interval();
        let mut restarted = 0usize;
        for mut entry in self.tasks.iter_mut() {
            if entry.period == period {
                continue;
            }
            entry.token.cancel();
            let device = entry.key().clone();
            *entry.value_mut() = self.spawn_task(device, period);
            restarted += 1;
        }
        if restarted > 0 {
            info!(
                restarted,
                period_ms = period.as_millis() as u64,
                "Capture tasks restarted with new refresh rate"
            );
        }
    }

    /// Follow external refresh-rate changes published through the settings.
    pub fn watch_refresh_rate(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let mut rx = self.settings.subscribe_refresh_rate();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let ms = *rx.borrow_and_update();
                        debug!(refresh_ms = ms, "Refresh rate changed");
                        scheduler.restart_all();
                    }
                }
            }
        })
    }

    /// Bring running tasks in line with the devices that should be captured.
    ///
    /// Level-triggered: calling it repeatedly with the same input is a no-op.
    pub fn reconcile<F>(&self, online: &[DeviceId], is_active: F) -> ReconcileReport
    where
        F: Fn(&DeviceId) -> bool,
    {
        let wanted: HashSet<&DeviceId> = online.iter().filter(|d| is_active(*d)).collect();
        let mut report = ReconcileReport::default();

        for device in self.active_devices() {
            if !wanted.contains(&device) && self.stop(&device) {
                report.stopped.push(device);
            }
        }
        for device in wanted {
            if self.start(device) {
                report.started.push(device.clone());
            }
        }

        if !report.is_empty() {
            debug!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                "Capture reconcile"
            );
        }
        report
    }

    /// Periodically reconcile against `registry` until `shutdown` fires.
    pub fn spawn_reconciler(
        self: &Arc<Self>,
        registry: Arc<dyn DeviceRegistry>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let every = every.max(MIN_RECONCILE_INTERVAL);
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = registry.online_devices();
                        scheduler.reconcile(&online, |d| registry.is_active(d));
                    }
                }
            }
        })
    }

    /// Devices with a running task.
    pub fn active_devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.tasks.iter().map(|e| e.key().clone()).collect();
        devices.sort();
        devices
    }

    pub fn is_running(&self, device: &DeviceId) -> bool {
        self.tasks.contains_key(device)
    }

    /// Current capture counters.
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_stored: self.ctx.frames_stored.load(Ordering::Relaxed),
            failures: self.ctx.failures.load(Ordering::Relaxed),
            placeholders: self.ctx.placeholders.load(Ordering::Relaxed),
            overflow_runs: self.ctx.overflow_runs.load(Ordering::Relaxed),
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.token.cancel();
        }
    }
}

async fn run_capture_loop(
    ctx: Arc<CaptureContext>,
    device: DeviceId,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let job_ctx = Arc::clone(&ctx);
                let job_device = device.clone();
                let job_token = token.clone();
                let dispatch = ctx.pool.execute(move || {
                    job_ctx.capture_and_store(&job_device, &job_token);
                });
                if dispatch == Dispatch::CallerRuns {
                    ctx.overflow_runs.fetch_add(1, Ordering::Relaxed);
                    debug!(device = %device, "Capture pool saturated, ran capture inline");
                }
            }
        }
    }

    debug!(device = %device, "Capture loop exited");
}
