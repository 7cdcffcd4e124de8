//! Automation scripts.
//!
//! A [`Script`] is a trait object handed to the [`ScriptRunner`], which runs
//! it on a dedicated thread for one device. Scripts reach the engine only
//! through their [`ScriptContext`] and are stopped through the device's
//! movement cancellation token, so a stop request also aborts any walk the
//! script is in the middle of.

use std::sync::Arc;
use std::thread::JoinHandle;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::frame::DeviceId;
use crate::movement::{MovementController, MovementError};
use crate::recognizer::{PositionResult, PositionSource};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Movement(#[from] MovementError),

    #[error("script failed: {0}")]
    Failed(String),

    #[error("failed to spawn script thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("script {0} is already running")]
    AlreadyRunning(DeviceId),

    #[error("script thread panicked")]
    Panicked,
}

/// What the runner should do after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    Continue,
    Finished,
}

/// How a script run ended.
#[derive(Debug)]
pub enum ScriptOutcome {
    Finished,
    Cancelled,
    Failed(ScriptError),
}

/// Engine handles available to a running script.
#[derive(Clone)]
pub struct ScriptContext {
    device: DeviceId,
    movement: Arc<MovementController>,
    position: Arc<dyn PositionSource>,
    token: CancellationToken,
}

impl ScriptContext {
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    /// Current position at the movement controller's region size.
    pub fn locate(&self) -> PositionResult {
        self.position
            .locate(&self.device, self.movement.config().region_size)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A device automation behaviour.
pub trait Script: Send {
    fn name(&self) -> &str;

    /// Called once before the first iteration.
    fn initialize(&mut self, _ctx: &ScriptContext) -> Result<(), ScriptError> {
        Ok(())
    }

    /// One iteration of the script's main loop.
    fn run(&mut self, ctx: &ScriptContext) -> Result<ScriptStatus, ScriptError>;

    /// Called once after the last iteration, however the run ended.
    fn stop(&mut self, _ctx: &ScriptContext) {}
}

/// Runs at most one script per device, each on its own thread.
pub struct ScriptRunner {
    movement: Arc<MovementController>,
    position: Arc<dyn PositionSource>,
    running: DashMap<DeviceId, JoinHandle<ScriptOutcome>>,
}

impl ScriptRunner {
    pub fn new(movement: Arc<MovementController>, position: Arc<dyn PositionSource>) -> Self {
        Self {
            movement,
            position,
            running: DashMap::new(),
        }
    }

    /// Start `script` for `device`.
    pub fn start(&self, device: &DeviceId, mut script: Box<dyn Script>) -> Result<(), ScriptError> {
        let slot = match self.running.entry(device.clone()) {
            Entry::Occupied(e) if !e.get().is_finished() => {
                return Err(ScriptError::AlreadyRunning(device.clone()));
            }
            entry => entry,
        };

        let ctx = ScriptContext {
            device: device.clone(),
            movement: Arc::clone(&self.movement),
            position: Arc::clone(&self.position),
            token: self.movement.cancellation_token(device),
        };
        let name = script.name().to_string();
        info!(device = %device, script = %name, "Starting script");

        let handle = std::thread::Builder::new()
            .name(format!("script-{}", device))
            .spawn(move || drive(script.as_mut(), &ctx))
            .map_err(ScriptError::Spawn)?;

        match slot {
            Entry::Occupied(mut e) => {
                e.insert(handle);
            }
            Entry::Vacant(e) => {
                e.insert(handle);
            }
        }
        Ok(())
    }

    pub fn is_running(&self, device: &DeviceId) -> bool {
        self.running
            .get(device)
            .is_some_and(|h| !h.is_finished())
    }

    /// Cancel the device's script and wait for it to wind down.
    pub fn stop(&self, device: &DeviceId) -> Option<ScriptOutcome> {
        self.movement.cancel(device);
        self.join(device)
    }

    /// Wait for the device's script to end on its own.
    pub fn join(&self, device: &DeviceId) -> Option<ScriptOutcome> {
        let (_, handle) = self.running.remove(device)?;
        Some(handle.join().unwrap_or_else(|_| {
            warn!(device = %device, "Script thread panicked");
            ScriptOutcome::Failed(ScriptError::Panicked)
        }))
    }
}

fn drive(script: &mut dyn Script, ctx: &ScriptContext) -> ScriptOutcome {
    let outcome = match script.initialize(ctx) {
        Err(e) => classify(e),
        Ok(()) => loop {
            if ctx.is_cancelled() {
                break ScriptOutcome::Cancelled;
            }
            match script.run(ctx) {
                Ok(ScriptStatus::Continue) => {}
                Ok(ScriptStatus::Finished) => break ScriptOutcome::Finished,
                Err(e) => break classify(e),
            }
        },
    };
    script.stop(ctx);
    info!(device = %ctx.device, script = script.name(), outcome = ?outcome, "Script ended");
    outcome
}

fn classify(error: ScriptError) -> ScriptOutcome {
    match error {
        ScriptError::Movement(e) if e.is_cancelled() => ScriptOutcome::Cancelled,
        other => ScriptOutcome::Failed(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{InputCommand, InputError};
    use crate::coord::{PixelPoint, Tile};
    use crate::graph::NavigationGraph;
    use crate::movement::MovementConfig;
    use crate::recognizer::MinimapGeometry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Still;

    impl PositionSource for Still {
        fn locate(&self, _device: &DeviceId, region_size: u32) -> PositionResult {
            PositionResult {
                point: PixelPoint::new(0, 0),
                tile: Tile::new(10, 10, 0),
                confidence: 0.9,
                region_size,
            }
        }

        fn min_confidence(&self) -> f32 {
            0.5
        }
    }

    impl InputCommand for Still {
        fn tap(&self, _device: &DeviceId, _x: i32, _y: i32) -> Result<(), InputError> {
            Ok(())
        }
    }

    fn runner() -> ScriptRunner {
        let still = Arc::new(Still);
        let movement = Arc::new(MovementController::new(
            Arc::clone(&still) as Arc<dyn PositionSource>,
            Arc::clone(&still) as Arc<dyn InputCommand>,
            Arc::new(NavigationGraph::default()),
            MinimapGeometry::default(),
            MovementConfig::default(),
        ));
        ScriptRunner::new(movement, still)
    }

    struct Counter {
        limit: usize,
        runs: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl Script for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn run(&mut self, ctx: &ScriptContext) -> Result<ScriptStatus, ScriptError> {
            assert_eq!(ctx.locate().tile, Tile::new(10, 10, 0));
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.limit {
                return Ok(ScriptStatus::Finished);
            }
            std::thread::sleep(Duration::from_millis(1));
            Ok(ScriptStatus::Continue)
        }

        fn stop(&mut self, _ctx: &ScriptContext) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter(limit: usize) -> (Box<Counter>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let script = Box::new(Counter {
            limit,
            runs: Arc::clone(&runs),
            stops: Arc::clone(&stops),
        });
        (script, runs, stops)
    }

    #[test]
    fn test_script_runs_to_completion() {
        let runner = runner();
        let device = DeviceId::from("emulator-5554");
        let (script, runs, stops) = counter(5);

        runner.start(&device, script).unwrap();
        let outcome = runner.join(&device).unwrap();

        assert!(matches!(outcome, ScriptOutcome::Finished));
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!runner.is_running(&device));
    }

    #[test]
    fn test_stop_cancels_script() {
        let runner = runner();
        let device = DeviceId::from("emulator-5556");
        let (script, runs, stops) = counter(usize::MAX);

        runner.start(&device, script).unwrap();
        while runs.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(runner.is_running(&device));

        let outcome = runner.stop(&device).unwrap();
        assert!(matches!(outcome, ScriptOutcome::Cancelled));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_script_per_device() {
        let runner = runner();
        let device = DeviceId::from("emulator-5558");
        let (first, runs, _) = counter(usize::MAX);
        let (second, _, _) = counter(1);

        runner.start(&device, first).unwrap();
        while runs.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(
            runner.start(&device, second),
            Err(ScriptError::AlreadyRunning(_))
        ));
        runner.stop(&device);
    }

    #[test]
    fn test_failure_is_reported() {
        struct Broken;
        impl Script for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn run(&mut self, _ctx: &ScriptContext) -> Result<ScriptStatus, ScriptError> {
                Err(ScriptError::Failed("no bank in sight".into()))
            }
        }

        let runner = runner();
        let device = DeviceId::from("emulator-5560");
        runner.start(&device, Box::new(Broken)).unwrap();
        assert!(matches!(
            runner.join(&device),
            Some(ScriptOutcome::Failed(ScriptError::Failed(_)))
        ));
    }
}
