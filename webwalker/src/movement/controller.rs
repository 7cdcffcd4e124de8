//! Blocking movement controller.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MoveRequest, MoveState, MovementConfig, MovementError, JITTER_RANGE};
use crate::capture::InputCommand;
use crate::coord::Tile;
use crate::frame::DeviceId;
use crate::graph::NavigationGraph;
use crate::recognizer::{MinimapGeometry, PositionResult, PositionSource};

/// Moves the player by tapping the minimap and watching the recognized
/// position.
pub struct MovementController {
    source: Arc<dyn PositionSource>,
    input: Arc<dyn InputCommand>,
    graph: Arc<NavigationGraph>,
    minimap: MinimapGeometry,
    config: MovementConfig,
    tokens: DashMap<DeviceId, CancellationToken>,
    states: DashMap<DeviceId, MoveState>,
}

impl MovementController {
    pub fn new(
        source: Arc<dyn PositionSource>,
        input: Arc<dyn InputCommand>,
        graph: Arc<NavigationGraph>,
        minimap: MinimapGeometry,
        config: MovementConfig,
    ) -> Self {
        Self {
            source,
            input,
            graph,
            minimap,
            config,
            tokens: DashMap::new(),
            states: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<NavigationGraph> {
        &self.graph
    }

    /// State of the device's most recent request.
    pub fn state(&self, device: &DeviceId) -> MoveState {
        self.states.get(device).map(|s| *s).unwrap_or_default()
    }

    /// Token observed by the device's current and future requests until the
    /// next [`cancel`](Self::cancel).
    pub fn cancellation_token(&self, device: &DeviceId) -> CancellationToken {
        self.tokens
            .entry(device.clone())
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// Abort whatever the device is doing.
    ///
    /// Requests already running see the cancellation at their next iteration;
    /// requests started afterwards get a fresh token.
    pub fn cancel(&self, device: &DeviceId) {
        if let Some(old) = self.tokens.insert(device.clone(), CancellationToken::new()) {
            old.cancel();
        }
        info!(device = %device, "Movement cancelled");
    }

    /// Walk to a tile visible on the minimap.
    pub fn move_to(
        &self,
        destination: Tile,
        device: &DeviceId,
        request: MoveRequest,
    ) -> Result<(), MovementError> {
        let token = self.cancellation_token(device);
        self.tracked(device, || self.step(destination, device, request, &token))
    }

    /// Follow `path` point by point.
    ///
    /// Starts at the path point nearest the player. A point that cannot be
    /// reached is skipped when the next one is already visible.
    pub fn walk_path(&self, path: &[Tile], device: &DeviceId) -> Result<(), MovementError> {
        let token = self.cancellation_token(device);
        self.tracked(device, || self.follow(path, device, &token))
    }

    /// Walk anywhere reachable through the navigation graph.
    ///
    /// With `step_to_end` the walk finishes with a precise move onto
    /// `destination` itself rather than its nearest graph node.
    pub fn web_walk(
        &self,
        destination: Tile,
        device: &DeviceId,
        step_to_end: bool,
    ) -> Result<(), MovementError> {
        let token = self.cancellation_token(device);
        self.tracked(device, || {
            let here = self.sample_reliable(device)?;
            let path = self.graph.build_tile_path(here.tile, destination, false)?;
            info!(
                device = %device,
                from = %here.tile,
                to = %destination,
                points = path.len(),
                "Web walking"
            );
            self.follow(&path, device, &token)?;
            if step_to_end {
                self.step(destination, device, MoveRequest::fine(&self.config), &token)?;
            }
            Ok(())
        })
    }

    fn tracked(
        &self,
        device: &DeviceId,
        run: impl FnOnce() -> Result<(), MovementError>,
    ) -> Result<(), MovementError> {
        self.states.insert(device.clone(), MoveState::Moving);
        let result = run();
        let state = if result.is_ok() {
            MoveState::Reached
        } else {
            MoveState::Failed
        };
        self.states.insert(device.clone(), state);
        if let Err(e) = &result {
            debug!(device = %device, error = %e, "Movement failed");
        }
        result
    }

    fn locate(&self, device: &DeviceId) -> PositionResult {
        self.source.locate(device, self.config.region_size)
    }

    fn is_reliable(&self, position: &PositionResult) -> bool {
        position.is_reliable(self.source.min_confidence())
    }

    fn sample_reliable(&self, device: &DeviceId) -> Result<PositionResult, MovementError> {
        let here = self.locate(device);
        if self.is_reliable(&here) {
            Ok(here)
        } else {
            Err(MovementError::LowConfidence {
                confidence: here.confidence,
            })
        }
    }

    /// Minimap pixel distance between two tiles; infinite across planes.
    fn pixel_distance(&self, from: Tile, to: Tile) -> f64 {
        match from.distance(&to) {
            Some(tiles) => tiles * self.minimap.pixels_per_tile as f64,
            None => f64::INFINITY,
        }
    }

    fn in_view(&self, from: Tile, to: Tile) -> bool {
        from.same_plane(&to) && self.minimap.contains_offset(to.x - from.x, to.y - from.y)
    }

    fn step(
        &self,
        destination: Tile,
        device: &DeviceId,
        request: MoveRequest,
        token: &CancellationToken,
    ) -> Result<(), MovementError> {
        if token.is_cancelled() {
            return Err(MovementError::Cancelled);
        }

        let here = self.sample_reliable(device)?;
        if !self.in_view(here.tile, destination) {
            return Err(MovementError::OutOfView { destination });
        }

        let mut target = self
            .minimap
            .screen_point(destination.x - here.tile.x, destination.y - here.tile.y);
        if request.jitter {
            let mut rng = rand::rng();
            target = target.offset(
                rng.random_range(-JITTER_RANGE..=JITTER_RANGE),
                rng.random_range(-JITTER_RANGE..=JITTER_RANGE),
            );
        }

        debug!(device = %device, from = %here.tile, to = %destination, tap = %target, "Moving");
        if let Err(e) = self.input.tap(device, target.x, target.y) {
            warn!(device = %device, error = %e, "Tap failed");
        }

        // At least one sample is always taken after the tap.
        let max_attempts = request.max_attempts.max(1);
        let mut attempts = 0u32;
        loop {
            if token.is_cancelled() {
                return Err(MovementError::Cancelled);
            }

            let position = self.locate(device);
            let delay = if self.is_reliable(&position) {
                let distance = self.pixel_distance(position.tile, destination);
                if distance <= request.tolerance {
                    debug!(device = %device, tile = %position.tile, attempts, "Reached");
                    return Ok(());
                }
                self.config.backoff.delay_for(distance)
            } else {
                self.config.backoff.far
            };

            attempts += 1;
            if attempts >= max_attempts {
                return Err(MovementError::Timeout { attempts });
            }
            pause(delay);
        }
    }

    fn follow(
        &self,
        path: &[Tile],
        device: &DeviceId,
        token: &CancellationToken,
    ) -> Result<(), MovementError> {
        if path.is_empty() {
            return Err(MovementError::EmptyPath);
        }
        if token.is_cancelled() {
            return Err(MovementError::Cancelled);
        }

        let here = self.sample_reliable(device)?;
        let mut index = self.start_index(path, here.tile);
        let request = MoveRequest::from(&self.config);

        while index < path.len() {
            match self.step(path[index], device, request, token) {
                Ok(()) => index += 1,
                Err(MovementError::Timeout { .. } | MovementError::OutOfView { .. }) => {
                    let next_visible = path
                        .get(index + 1)
                        .is_some_and(|&next| self.next_in_view(device, next));
                    if !next_visible {
                        return Err(MovementError::PathBlocked { index });
                    }
                    warn!(device = %device, index, tile = %path[index], "Skipping unreachable path point");
                    index += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Index to resume a path from: the nearest same-plane point, or the one
    /// after it when the player is already there.
    fn start_index(&self, path: &[Tile], here: Tile) -> usize {
        let nearest = path
            .iter()
            .enumerate()
            .filter_map(|(i, t)| here.distance(t).map(|d| (i, d)))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, b)) if b <= d => best,
                _ => Some((i, d)),
            });

        match nearest {
            Some((i, d)) if d <= self.config.close_threshold as f64 => i + 1,
            Some((i, _)) => i,
            None => 0,
        }
    }

    fn next_in_view(&self, device: &DeviceId, next: Tile) -> bool {
        let here = self.locate(device);
        self.is_reliable(&here) && self.in_view(here.tile, next)
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
