//! Minimap-to-world-map recognizer.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::{PositionResult, PositionSource, RecognizerConfig, WalkerCache, WorldMap};
use crate::cache::FrameCache;
use crate::coord::{PixelPoint, PixelRect};
use crate::frame::{DeviceId, Frame};
use crate::matcher::{MatchCandidate, Template, TemplateMatcher};

/// The minimap crop and the player marker's offset inside it.
struct MinimapCrop {
    template: Template,
    marker: PixelPoint,
}

/// Recognizes player positions from cached frames.
///
/// Each device has its own loaded map and [`WalkerCache`]; recognitions for
/// different devices never touch each other's state.
pub struct PositionRecognizer {
    cache: Arc<FrameCache>,
    config: RecognizerConfig,
    matcher: TemplateMatcher,
    maps: DashMap<DeviceId, Arc<WorldMap>>,
    walkers: DashMap<DeviceId, WalkerCache>,
}

impl PositionRecognizer {
    pub fn new(cache: Arc<FrameCache>, config: RecognizerConfig) -> Self {
        Self {
            cache,
            config,
            matcher: TemplateMatcher::new(),
            maps: DashMap::new(),
            walkers: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Set the map segment a device is currently in.
    ///
    /// Forgets the device's previous recognition.
    pub fn load_map(&self, device: &DeviceId, map: Arc<WorldMap>) {
        info!(device = %device, map = map.name(), "Loaded world map");
        self.maps.insert(device.clone(), map);
        self.walkers.remove(device);
    }

    pub fn map(&self, device: &DeviceId) -> Option<Arc<WorldMap>> {
        self.maps.get(device).map(|m| Arc::clone(m.value()))
    }

    pub fn walker_cache(&self, device: &DeviceId) -> Option<WalkerCache> {
        self.walkers.get(device).map(|w| w.value().clone())
    }

    /// Drop the device's recognition memory.
    pub fn reset(&self, device: &DeviceId) {
        self.walkers.remove(device);
    }

    /// Recognize the device's position from its newest cached frame.
    pub fn locate(&self, device: &DeviceId, region_size: u32) -> PositionResult {
        let region_size = region_size.max(1);
        let unknown = PositionResult::unknown(region_size);

        let Some(frame) = self.cache.get(device) else {
            debug!(device = %device, "No cached frame, position unknown");
            return unknown;
        };
        let Some(map) = self.map(device) else {
            debug!(device = %device, "No map loaded, position unknown");
            return unknown;
        };

        let previous = self
            .walker_cache(device)
            .filter(|w| w.map_name() == map.name());
        if let Some(prev) = &previous {
            if prev.is_same_frame(map.name(), frame.sequence(), region_size) {
                return prev.last_result();
            }
        }

        let Some(crop) = self.minimap_crop(&frame, region_size) else {
            debug!(device = %device, region_size, "Minimap crop is empty or blank");
            return unknown;
        };

        let anchor = previous
            .as_ref()
            .map(WalkerCache::last_result)
            .filter(|r| r.is_reliable(self.config.min_confidence));
        let matches = self.search(&crop.template, &map, anchor);

        let result = match matches.first() {
            None => unknown,
            Some(_) if previous.as_ref().is_some_and(|p| p.same_matches(&matches)) => {
                // Same placements as last time; the position has not moved.
                previous.as_ref().map_or(unknown, WalkerCache::last_result)
            }
            Some(best) => self.position_from(best, &crop, &map, region_size),
        };

        debug!(
            device = %device,
            tile = %result.tile,
            confidence = result.confidence,
            candidates = matches.len(),
            "Recognized position"
        );

        self.walkers.insert(
            device.clone(),
            WalkerCache::new(map.name(), frame.sequence(), &matches, result),
        );
        result
    }

    fn minimap_crop(&self, frame: &Frame, region_size: u32) -> Option<MinimapCrop> {
        let center = self.config.minimap.center;
        let half = (region_size / 2) as i32;
        let x = (center.x - half).max(0) as u32;
        let y = (center.y - half).max(0) as u32;
        let rect = PixelRect::new(x, y, region_size, region_size)
            .clamp_to(frame.width(), frame.height())?;

        let pixels =
            image::imageops::crop_imm(frame.matrix(), rect.x, rect.y, rect.width, rect.height)
                .to_image();
        let template = Template::from_rgba32f(&pixels);
        if template.opaque_pixels() == 0 || template.is_flat() {
            return None;
        }
        Some(MinimapCrop {
            template,
            marker: PixelPoint::new(center.x - rect.x as i32, center.y - rect.y as i32),
        })
    }

    fn search(
        &self,
        template: &Template,
        map: &WorldMap,
        anchor: Option<PositionResult>,
    ) -> Vec<MatchCandidate> {
        let cfg = &self.config;

        if let Some(anchor) = anchor {
            let side = template.width().max(template.height()) * cfg.search_window_factor.max(1);
            let half = (side / 2) as i32;
            let window = PixelRect::new(
                (anchor.point.x - half).max(0) as u32,
                (anchor.point.y - half).max(0) as u32,
                side,
                side,
            );
            let local = self.matcher.match_in_region(
                template,
                map.image(),
                window,
                cfg.match_threshold,
                cfg.top_matches,
            );
            if local
                .first()
                .is_some_and(|m| m.score >= cfg.min_confidence)
            {
                return local;
            }
            debug!(near = %anchor.tile, "Windowed search failed, searching full map");
        }

        self.matcher
            .match_all_limited(template, map.image(), cfg.match_threshold, cfg.top_matches)
    }

    fn position_from(
        &self,
        best: &MatchCandidate,
        crop: &MinimapCrop,
        map: &WorldMap,
        region_size: u32,
    ) -> PositionResult {
        let point = PixelPoint::new(best.rect.x as i32, best.rect.y as i32)
            .offset(crop.marker.x, crop.marker.y);
        PositionResult {
            point,
            tile: map.transform().tile_at(point),
            confidence: best.score,
            region_size,
        }
    }
}

impl PositionSource for PositionRecognizer {
    fn locate(&self, device: &DeviceId, region_size: u32) -> PositionResult {
        PositionRecognizer::locate(self, device, region_size)
    }

    fn min_confidence(&self) -> f32 {
        self.config.min_confidence
    }
}
