//! INI configuration file.
//!
//! ```ini
//! [capture]
//! refresh_rate_ms = 500
//! workers = 4
//! frame_capacity = 5
//! reconcile_interval_ms = 2000
//!
//! [recognition]
//! minimap_x = 815
//! minimap_y = 85
//! minimap_radius = 70
//! minimap_pixels_per_tile = 4
//! match_threshold = 0.5
//! min_confidence = 0.7
//! top_matches = 5
//! region_size = 60
//! search_window_factor = 3
//!
//! [movement]
//! tolerance = 5
//! max_attempts = 20
//! jitter = true
//! close_threshold = 3
//! fine_tolerance = 2
//! backoff_far_ms = 400
//! backoff_mid_ms = 250
//! backoff_near_ms = 100
//!
//! [navigation]
//! graph = /path/to/graph.json
//! search_radius = 50
//!
//! [logging]
//! level = info
//! file = /path/to/webwalker.log
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use super::settings::{DEFAULT_REFRESH_RATE_MS, MIN_REFRESH_RATE_MS};
use crate::capture::CaptureConfig;
use crate::coord::PixelPoint;
use crate::graph::DEFAULT_SEARCH_RADIUS;
use crate::logging::LoggingConfig;
use crate::movement::{Backoff, MovementConfig};
use crate::recognizer::RecognizerConfig;

/// Default interval between device registry reconciliations.
pub const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 2000;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Navigation graph settings.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    /// Graph JSON to load at startup.
    pub graph: Option<PathBuf>,
    /// Initial nearest-node search radius in tiles.
    pub search_radius: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            graph: None,
            search_radius: DEFAULT_SEARCH_RADIUS,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    // ==================== Capture ====================
    pub refresh_rate_ms: u64,
    pub reconcile_interval_ms: u64,
    pub capture: CaptureConfig,

    // ==================== Engine ====================
    pub recognition: RecognizerConfig,
    pub movement: MovementConfig,
    pub navigation: NavigationConfig,
    pub logging: LoggingConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            refresh_rate_ms: DEFAULT_REFRESH_RATE_MS,
            reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL_MS,
            capture: CaptureConfig::default(),
            recognition: RecognizerConfig::default(),
            movement: MovementConfig::default(),
            navigation: NavigationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// `<config dir>/webwalker/config.ini`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("webwalker").join("config.ini"))
}

impl ConfigFile {
    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse(e.to_string()),
        })?;
        Self::from_ini(&ini)
    }

    /// Load from a file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        let s = Section::new(ini, "capture");
        cfg.refresh_rate_ms = s.get("refresh_rate_ms", cfg.refresh_rate_ms)?;
        if cfg.refresh_rate_ms < MIN_REFRESH_RATE_MS {
            return Err(s.invalid(
                "refresh_rate_ms",
                cfg.refresh_rate_ms,
                format!("must be at least {}", MIN_REFRESH_RATE_MS),
            ));
        }
        cfg.reconcile_interval_ms =
            s.get_positive("reconcile_interval_ms", cfg.reconcile_interval_ms)?;
        cfg.capture.workers = s.get_positive("workers", cfg.capture.workers)?;
        cfg.capture.frame_capacity = s.get_positive("frame_capacity", cfg.capture.frame_capacity)?;

        let s = Section::new(ini, "recognition");
        let r = &mut cfg.recognition;
        r.minimap.center = PixelPoint::new(
            s.get("minimap_x", r.minimap.center.x)?,
            s.get("minimap_y", r.minimap.center.y)?,
        );
        r.minimap.radius = s.get_positive("minimap_radius", r.minimap.radius)?;
        r.minimap.pixels_per_tile =
            s.get_positive("minimap_pixels_per_tile", r.minimap.pixels_per_tile)?;
        r.match_threshold = s.get_score("match_threshold", r.match_threshold)?;
        r.min_confidence = s.get_score("min_confidence", r.min_confidence)?;
        r.top_matches = s.get_positive("top_matches", r.top_matches)?;
        r.region_size = s.get_positive("region_size", r.region_size)?;
        r.search_window_factor = s.get_positive("search_window_factor", r.search_window_factor)?;

        let s = Section::new(ini, "movement");
        let m = &mut cfg.movement;
        m.tolerance = s.get("tolerance", m.tolerance)?;
        m.max_attempts = s.get_positive("max_attempts", m.max_attempts)?;
        m.jitter = s.get_bool("jitter", m.jitter)?;
        m.close_threshold = s.get("close_threshold", m.close_threshold)?;
        m.fine_tolerance = s.get("fine_tolerance", m.fine_tolerance)?;
        m.backoff = Backoff {
            far: s.get_millis("backoff_far_ms", m.backoff.far)?,
            mid: s.get_millis("backoff_mid_ms", m.backoff.mid)?,
            near: s.get_millis("backoff_near_ms", m.backoff.near)?,
            ..m.backoff
        };
        m.region_size = cfg.recognition.region_size;

        let s = Section::new(ini, "navigation");
        if let Some(graph) = s.raw("graph") {
            cfg.navigation.graph = Some(PathBuf::from(graph));
        }
        cfg.navigation.search_radius =
            s.get_positive("search_radius", cfg.navigation.search_radius)?;

        let s = Section::new(ini, "logging");
        if let Some(level) = s.raw("level") {
            cfg.logging.level = level.to_string();
        }
        if let Some(file) = s.raw("file") {
            cfg.logging.file = Some(PathBuf::from(file));
        }

        Ok(cfg)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("capture"))
            .set("refresh_rate_ms", self.refresh_rate_ms.to_string())
            .set("workers", self.capture.workers.to_string())
            .set("frame_capacity", self.capture.frame_capacity.to_string())
            .set("reconcile_interval_ms", self.reconcile_interval_ms.to_string());

        let r = &self.recognition;
        ini.with_section(Some("recognition"))
            .set("minimap_x", r.minimap.center.x.to_string())
            .set("minimap_y", r.minimap.center.y.to_string())
            .set("minimap_radius", r.minimap.radius.to_string())
            .set("minimap_pixels_per_tile", r.minimap.pixels_per_tile.to_string())
            .set("match_threshold", r.match_threshold.to_string())
            .set("min_confidence", r.min_confidence.to_string())
            .set("top_matches", r.top_matches.to_string())
            .set("region_size", r.region_size.to_string())
            .set("search_window_factor", r.search_window_factor.to_string());

        let m = &self.movement;
        ini.with_section(Some("movement"))
            .set("tolerance", m.tolerance.to_string())
            .set("max_attempts", m.max_attempts.to_string())
            .set("jitter", m.jitter.to_string())
            .set("close_threshold", m.close_threshold.to_string())
            .set("fine_tolerance", m.fine_tolerance.to_string())
            .set("backoff_far_ms", m.backoff.far.as_millis().to_string())
            .set("backoff_mid_ms", m.backoff.mid.as_millis().to_string())
            .set("backoff_near_ms", m.backoff.near.as_millis().to_string());

        let mut nav = ini.with_section(Some("navigation"));
        nav.set("search_radius", self.navigation.search_radius.to_string());
        if let Some(graph) = &self.navigation.graph {
            nav.set("graph", graph.display().to_string());
        }

        let mut log = ini.with_section(Some("logging"));
        log.set("level", self.logging.level.clone());
        if let Some(file) = &self.logging.file {
            log.set("file", file.display().to_string());
        }

        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Typed accessors over one INI section.
struct Section<'a> {
    name: &'static str,
    props: Option<&'a Properties>,
}

impl<'a> Section<'a> {
    fn new(ini: &'a Ini, name: &'static str) -> Self {
        Self {
            name,
            props: ini.section(Some(name)),
        }
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.props
            .and_then(|p| p.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn invalid(&self, key: &'static str, value: impl ToString, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name,
            key,
            value: value.to_string(),
            reason,
        }
    }

    fn get<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(key) {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|e: T::Err| self.invalid(key, v, e.to_string())),
        }
    }

    fn get_positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + ToString,
        T::Err: std::fmt::Display,
    {
        let value = self.get(key, default)?;
        if value <= T::default() {
            return Err(self.invalid(key, value, "must be greater than zero".to_string()));
        }
        Ok(value)
    }

    fn get_score(&self, key: &'static str, default: f32) -> Result<f32, ConfigError> {
        let value: f32 = self.get(key, default)?;
        if !(-1.0..=1.0).contains(&value) {
            return Err(self.invalid(key, value, "must be within -1.0..=1.0".to_string()));
        }
        Ok(value)
    }

    fn get_bool(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, v, "expected true or false".to_string())),
            },
        }
    }

    fn get_millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let ms: u64 = self.get(key, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }
}
