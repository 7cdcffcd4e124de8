//! Live settings shared between components.
//!
//! Values here can change while the engine runs. Components read the current
//! value on demand and may subscribe to change notifications through a
//! `tokio::sync::watch` channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Default capture refresh interval in milliseconds.
pub const DEFAULT_REFRESH_RATE_MS: u64 = 500;

/// Smallest accepted refresh interval; a zero period would spin.
pub const MIN_REFRESH_RATE_MS: u64 = 10;

/// Shared, observable runtime settings.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    refresh_rate_ms: Arc<watch::Sender<u64>>,
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_RATE_MS)
    }
}

impl SharedSettings {
    pub fn new(refresh_rate_ms: u64) -> Self {
        let (tx, _rx) = watch::channel(refresh_rate_ms.max(MIN_REFRESH_RATE_MS));
        Self {
            refresh_rate_ms: Arc::new(tx),
        }
    }

    /// Current capture refresh interval in milliseconds.
    pub fn refresh_rate_ms(&self) -> u64 {
        *self.refresh_rate_ms.borrow()
    }

    /// Current capture refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_ms())
    }

    /// Publish a new refresh rate. Returns true if the value changed.
    pub fn set_refresh_rate(&self, ms: u64) -> bool {
        let ms = ms.max(MIN_REFRESH_RATE_MS);
        self.refresh_rate_ms.send_if_modified(|current| {
            if *current == ms {
                false
            } else {
                *current = ms;
                true
            }
        })
    }

    /// Subscribe to refresh-rate changes.
    pub fn subscribe_refresh_rate(&self) -> watch::Receiver<u64> {
        self.refresh_rate_ms.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SharedSettings::default();
        assert_eq!(settings.refresh_rate_ms(), DEFAULT_REFRESH_RATE_MS);
        assert_eq!(
            settings.refresh_interval(),
            Duration::from_millis(DEFAULT_REFRESH_RATE_MS)
        );
    }

    #[test]
    fn test_set_reports_changes() {
        let settings = SharedSettings::new(100);
        assert!(settings.set_refresh_rate(200));
        assert!(!settings.set_refresh_rate(200));
        assert_eq!(settings.refresh_rate_ms(), 200);
    }

    #[test]
    fn test_minimum_is_enforced() {
        let settings = SharedSettings::new(0);
        assert_eq!(settings.refresh_rate_ms(), MIN_REFRESH_RATE_MS);
        settings.set_refresh_rate(1);
        assert_eq!(settings.refresh_rate_ms(), MIN_REFRESH_RATE_MS);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let settings = SharedSettings::new(100);
        let mut rx = settings.subscribe_refresh_rate();
        let clone = settings.clone();
        clone.set_refresh_rate(300);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 300);
    }
}
