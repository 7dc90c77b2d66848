//! Tunable parameters of the sweep mechanic.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Configuration recognised by [`crate::SweepCoordinator`].
///
/// Every field has a default, so a TOML document only needs to list the
/// values it overrides.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Time a sweeper needs to cross the full grid extent on its axis.
    pub animation_duration_ms: u64,
    /// Optional fixed speed in cells per second overriding the derived one.
    pub speed: Option<f64>,
    /// Number of visited cells remembered per sweeper for trail rendering.
    pub trail_length: usize,
    /// Time a visited cell takes to fade out of the trail.
    pub trail_fade_ms: u64,
    /// Upper bound on sweepers spawned per wave; zero means unlimited.
    pub max_concurrent_agents: usize,
    /// Frequency of the autonomous ticker.
    pub tick_rate_hz: u32,
    /// Character drawn for sweepers.
    pub glyph: char,
    /// Character drawn for flash markers.
    pub flash_glyph: char,
    /// Lifetime of a flash marker.
    pub flash_duration_ms: u64,
    /// Capacity of the bounded spawn-request queue.
    pub request_queue_capacity: usize,
    /// Age after which served generation tags are forgotten.
    pub dedup_horizon_ms: u64,
    /// Maximum number of generation tags remembered at once.
    pub dedup_capacity: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            animation_duration_ms: 1_000,
            speed: None,
            trail_length: 8,
            trail_fade_ms: 400,
            max_concurrent_agents: 0,
            tick_rate_hz: 60,
            glyph: '=',
            flash_glyph: '*',
            flash_duration_ms: 150,
            request_queue_capacity: 8,
            dedup_horizon_ms: 2_000,
            dedup_capacity: 64,
        }
    }
}

/// Reasons a configuration is rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse sweep configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The animation duration must be positive.
    #[error("animation_duration_ms must be greater than zero")]
    ZeroAnimationDuration,
    /// The speed override must be a positive, finite number.
    #[error("speed override must be positive and finite, got {0}")]
    InvalidSpeed(f64),
    /// Trails need at least one slot.
    #[error("trail_length must be greater than zero")]
    ZeroTrailLength,
    /// The ticker needs a positive rate.
    #[error("tick_rate_hz must be greater than zero")]
    ZeroTickRate,
    /// The request queue must accept at least one request.
    #[error("request_queue_capacity must be greater than zero")]
    ZeroQueueCapacity,
    /// The deduplication window must remember at least one tag.
    #[error("dedup_capacity must be greater than zero")]
    ZeroDedupCapacity,
}

impl SweepConfig {
    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the coordinator cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.animation_duration_ms == 0 {
            return Err(ConfigError::ZeroAnimationDuration);
        }
        if let Some(speed) = self.speed {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(ConfigError::InvalidSpeed(speed));
            }
        }
        if self.trail_length == 0 {
            return Err(ConfigError::ZeroTrailLength);
        }
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.request_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.dedup_capacity == 0 {
            return Err(ConfigError::ZeroDedupCapacity);
        }
        Ok(())
    }

    /// Speed in cells per second for a sweeper crossing `extent` cells.
    #[must_use]
    pub fn speed_for_extent(&self, extent: u32) -> f64 {
        match self.speed {
            Some(speed) => speed,
            None => f64::from(extent) / self.animation_duration().as_secs_f64(),
        }
    }

    /// Time a sweeper needs to cross the full grid extent.
    #[must_use]
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    /// Time a visited cell takes to fade out of the trail.
    #[must_use]
    pub fn trail_fade(&self) -> Duration {
        Duration::from_millis(self.trail_fade_ms)
    }

    /// Lifetime of a flash marker.
    #[must_use]
    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    /// Age after which served generation tags are forgotten.
    #[must_use]
    pub fn dedup_horizon(&self) -> Duration {
        Duration::from_millis(self.dedup_horizon_ms)
    }

    /// Interval between autonomous ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SweepConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = SweepConfig::from_toml_str(
            r#"
            animation_duration_ms = 2000
            trail_length = 4
            glyph = "~"
            "#,
        )
        .expect("valid configuration");

        assert_eq!(config.animation_duration(), Duration::from_secs(2));
        assert_eq!(config.trail_length, 4);
        assert_eq!(config.glyph, '~');
        assert_eq!(config.flash_glyph, '*');
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = SweepConfig::from_toml_str("sped = 3.0").expect_err("unknown key");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = SweepConfig::from_toml_str("animation_duration_ms = 0").expect_err("zero");
        assert!(matches!(error, ConfigError::ZeroAnimationDuration));

        let config = SweepConfig {
            speed: Some(-1.0),
            ..SweepConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpeed(_))
        ));

        let config = SweepConfig {
            trail_length: 0,
            ..SweepConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTrailLength)));
    }

    #[test]
    fn speed_derives_from_extent_unless_overridden() {
        let config = SweepConfig {
            animation_duration_ms: 2_000,
            ..SweepConfig::default()
        };
        assert!((config.speed_for_extent(80) - 40.0).abs() < 1e-9);

        let config = SweepConfig {
            speed: Some(12.5),
            ..config
        };
        assert!((config.speed_for_extent(80) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn tick_interval_follows_rate() {
        let config = SweepConfig {
            tick_rate_hz: 50,
            ..SweepConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
    }
}
