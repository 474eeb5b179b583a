//! Playback configuration loading and validation
//!
//! Resolution priority order:
//! 1. Explicit path supplied by the caller (highest priority)
//! 2. `QUAVER_CONFIG` environment variable
//! 3. Compiled defaults (fallback)
//!
//! Out-of-range values are corrected with a logged warning rather than
//! rejected, so a hand-edited config file never prevents startup.

use crate::curves::CrossfadeCurve;
use quaver_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable pointing at a TOML config file
pub const CONFIG_ENV_VAR: &str = "QUAVER_CONFIG";

/// How the engine moves from one track to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    /// Instantaneous slot swap at the boundary, no overlap
    #[default]
    Gapless,
    /// Timed dual-slot fade using the configured curve
    Crossfade,
}

/// Playback core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Transition style at track boundaries
    pub transition: TransitionStyle,

    /// Curve used when `transition` is crossfade
    pub crossfade_curve: CrossfadeCurve,

    /// Crossfade length in milliseconds
    pub crossfade_duration_ms: u64,

    /// Look-ahead before the boundary for gapless preloading, milliseconds
    pub gapless_lookahead_ms: u64,

    /// Extra preload margin ahead of the crossfade start, milliseconds
    pub preload_margin_ms: u64,

    /// Recursion cap for folder resolution
    pub max_folder_depth: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            transition: TransitionStyle::Gapless,
            crossfade_curve: CrossfadeCurve::EqualPower,
            crossfade_duration_ms: 5_000,
            gapless_lookahead_ms: 500,
            preload_margin_ms: 2_000,
            max_folder_depth: 16,
        }
    }
}

impl PlaybackConfig {
    /// Load configuration following the priority order
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        info!("no playback config found, using defaults");
        Ok(Self::default())
    }

    /// Parse and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PlaybackConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config.validated())
    }

    /// Correct out-of-range values, warning on each correction
    pub fn validated(mut self) -> Self {
        if !(100..=30_000).contains(&self.crossfade_duration_ms) {
            let clamped = self.crossfade_duration_ms.clamp(100, 30_000);
            warn!(
                "crossfade_duration_ms {} outside 100-30000, clamping to {}",
                self.crossfade_duration_ms, clamped
            );
            self.crossfade_duration_ms = clamped;
        }
        if self.max_folder_depth == 0 {
            warn!("max_folder_depth 0 would reject every folder, using 1");
            self.max_folder_depth = 1;
        }
        if self.gapless_lookahead_ms < 100 {
            warn!(
                "gapless_lookahead_ms {} too small to preload, using 100",
                self.gapless_lookahead_ms
            );
            self.gapless_lookahead_ms = 100;
        }
        self
    }

    /// Seconds of remaining time at which the idle slot starts preloading
    ///
    /// Derived from the crossfade duration in crossfade mode; a small fixed
    /// window in gapless mode.
    pub fn preload_lookahead_secs(&self) -> f64 {
        match self.transition {
            TransitionStyle::Crossfade => {
                (self.crossfade_duration_ms + self.preload_margin_ms) as f64 / 1000.0
            }
            TransitionStyle::Gapless => self.gapless_lookahead_ms as f64 / 1000.0,
        }
    }

    /// Crossfade length in seconds
    pub fn crossfade_duration_secs(&self) -> f64 {
        self.crossfade_duration_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.transition, TransitionStyle::Gapless);
        assert_eq!(config.crossfade_curve, CrossfadeCurve::EqualPower);
        assert_eq!(config.crossfade_duration_ms, 5_000);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: PlaybackConfig = toml::from_str(
            r#"
            transition = "crossfade"
            crossfade_curve = "s_curve"
            crossfade_duration_ms = 3000
            "#,
        )
        .unwrap();
        assert_eq!(config.transition, TransitionStyle::Crossfade);
        assert_eq!(config.crossfade_curve, CrossfadeCurve::SCurve);
        assert_eq!(config.crossfade_duration_ms, 3000);
        // unspecified fields fall back to defaults
        assert_eq!(config.max_folder_depth, 16);
    }

    #[test]
    fn test_validation_clamps_out_of_range() {
        let config = PlaybackConfig {
            crossfade_duration_ms: 1,
            max_folder_depth: 0,
            gapless_lookahead_ms: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.crossfade_duration_ms, 100);
        assert_eq!(config.max_folder_depth, 1);
        assert_eq!(config.gapless_lookahead_ms, 100);
    }

    #[test]
    fn test_lookahead_derivation() {
        let gapless = PlaybackConfig::default();
        assert_eq!(gapless.preload_lookahead_secs(), 0.5);

        let crossfade = PlaybackConfig {
            transition: TransitionStyle::Crossfade,
            ..Default::default()
        };
        assert_eq!(crossfade.preload_lookahead_secs(), 7.0);
    }
}
