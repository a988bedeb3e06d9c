//! Configuration management for popup-stack
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It combines settings for the mutation engine, the
//! per-anchor popup defaults and general process options.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::popup::{BottomPopupConfig, CentrePopupConfig, TopPopupConfig};

/// Main configuration struct containing all popup-stack settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StackConfig {
    /// Stack mutation engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Base configuration for each popup anchor
    #[serde(default)]
    pub defaults: PopupDefaults,

    /// General process settings
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Stack mutation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Window after a mutation during which further mutations on the same
    /// manager are dropped (milliseconds)
    pub cooldown_ms: u64,

    /// Resign keyboard/input focus before every mutation
    pub dismiss_focus: bool,
}

/// Base configurations handed to each popup's configure transform
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PopupDefaults {
    pub top: TopPopupConfig,
    pub centre: CentrePopupConfig,
    pub bottom: BottomPopupConfig,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: Self::default_cooldown_ms(),
            dismiss_focus: true,
        }
    }
}

impl EngineConfig {
    fn default_cooldown_ms() -> u64 {
        440
    }

    /// Upper bound accepted by [`StackConfig::validate`]
    pub const MAX_COOLDOWN_MS: u64 = 10_000;

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl StackConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {}", expanded_path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: StackConfig = toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.cooldown_ms > EngineConfig::MAX_COOLDOWN_MS {
            anyhow::bail!(
                "Invalid cooldown_ms: must be at most {}",
                EngineConfig::MAX_COOLDOWN_MS
            );
        }

        let anchors = [
            ("top", self.defaults.top.overlay_opacity, self.defaults.top.corner_radius),
            ("centre", self.defaults.centre.overlay_opacity, self.defaults.centre.corner_radius),
            ("bottom", self.defaults.bottom.overlay_opacity, self.defaults.bottom.corner_radius),
        ];
        for (anchor, opacity, radius) in anchors {
            if !(0.0..=1.0).contains(&opacity) {
                anyhow::bail!("Invalid {} overlay_opacity: must be between 0.0 and 1.0", anchor);
            }
            if radius < 0.0 || !radius.is_finite() {
                anyhow::bail!("Invalid {} corner_radius: must be a non-negative number", anchor);
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Merge a partial configuration into this one
    /// Sections of the partial config that differ from the defaults override this config
    pub fn merge_partial(mut self, partial: StackConfig) -> Self {
        let default_config = StackConfig::default();

        if partial.engine != default_config.engine {
            self.engine = partial.engine;
        }
        if partial.defaults.top != default_config.defaults.top {
            self.defaults.top = partial.defaults.top;
        }
        if partial.defaults.centre != default_config.defaults.centre {
            self.defaults.centre = partial.defaults.centre;
        }
        if partial.defaults.bottom != default_config.defaults.bottom {
            self.defaults.bottom = partial.defaults.bottom;
        }
        if partial.general != default_config.general {
            self.general = partial.general;
        }

        self
    }
}
