//! Scanner configuration
//!
//! Loaded from YAML (every field optional), then overridden from the
//! environment. Remote fallbacks are listed in priority order; the strategy
//! chain is built from that list, so reordering needs no code change.

use crate::error::ConfigError;
use crate::gate::ThrottleWindows;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How acceptance affects the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Keep scanning; pause briefly after each accepted code
    #[default]
    Continuous,
    /// Pause after any decode until explicitly resumed
    SingleShot,
}

/// Fallback decoders that can be registered in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Local identity + inverted snapshot decode
    Snapshot,
    /// Remote image-decoding service
    RemoteDecode,
    /// Remote text recognition
    RemoteText,
}

/// Suppression windows, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Same accepted code re-scanned
    pub rescan_window_ms: u64,
    /// Same duplicate-in-product warning
    pub duplicate_window_ms: u64,
    /// Same generic warning
    pub warning_window_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rescan_window_ms: 2_000,
            duplicate_window_ms: 5_000,
            warning_window_ms: 3_000,
        }
    }
}

impl ThrottleConfig {
    /// Windows for the throttle gate
    pub fn windows(&self) -> ThrottleWindows {
        ThrottleWindows {
            rescan: Duration::from_millis(self.rescan_window_ms),
            duplicate: Duration::from_millis(self.duplicate_window_ms),
            warning: Duration::from_millis(self.warning_window_ms),
        }
    }
}

/// Strategy chain composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Fallback strategies, highest priority first
    pub fallback: Vec<StrategyKind>,
    /// Also upload the colour-inverted snapshot to the remote decoder
    pub include_inverted: bool,
    /// Minimum digit run accepted from recognized text
    pub min_digits: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            fallback: vec![
                StrategyKind::Snapshot,
                StrategyKind::RemoteDecode,
                StrategyKind::RemoteText,
            ],
            include_inverted: true,
            min_digits: 3,
        }
    }
}

/// Remote capability endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Image-decoding endpoint
    pub decode_url: Option<String>,
    /// Text-recognition endpoint
    pub text_url: Option<String>,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Environment variable holding a bearer token, if any
    pub token_env: Option<String>,
    /// JPEG quality for text-recognition uploads
    pub jpeg_quality: u8,
    /// Longest side of text-recognition uploads (0 = full size)
    pub max_text_dim: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            decode_url: None,
            text_url: None,
            timeout_ms: 10_000,
            token_env: None,
            jpeg_quality: 75,
            max_text_dim: 1280,
        }
    }
}

impl RemoteConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Bearer token read from `token_env`
    pub fn token(&self) -> Option<String> {
        let var = self.token_env.as_deref()?;
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }
}

/// Complete acquisition configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Continuous or single-shot acquisition
    pub mode: ScanMode,
    /// Native decode loop rate
    pub fps: u32,
    /// Period of the snapshot fallback pass
    pub fallback_interval_ms: u64,
    /// Pause after an accepted code in continuous mode
    pub cooldown_ms: u64,
    /// Suppression windows
    pub throttle: ThrottleConfig,
    /// Strategy chain
    pub decode: DecodeConfig,
    /// Remote endpoints
    pub remote: RemoteConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Continuous,
            fps: 15,
            fallback_interval_ms: 1_000,
            cooldown_ms: 300,
            throttle: ThrottleConfig::default(),
            decode: DecodeConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Read a YAML file, apply environment overrides, and validate
    ///
    /// Remote fallbacks whose endpoint is still unset are dropped with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::resolve(Self::from_yaml(&text)?)
    }

    /// Defaults plus environment overrides, validated like [`ScanConfig::load`]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(Self::default())
    }

    fn resolve(mut config: Self) -> Result<Self, ConfigError> {
        config.apply_env();
        let config = config.without_unconfigured_remotes();
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without touching the environment
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override from `CODESCAN_*` process environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override from an arbitrary lookup (testable without touching the process env)
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CODESCAN_DECODE_URL").filter(|v| !v.is_empty()) {
            self.remote.decode_url = Some(url);
        }
        if let Some(url) = lookup("CODESCAN_TEXT_URL").filter(|v| !v.is_empty()) {
            self.remote.text_url = Some(url);
        }
        match lookup("CODESCAN_MODE").as_deref().map(str::trim) {
            Some("continuous") => self.mode = ScanMode::Continuous,
            Some("single_shot") | Some("single-shot") => self.mode = ScanMode::SingleShot,
            Some(other) => tracing::warn!(value = other, "ignoring unknown CODESCAN_MODE"),
            None => {}
        }
        if let Some(fps) = lookup("CODESCAN_FPS") {
            match fps.trim().parse() {
                Ok(v) => self.fps = v,
                Err(_) => tracing::warn!(value = %fps, "ignoring unparsable CODESCAN_FPS"),
            }
        }
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be greater than zero".into()));
        }
        if self.fallback_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "fallback_interval_ms must be greater than zero".into(),
            ));
        }
        for kind in &self.decode.fallback {
            let missing = match kind {
                StrategyKind::RemoteDecode => self.remote.decode_url.is_none(),
                StrategyKind::RemoteText => self.remote.text_url.is_none(),
                StrategyKind::Snapshot => false,
            };
            if missing {
                return Err(ConfigError::Invalid(format!(
                    "fallback {kind:?} is listed but its endpoint URL is not set"
                )));
            }
        }
        Ok(())
    }

    /// Drop remote fallbacks whose endpoint is not configured
    pub fn without_unconfigured_remotes(mut self) -> Self {
        let remote = self.remote.clone();
        self.decode.fallback.retain(|kind| {
            let configured = match kind {
                StrategyKind::RemoteDecode => remote.decode_url.is_some(),
                StrategyKind::RemoteText => remote.text_url.is_some(),
                StrategyKind::Snapshot => true,
            };
            if !configured {
                tracing::warn!(strategy = ?kind, "endpoint not set, fallback disabled");
            }
            configured
        });
        self
    }

    /// Native loop period
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis((1_000 / self.fps.max(1) as u64).max(1))
    }

    /// Fallback loop period
    pub fn fallback_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_interval_ms.max(1))
    }

    /// Continuous-mode pause after acceptance
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}
