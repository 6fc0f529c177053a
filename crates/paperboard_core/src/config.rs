//! Board configuration loaded from an optional TOML file.
//!
//! # Responsibility
//! - Hold tunable presentation constants (card defaults, spawn anchor,
//!   reveal timing) and storage/logging locations.
//! - Reject configurations that break timing contracts.
//!
//! # Invariants
//! - Every field has a default; a missing file yields `BoardConfig::default()`.
//! - Reveal tiers are sorted by `max_len` and never get slower as text grows.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level board configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub card: CardConfig,
    pub spawn: SpawnConfig,
    pub reveal: RevealConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Fallback card dimensions used before a note has been measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub default_width: f64,
    pub default_height: f64,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            default_width: 280.0,
            default_height: 150.0,
        }
    }
}

/// Where freshly printed notes appear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Distance from the viewport bottom edge to the new note's top edge.
    pub bottom_margin: f64,
    /// New notes get a rotation in `-jitter..=jitter` degrees.
    pub rotation_jitter_deg: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            bottom_margin: 550.0,
            rotation_jitter_deg: 2.0,
        }
    }
}

/// Per-character delay range: `min_delay_ms .. min_delay_ms + variance_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_delay_ms: u64,
    pub variance_ms: u64,
}

impl DelayRange {
    pub const fn new(min_delay_ms: u64, variance_ms: u64) -> Self {
        Self {
            min_delay_ms,
            variance_ms,
        }
    }

    pub fn max_delay_ms(self) -> u64 {
        self.min_delay_ms + self.variance_ms
    }
}

/// Delay range applied to texts of at most `max_len` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealTier {
    pub max_len: usize,
    #[serde(flatten)]
    pub range: DelayRange,
}

/// Typewriter reveal timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub start_delay_ms: u64,
    pub tiers: Vec<RevealTier>,
    /// Range for texts longer than every tier.
    pub long_text: DelayRange,
    pub estimate_base_ms: u64,
    pub estimate_per_char_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 100,
            tiers: vec![
                RevealTier {
                    max_len: 50,
                    range: DelayRange::new(30, 50),
                },
                RevealTier {
                    max_len: 150,
                    range: DelayRange::new(15, 25),
                },
            ],
            long_text: DelayRange::new(5, 15),
            estimate_base_ms: 500,
            estimate_per_char_ms: 50,
        }
    }
}

impl RevealConfig {
    /// Delay range for a text of `len` characters.
    pub fn range_for(&self, len: usize) -> DelayRange {
        self.tiers
            .iter()
            .find(|tier| len <= tier.max_len)
            .map_or(self.long_text, |tier| tier.range)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Estimated total reveal time; monotone non-decreasing in `len`.
    pub fn estimated_duration(&self, len: usize) -> Duration {
        let per_char = self.estimate_per_char_ms.saturating_mul(len as u64);
        Duration::from_millis(self.estimate_base_ms.saturating_add(per_char))
    }

    fn validate(&self) -> ConfigResult<()> {
        let mut previous: Option<&RevealTier> = None;
        for tier in &self.tiers {
            if let Some(prev) = previous {
                if tier.max_len <= prev.max_len {
                    return Err(ConfigError::Invalid(format!(
                        "reveal tiers must have increasing max_len, got {} after {}",
                        tier.max_len, prev.max_len
                    )));
                }
                ensure_not_slower(prev.range, tier.range)?;
            }
            previous = Some(tier);
        }
        if let Some(last) = previous {
            ensure_not_slower(last.range, self.long_text)?;
        }
        Ok(())
    }
}

fn ensure_not_slower(shorter: DelayRange, longer: DelayRange) -> ConfigResult<()> {
    if longer.min_delay_ms > shorter.min_delay_ms || longer.max_delay_ms() > shorter.max_delay_ms()
    {
        return Err(ConfigError::Invalid(
            "reveal delay ranges must not grow for longer texts".to_string(),
        ));
    }
    Ok(())
}

/// Note store location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; `None` keeps the board in memory.
    pub path: Option<PathBuf>,
}

/// Logging bootstrap settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `None` falls back to `default_log_level()`.
    pub level: Option<String>,
    /// Absolute directory; `None` disables file logging.
    pub dir: Option<PathBuf>,
}

impl BoardConfig {
    /// Loads configuration from `path`, or defaults when the file is absent.
    ///
    /// # Errors
    /// - File exists but cannot be read or parsed.
    /// - Parsed values fail `validate()`.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "event=config_load module=config status=skip reason=missing path={}",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            "event=config_load module=config status=ok path={} reveal_tiers={}",
            path.display(),
            config.reveal.tiers.len()
        );
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.card.default_width > 0.0 && self.card.default_height > 0.0) {
            return Err(ConfigError::Invalid(
                "card default dimensions must be positive".to_string(),
            ));
        }
        if !(self.spawn.rotation_jitter_deg >= 0.0 && self.spawn.rotation_jitter_deg.is_finite())
        {
            return Err(ConfigError::Invalid(
                "spawn.rotation_jitter_deg must be a finite non-negative number".to_string(),
            ));
        }
        self.reveal.validate()
    }
}
