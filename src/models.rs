//! Data models and configuration
//!
//! Defines the compression parameters, the result of a budgeted encode and
//! the environment-backed configuration used by the command-line driver.

use crate::{Error, Result};

/// Highest quality accepted by the encoders.
pub const MAX_QUALITY: u8 = 100;

/// Parameters of one budgeted compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub budget_bytes: u64,
    pub start_quality: u8,
    pub min_quality: u8,
    pub step: u8,
}

impl CompressionSettings {
    pub fn new(budget_bytes: u64, start_quality: u8, min_quality: u8, step: u8) -> Self {
        Self {
            budget_bytes,
            start_quality,
            min_quality,
            step,
        }
    }

    /// Hero-image defaults: 150 KB, quality 55 down to 30 in steps of 5.
    pub fn hero() -> Self {
        Self::new(150 * 1024, 55, 30, 5)
    }

    pub fn validate(&self) -> Result<()> {
        if self.budget_bytes == 0 {
            return Err(Error::Configuration(
                "budget_bytes must be positive".to_string(),
            ));
        }
        if self.step == 0 {
            return Err(Error::Configuration("step must be positive".to_string()));
        }
        if self.start_quality > MAX_QUALITY {
            return Err(Error::Configuration(format!(
                "start_quality ({}) exceeds {}",
                self.start_quality, MAX_QUALITY
            )));
        }
        if self.min_quality > self.start_quality {
            return Err(Error::Configuration(format!(
                "min_quality ({}) exceeds start_quality ({})",
                self.min_quality, self.start_quality
            )));
        }
        Ok(())
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::hero()
    }
}

/// Outcome of a budgeted compression. Only the chosen encoding survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    bytes: Vec<u8>,
    quality: u8,
    met: bool,
}

impl CompressionResult {
    pub(crate) fn new(bytes: Vec<u8>, quality: u8, budget_bytes: u64) -> Self {
        let met = bytes.len() as u64 <= budget_bytes;
        Self {
            bytes,
            quality,
            met,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the encoded size fits the budget.
    pub fn met(&self) -> bool {
        self.met
    }
}

// Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub compression: CompressionSettings,
    pub convert_quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression: CompressionSettings::hero(),
            convert_quality: 75,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

impl Config {
    /// Read `SQUEEZE_*` variables, loading a `.env` file first when one is
    /// found. A `.env` that exists but does not parse is an error.
    pub fn from_env() -> Result<Self> {
        dotenv_loaded(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let budget_kb: u64 = parse_var(
            &lookup,
            "SQUEEZE_MAX_SIZE_KB",
            defaults.compression.budget_bytes / 1024,
        )?;

        let config = Self {
            compression: CompressionSettings {
                budget_bytes: budget_kb.saturating_mul(1024),
                start_quality: parse_var(
                    &lookup,
                    "SQUEEZE_START_QUALITY",
                    defaults.compression.start_quality,
                )?,
                min_quality: parse_var(
                    &lookup,
                    "SQUEEZE_MIN_QUALITY",
                    defaults.compression.min_quality,
                )?,
                step: parse_var(&lookup, "SQUEEZE_QUALITY_STEP", defaults.compression.step)?,
            },
            convert_quality: parse_var(
                &lookup,
                "SQUEEZE_CONVERT_QUALITY",
                defaults.convert_quality,
            )?,
            max_width: parse_var(&lookup, "SQUEEZE_MAX_WIDTH", defaults.max_width)?,
            max_height: parse_var(&lookup, "SQUEEZE_MAX_HEIGHT", defaults.max_height)?,
        };

        if config.convert_quality > MAX_QUALITY {
            return Err(Error::Configuration(format!(
                "SQUEEZE_CONVERT_QUALITY ({}) exceeds {}",
                config.convert_quality, MAX_QUALITY
            )));
        }
        Ok(config)
    }
}

fn dotenv_loaded<T>(result: std::result::Result<T, dotenvy::Error>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}
