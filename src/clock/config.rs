//! Konfigurasi cycle clock
//!
//! Durasi ditulis dalam format humantime (`"20ms"`, `"3s"`), baik di TOML
//! maupun CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Batas bawah interval kalibrasi; jadwal kalibrasi dikurangi 1000ns
pub const MIN_CALIBRATE_INTERVAL_NS: i64 = 1_000;

/// Error konfigurasi clock
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Warmup nol tidak menghasilkan slope yang valid.
    #[error("warmup must be non-zero")]
    InvalidWarmup,

    /// Interval kalibrasi terlalu pendek.
    #[error("calibration interval must exceed {min_ns}ns, got {actual_ns}ns")]
    InvalidInterval {
        /// Batas bawah (eksklusif).
        min_ns: i64,
        /// Nilai yang diberikan.
        actual_ns: i64,
    },

    /// File config tidak bisa dibaca.
    #[error("failed to read {}: {message}", .path.display())]
    Io {
        /// Path file config.
        path: PathBuf,
        /// Pesan dari `std::io::Error`.
        message: String,
    },

    /// TOML tidak bisa di-parse.
    #[error("failed to parse clock config: {0}")]
    Parse(String),
}

/// Parameter init dan rekalibrasi cycle clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Lama busy-wait saat init. Lebih lama = slope awal lebih akurat.
    #[serde(with = "humantime_serde")]
    pub warmup: Duration,

    /// Jarak antar rekalibrasi.
    #[serde(with = "humantime_serde")]
    pub calibrate_interval: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(20),
            calibrate_interval: Duration::from_secs(3),
        }
    }
}

impl ClockConfig {
    /// Parse dari TOML lalu validasi
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Baca file TOML lalu parse + validasi
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Load config untuk binary: file opsional (default jika `None`),
    /// override dari CLI, lalu validasi ulang.
    pub fn load(
        path: Option<&Path>,
        warmup: Option<Duration>,
        calibrate_interval: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(warmup) = warmup {
            config.warmup = warmup;
        }
        if let Some(interval) = calibrate_interval {
            config.calibrate_interval = interval;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validasi nilai konfigurasi
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warmup.is_zero() {
            return Err(ConfigError::InvalidWarmup);
        }

        let interval_ns = self.calibrate_interval_ns();
        if interval_ns <= MIN_CALIBRATE_INTERVAL_NS {
            return Err(ConfigError::InvalidInterval {
                min_ns: MIN_CALIBRATE_INTERVAL_NS,
                actual_ns: interval_ns,
            });
        }

        Ok(())
    }

    /// Warmup dalam nanoseconds
    pub fn warmup_ns(&self) -> i64 {
        duration_to_ns(self.warmup)
    }

    /// Interval kalibrasi dalam nanoseconds
    pub fn calibrate_interval_ns(&self) -> i64 {
        duration_to_ns(self.calibrate_interval)
    }
}

fn duration_to_ns(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Serde helper untuk `Duration` dengan format humantime.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
