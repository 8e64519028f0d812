//! Search tuning loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::pool::MAX_WORKERS;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value is outside its allowed range.
	#[error("invalid search config: {0}")]
	Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Tunables for one search session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
	/// Requested concurrent dispatch slots, clamped to `1..=8`.
	pub workers: usize,
	/// Per-source call timeout in milliseconds.
	pub source_timeout_ms: u64,
	/// Minimum spacing between published snapshots in milliseconds.
	pub publish_interval_ms: u64,
	/// Cached results needed for `open` to skip searching.
	pub cache_fast_path: usize,
}

impl Default for SearchConfig {
	fn default() -> Self {
		Self {
			workers: MAX_WORKERS,
			source_timeout_ms: 60_000,
			publish_interval_ms: 500,
			cache_fast_path: 2,
		}
	}
}

impl SearchConfig {
	/// Parses and validates a TOML document. Missing keys take defaults.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates the file at `path`.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	pub fn validate(&self) -> Result<()> {
		if self.workers == 0 {
			return Err(ConfigError::Invalid("workers must be at least 1".into()));
		}
		if self.source_timeout_ms == 0 {
			return Err(ConfigError::Invalid("source_timeout_ms must be positive".into()));
		}
		if self.publish_interval_ms == 0 {
			return Err(ConfigError::Invalid("publish_interval_ms must be positive".into()));
		}
		if self.cache_fast_path == 0 {
			return Err(ConfigError::Invalid("cache_fast_path must be at least 1".into()));
		}
		Ok(())
	}

	/// Worker count actually used: `workers` clamped to `1..=MAX_WORKERS`.
	pub fn effective_workers(&self) -> usize {
		self.workers.clamp(1, MAX_WORKERS)
	}

	pub fn source_timeout(&self) -> Duration {
		Duration::from_millis(self.source_timeout_ms)
	}

	pub fn publish_interval(&self) -> Duration {
		Duration::from_millis(self.publish_interval_ms)
	}

	#[must_use]
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers;
		self
	}

	#[must_use]
	pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
		self.source_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	#[must_use]
	pub fn with_publish_interval(mut self, interval: Duration) -> Self {
		self.publish_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
		self
	}

	#[must_use]
	pub fn with_cache_fast_path(mut self, threshold: usize) -> Self {
		self.cache_fast_path = threshold;
		self
	}
}
