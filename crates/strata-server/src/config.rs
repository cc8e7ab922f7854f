// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Environment-backed configuration (`STRATA_SERVER_*`), resolved once at
//! startup and passed by value into the worker pool. No globals.

use std::path::PathBuf;
use std::time::Duration;

use strata_server_jobs::WorkerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid value for {var}: {value}")]
	Invalid { var: String, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub database_url: String,
	pub repo_base_dir: PathBuf,
	pub worker_count: usize,
	pub poll_interval_secs: u64,
	pub stale_threshold_mins: u64,
	pub mine_default_days: i64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			database_url: "sqlite:./strata.db".to_string(),
			repo_base_dir: std::env::temp_dir().join("strata-repos"),
			worker_count: 2,
			poll_interval_secs: 5,
			stale_threshold_mins: 30,
			mine_default_days: 90,
		}
	}
}

impl ServerConfig {
	/// Resolve from process environment variables over built-in defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|var| std::env::var(var).ok())
	}

	/// Resolve from an arbitrary lookup, so tests never touch the process
	/// environment.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut config = Self::default();

		if let Some(value) = lookup("STRATA_SERVER_DATABASE_URL") {
			config.database_url = value;
		}
		if let Some(value) = lookup("STRATA_SERVER_REPO_BASE_DIR") {
			config.repo_base_dir = PathBuf::from(value);
		}
		if let Some(value) = lookup("STRATA_SERVER_WORKER_COUNT") {
			config.worker_count = parse(&value, "STRATA_SERVER_WORKER_COUNT")?;
		}
		if let Some(value) = lookup("STRATA_SERVER_POLL_INTERVAL_SECS") {
			config.poll_interval_secs = parse(&value, "STRATA_SERVER_POLL_INTERVAL_SECS")?;
		}
		if let Some(value) = lookup("STRATA_SERVER_STALE_THRESHOLD_MINS") {
			config.stale_threshold_mins = parse(&value, "STRATA_SERVER_STALE_THRESHOLD_MINS")?;
		}
		if let Some(value) = lookup("STRATA_SERVER_MINE_DEFAULT_DAYS") {
			let days: i64 = parse(&value, "STRATA_SERVER_MINE_DEFAULT_DAYS")?;
			if days <= 0 {
				return Err(ConfigError::Invalid {
					var: "STRATA_SERVER_MINE_DEFAULT_DAYS".to_string(),
					value,
				});
			}
			config.mine_default_days = days;
		}

		Ok(config)
	}

	pub fn worker_config(&self) -> WorkerConfig {
		WorkerConfig {
			worker_count: self.worker_count,
			poll_interval: Duration::from_secs(self.poll_interval_secs),
			stale_threshold: Duration::from_secs(self.stale_threshold_mins * 60),
		}
	}
}

fn parse<T: std::str::FromStr>(value: &str, var: &str) -> Result<T, ConfigError> {
	value.parse().map_err(|_| ConfigError::Invalid {
		var: var.to_string(),
		value: value.to_string(),
	})
}
