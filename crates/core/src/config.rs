//! Handshake configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! `FORGE_*` environment variables. Front ends apply their own flags last.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_REGISTRAR_URL: &str = "https://testnet.fogo.io/api";
pub const DEFAULT_CHAIN_ID: &str = "fogo-testnet";
pub const DEFAULT_DOMAIN: &str = "http://localhost:3000";
pub const DEFAULT_EXPIRY_DAYS: u32 = 7;
pub const MAX_EXPIRY_DAYS: u32 = 365;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// What to do when the registrar cannot be reached or refuses the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
	/// Surface the failure.
	#[default]
	Strict,
	/// Cache a locally fabricated record flagged `simulated`. Demo use only.
	Simulate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
	pub registrar_url: String,
	pub chain_id: String,
	pub version: String,
	pub domain: String,
	pub expiry_days: u32,
	pub request_timeout_secs: u64,
	pub fallback: FallbackPolicy,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub store_path: Option<PathBuf>,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			registrar_url: DEFAULT_REGISTRAR_URL.to_string(),
			chain_id: DEFAULT_CHAIN_ID.to_string(),
			version: forge_session_protocol::intent::DEFAULT_PROTOCOL_VERSION.to_string(),
			domain: DEFAULT_DOMAIN.to_string(),
			expiry_days: DEFAULT_EXPIRY_DAYS,
			request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
			fallback: FallbackPolicy::Strict,
			store_path: None,
		}
	}
}

impl SessionConfig {
	/// Loads defaults, the config file and the process environment.
	///
	/// An explicit `path` must exist; without one the default location is used
	/// when present.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let mut config = match path {
			Some(path) => Self::from_file(path)?,
			None => match default_config_path() {
				Some(default) if default.is_file() => Self::from_file(&default)?,
				_ => Self::default(),
			},
		};
		config.apply_env(|key| std::env::var(key).ok())?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
		let config = serde_json::from_str(&content)
			.map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))?;
		debug!(target = "forge_session", path = %path.display(), "loaded config file");
		Ok(config)
	}

	/// Applies `FORGE_*` overrides read through `lookup`.
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(url) = lookup("FORGE_REGISTRAR_URL") {
			self.registrar_url = url;
		}
		if let Some(chain_id) = lookup("FORGE_CHAIN_ID") {
			self.chain_id = chain_id;
		}
		if let Some(version) = lookup("FORGE_SESSION_VERSION") {
			self.version = version;
		}
		if let Some(domain) = lookup("FORGE_APP_DOMAIN") {
			self.domain = domain;
		}
		if let Some(days) = lookup("FORGE_SESSION_EXPIRY_DAYS") {
			self.expiry_days = days
				.trim()
				.parse()
				.map_err(|_| Error::Config(format!("FORGE_SESSION_EXPIRY_DAYS must be a whole number, got `{days}`")))?;
		}
		if let Some(secs) = lookup("FORGE_REQUEST_TIMEOUT_SECS") {
			self.request_timeout_secs = secs
				.trim()
				.parse()
				.map_err(|_| Error::Config(format!("FORGE_REQUEST_TIMEOUT_SECS must be a whole number, got `{secs}`")))?;
		}
		Ok(())
	}

	pub fn validate(&self) -> Result<()> {
		let url = Url::parse(&self.registrar_url)
			.map_err(|e| Error::Config(format!("registrar URL `{}`: {e}", self.registrar_url)))?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(Error::Config(format!("registrar URL must be http(s), got `{}`", url.scheme())));
		}
		if !(1..=MAX_EXPIRY_DAYS).contains(&self.expiry_days) {
			return Err(Error::Config(format!(
				"session expiry must be between 1 and {MAX_EXPIRY_DAYS} days, got {}",
				self.expiry_days
			)));
		}
		if self.request_timeout_secs == 0 {
			return Err(Error::Config("request timeout must be at least one second".into()));
		}
		Ok(())
	}

	pub fn expiry(&self) -> chrono::Duration {
		chrono::Duration::days(i64::from(self.expiry_days))
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	/// Store location, falling back to the XDG cache directory.
	pub fn resolved_store_path(&self) -> PathBuf {
		self.store_path.clone().unwrap_or_else(default_store_path)
	}
}

fn config_home() -> Option<PathBuf> {
	std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
}

fn cache_home() -> PathBuf {
	std::env::var_os("XDG_CACHE_HOME")
		.map(PathBuf::from)
		.or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))
		.unwrap_or_else(|| PathBuf::from("."))
}

/// `$XDG_CONFIG_HOME/forge-session/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
	config_home().map(|dir| dir.join("forge-session").join("config.json"))
}

/// `$XDG_CACHE_HOME/forge-session/sessions.json`.
pub fn default_store_path() -> PathBuf {
	cache_home().join("forge-session").join("sessions.json")
}
