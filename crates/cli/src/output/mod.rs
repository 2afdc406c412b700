//! Result envelope printed by every command.
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "create",
//!   "data": { "sessionId": "abc", ... },
//!   "timings": { "durationMs": 412 }
//! }
//! ```
//!
//! On failure `data` is replaced by
//! `"error": { "code": "REGISTRATION_FAILED", "message": "...", "details": { ... } }`.

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use forge_session::SessionRecord;
use serde::{Deserialize, Serialize};

/// Bumped on breaking changes to the envelope.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON (default)
	#[default]
	Json,
	/// One JSON document per line
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Stable error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// No usable wallet (e.g. unreadable key file)
	WalletNotFound,
	/// Operation needs a connected wallet
	NotConnected,
	/// Connection or signature declined
	UserRejected,
	/// Registrar unreachable, timed out, or refused the session
	RegistrationFailed,
	/// A session existed but is past its expiry
	SessionExpired,
	/// No session cached for the wallet
	NoActiveSession,
	InvalidInput,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::WalletNotFound => write!(f, "WALLET_NOT_FOUND"),
			ErrorCode::NotConnected => write!(f, "NOT_CONNECTED"),
			ErrorCode::UserRejected => write!(f, "USER_REJECTED"),
			ErrorCode::RegistrationFailed => write!(f, "REGISTRATION_FAILED"),
			ErrorCode::SessionExpired => write!(f, "SESSION_EXPIRED"),
			ErrorCode::NoActiveSession => write!(f, "NO_ACTIVE_SESSION"),
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
	pub level: DiagnosticLevel,
	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
	Info,
	Warning,
}

pub struct ResultBuilder<T: Serialize> {
	schema_version: Option<u32>,
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			schema_version: Some(SCHEMA_VERSION),
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
			diagnostics: Vec::new(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn error_with(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		CommandResult {
			schema_version: self.schema_version,
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
			diagnostics: self.diagnostics,
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(ref data) = result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				let _ = writeln!(stdout, "{json}");
			}
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info",
			DiagnosticLevel::Warning => "warning",
		};
		let _ = writeln!(stdout, "[{prefix}] {}", diag.message);
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeygenData {
	pub public_key: String,
	pub path: PathBuf,
}

/// A cached session as reported to the user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
	#[serde(flatten)]
	pub record: SessionRecord,
	pub remaining_secs: i64,
}

impl SessionData {
	pub fn new(record: SessionRecord, now: DateTime<Utc>) -> Self {
		let remaining_secs = record.remaining(now).num_seconds();
		Self { record, remaining_secs }
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListData {
	pub sessions: Vec<SessionData>,
	pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeData {
	pub owner: String,
	pub revoked: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneData {
	pub removed: usize,
	pub remaining: usize,
}
