use std::time::Duration;

use chrono::{DateTime, Utc};
use forge_session_protocol::{IntentError, PublicKey};
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the handshake and session cache.
#[derive(Debug, Error)]
pub enum Error {
	/// No installed wallet provider was found.
	#[error("no compatible wallet found")]
	WalletNotFound,

	/// An operation needing a connected wallet ran before `connect()` succeeded.
	#[error("wallet is not connected")]
	NotConnected,

	/// The user declined the connection prompt.
	#[error("user rejected the wallet connection")]
	UserRejected,

	/// The user declined to sign, or the wallet produced an unusable signature.
	#[error("signing rejected: {reason}")]
	SigningRejected { reason: String },

	/// The wallet failed for reasons other than a user decision.
	#[error("wallet error: {0}")]
	Wallet(String),

	#[error(transparent)]
	SessionRegistration(#[from] SessionRegistrationError),

	/// A cached session exists but its expiry has passed.
	#[error("session expired at {expired_at}")]
	SessionExpired { expired_at: DateTime<Utc> },

	#[error("no active session for {owner}")]
	NoActiveSession { owner: PublicKey },

	#[error("invalid session intent: {0}")]
	Intent(#[from] IntentError),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("transaction relay failed: {0}")]
	Relay(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// True when the user actively declined a wallet prompt.
	pub fn is_user_rejection(&self) -> bool {
		matches!(self, Error::UserRejected | Error::SigningRejected { .. })
	}
}

/// The registrar did not turn a signed intent into a session.
#[derive(Debug, Clone, Error)]
#[error("session registration at {endpoint} failed: {failure}")]
pub struct SessionRegistrationError {
	pub endpoint: String,
	pub failure: RegistrationFailure,
}

impl SessionRegistrationError {
	pub fn new(endpoint: impl Into<String>, failure: RegistrationFailure) -> Self {
		Self {
			endpoint: endpoint.into(),
			failure,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationFailure {
	#[error("network error: {0}")]
	Network(String),

	#[error("no response within {after:?}")]
	Timeout { after: Duration },

	#[error("HTTP {status}: {body}")]
	Status { status: u16, body: String },

	#[error("rejected: {reason}")]
	Rejected { reason: String },

	#[error("malformed response: {reason}")]
	Malformed { reason: String },
}
