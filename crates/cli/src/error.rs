use forge_session::{Error as SessionError, RegistrationFailure};
use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Session(#[from] SessionError),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::Session(err) => classify(err),
			CliError::InvalidInput(_) => (ErrorCode::InvalidInput, None),
			CliError::Io(_) => (ErrorCode::IoError, None),
			CliError::Anyhow(err) => match err.downcast_ref::<SessionError>() {
				Some(inner) => classify(inner),
				None if err.downcast_ref::<std::io::Error>().is_some() => (ErrorCode::IoError, None),
				None => (ErrorCode::InternalError, None),
			},
		};

		CommandError {
			code,
			message: self.message(),
			details,
		}
	}

	fn message(&self) -> String {
		match self {
			// `{:#}` keeps the whole context chain on one line.
			CliError::Anyhow(err) => format!("{err:#}"),
			other => other.to_string(),
		}
	}
}

fn classify(err: &SessionError) -> (ErrorCode, Option<serde_json::Value>) {
	match err {
		SessionError::WalletNotFound => (ErrorCode::WalletNotFound, None),
		SessionError::NotConnected => (ErrorCode::NotConnected, None),
		SessionError::UserRejected | SessionError::SigningRejected { .. } => (ErrorCode::UserRejected, None),
		SessionError::SessionRegistration(e) => {
			let kind = match &e.failure {
				RegistrationFailure::Network(_) => "network",
				RegistrationFailure::Timeout { .. } => "timeout",
				RegistrationFailure::Status { .. } => "status",
				RegistrationFailure::Rejected { .. } => "rejected",
				RegistrationFailure::Malformed { .. } => "malformed",
			};
			let mut details = json!({ "endpoint": e.endpoint, "kind": kind });
			if let RegistrationFailure::Status { status, .. } = &e.failure {
				details["status"] = json!(status);
			}
			(ErrorCode::RegistrationFailed, Some(details))
		}
		SessionError::SessionExpired { expired_at } => (
			ErrorCode::SessionExpired,
			Some(json!({ "expiredAt": expired_at.to_rfc3339() })),
		),
		SessionError::NoActiveSession { owner } => {
			(ErrorCode::NoActiveSession, Some(json!({ "owner": owner.to_string() })))
		}
		SessionError::Intent(_) | SessionError::Config(_) => (ErrorCode::InvalidInput, None),
		SessionError::Io(_) => (ErrorCode::IoError, None),
		SessionError::Wallet(_) | SessionError::Relay(_) | SessionError::Json(_) => (ErrorCode::InternalError, None),
	}
}
