//! JSON bodies exchanged with the session registrar.
//!
//! `POST <base>/sessions/create` with a [`CreateSessionRequest`]; a 2xx reply
//! carries a [`CreateSessionResponse`]. Response fields are all optional on the
//! wire and interpreted by [`CreateSessionResponse::into_record`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::SessionIntent;
use crate::keys::PublicKey;
use crate::session::SessionRecord;

/// Path appended to the registrar base URL.
pub const CREATE_SESSION_PATH: &str = "/sessions/create";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
	pub version: String,
	pub chain_id: String,
	pub domain: String,
	/// ISO-8601 expiry, identical to the `expires:` line of `intent_message`.
	pub expires: String,
	pub session_key: String,
	/// Base58 wallet public key.
	pub public_key: String,
	/// Base64 Ed25519 signature over the UTF-8 bytes of `intent_message`.
	pub signature: String,
	pub intent_message: String,
}

/// Registrar reply. Field names are snake_case; camelCase spellings are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub success: Option<bool>,
	#[serde(default, alias = "sessionId", skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(default, alias = "sessionKey", skip_serializing_if = "Option::is_none")]
	pub session_key: Option<String>,
	#[serde(default, alias = "expiresAt", skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<String>,
	#[serde(default, alias = "userPublicKey", skip_serializing_if = "Option::is_none")]
	pub user_public_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// Why a 2xx response could not be turned into a [`SessionRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
	/// The registrar explicitly declined the session.
	Rejected(String),
	/// The body does not describe a usable session.
	Malformed(String),
}

impl CreateSessionResponse {
	/// Interprets the reply for the intent that was sent by `owner`.
	///
	/// Missing `session_id` and `expires_at` fall back to the intent's own values;
	/// anything that contradicts the intent is treated as a failure.
	pub fn into_record(
		self,
		intent: &SessionIntent,
		owner: PublicKey,
		created_at: DateTime<Utc>,
	) -> Result<SessionRecord, ResponseError> {
		if self.success == Some(false) {
			return Err(ResponseError::Rejected(
				self.message.unwrap_or_else(|| "registrar declined the session".to_string()),
			));
		}

		if let Some(echoed) = self.user_public_key.as_deref() {
			let echoed: PublicKey = echoed
				.parse()
				.map_err(|e| ResponseError::Malformed(format!("user_public_key: {e}")))?;
			if echoed != owner {
				return Err(ResponseError::Rejected(format!(
					"registrar issued the session for {echoed}, expected {owner}"
				)));
			}
		}

		if let Some(key) = self.session_key.as_deref() {
			if key != intent.session_key().to_string() {
				return Err(ResponseError::Malformed(format!(
					"session_key {key} does not match the signed intent"
				)));
			}
		}

		let expires_at = match self.expires_at.as_deref() {
			Some(raw) => DateTime::parse_from_rfc3339(raw)
				.map(|dt| dt.with_timezone(&Utc))
				.map_err(|e| ResponseError::Malformed(format!("expires_at `{raw}`: {e}")))?,
			None => intent.expires_at(),
		};
		if expires_at <= created_at {
			return Err(ResponseError::Malformed(format!("expires_at {expires_at} is already in the past")));
		}

		let session_id = match self.session_id {
			Some(id) if !id.trim().is_empty() => id,
			Some(_) => return Err(ResponseError::Malformed("empty session_id".to_string())),
			None => intent.session_key().to_string(),
		};

		Ok(SessionRecord {
			session_id,
			session_key: intent.session_key(),
			owner,
			domain: intent.domain().to_string(),
			chain_id: intent.chain_id().to_string(),
			expires_at,
			created_at,
			simulated: false,
		})
	}
}
