//! Signed payloads and cached session records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::SessionIntent;
use crate::keys::{PublicKey, Signature};
use crate::registrar::CreateSessionRequest;

/// An intent together with the wallet signature over its rendered text.
///
/// Sent to the registrar exactly once: [`into_request`](Self::into_request)
/// consumes the payload.
#[derive(Debug, Clone)]
pub struct SignedSessionPayload {
	intent: SessionIntent,
	message: String,
	public_key: PublicKey,
	signature: Signature,
}

impl SignedSessionPayload {
	/// `message` must be the exact text that was signed.
	pub fn new(intent: SessionIntent, message: String, public_key: PublicKey, signature: Signature) -> Self {
		Self {
			intent,
			message,
			public_key,
			signature,
		}
	}

	pub fn intent(&self) -> &SessionIntent {
		&self.intent
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn public_key(&self) -> PublicKey {
		self.public_key
	}

	pub fn signature(&self) -> &Signature {
		&self.signature
	}

	/// Builds the registrar body, returning the intent for interpreting the response.
	pub fn into_request(self) -> (CreateSessionRequest, SessionIntent) {
		let request = CreateSessionRequest {
			version: self.intent.version().to_string(),
			chain_id: self.intent.chain_id().to_string(),
			domain: self.intent.domain().to_string(),
			expires: self.intent.expires_iso(),
			session_key: self.intent.session_key().to_string(),
			public_key: self.public_key.to_string(),
			signature: self.signature.to_base64(),
			intent_message: self.message,
		};
		(request, self.intent)
	}
}

/// An established session as returned by the registrar and cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
	/// Identifier assigned by the registrar (may equal `session_key`).
	pub session_id: String,
	/// The key id generated for this handshake.
	pub session_key: Uuid,
	/// Wallet this session acts for.
	pub owner: PublicKey,
	pub domain: String,
	pub chain_id: String,
	pub expires_at: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	/// Locally fabricated because the registrar was unreachable and the caller opted in.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub simulated: bool,
}

impl SessionRecord {
	/// A stand-in record for offline/demo mode. Never produced by the registrar path.
	pub fn simulated(intent: &SessionIntent, owner: PublicKey, created_at: DateTime<Utc>) -> Self {
		Self {
			session_id: format!("simulated-{}", intent.session_key()),
			session_key: intent.session_key(),
			owner,
			domain: intent.domain().to_string(),
			chain_id: intent.chain_id().to_string(),
			expires_at: intent.expires_at(),
			created_at,
			simulated: true,
		}
	}

	/// A session is invalid at or after its expiry instant.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}

	/// Time left until expiry, zero once expired.
	pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
		(self.expires_at - now).max(Duration::zero())
	}
}
