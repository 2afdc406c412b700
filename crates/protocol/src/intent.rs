//! Session intents and their canonical human-readable rendering.
//!
//! The rendered text is what the wallet shows in its approval prompt and what the
//! registrar verifies the signature against, so the layout is fixed:
//!
//! ```text
//! Fogo Sessions:
//! Signing this intent will allow this app to interact with your on-chain balances.
//! Please make sure you trust this app and the domain in the message matches the domain of the current web application.
//!
//! version: 0.1
//! chain_id: fogo-testnet
//! domain: https://app.example
//! expires: 2026-10-25T12:00:00.000Z
//! session_key: 0b6c1f9e-3d0c-4b5e-9d55-3c1f2b8a7e10
//! tokens: this app may spend any amount of any token
//! ```

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Intent schema version understood by the registrar.
pub const DEFAULT_PROTOCOL_VERSION: &str = "0.1";

/// Warning block shown above the intent fields.
pub const INTENT_PREAMBLE: &str = "Fogo Sessions:\n\
Signing this intent will allow this app to interact with your on-chain balances.\n\
Please make sure you trust this app and the domain in the message matches the domain of the current web application.";

/// Token line used when the session is not restricted to specific tokens.
pub const UNRESTRICTED_TOKENS: &str = "this app may spend any amount of any token";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
	#[error("intent field `{0}` must not be empty")]
	MissingField(&'static str),

	#[error("intent field `{0}` must be a single line")]
	MultiLine(&'static str),

	#[error("session expiry {expires_at} is not after creation time {created_at}")]
	ExpiryNotInFuture {
		expires_at: DateTime<Utc>,
		created_at: DateTime<Utc>,
	},

	#[error("session lifetime {expiry} cannot be represented")]
	ExpiryOutOfRange { expiry: chrono::TimeDelta },

	#[error("token {0} appears more than once in the scope")]
	DuplicateToken(String),

	#[error("invalid token allowance `{0}`, expected MINT or MINT:LIMIT")]
	InvalidToken(String),
}

/// One token the session may act on, with an optional spending ceiling in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllowance {
	pub mint: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub limit: Option<u64>,
}

impl TokenAllowance {
	pub fn unlimited(mint: impl Into<String>) -> Self {
		Self {
			mint: mint.into(),
			limit: None,
		}
	}

	pub fn limited(mint: impl Into<String>, limit: u64) -> Self {
		Self {
			mint: mint.into(),
			limit: Some(limit),
		}
	}
}

impl FromStr for TokenAllowance {
	type Err = IntentError;

	/// Parses `MINT` or `MINT:LIMIT`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = || IntentError::InvalidToken(s.to_string());
		let (mint, limit) = match s.split_once(':') {
			Some((mint, limit)) => (mint.trim(), Some(limit.trim().parse::<u64>().map_err(|_| invalid())?)),
			None => (s.trim(), None),
		};
		if mint.is_empty() || mint.contains(char::is_whitespace) {
			return Err(invalid());
		}
		Ok(Self {
			mint: mint.to_string(),
			limit,
		})
	}
}

/// Ordered set of token allowances. Insertion order is preserved in the rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenScope {
	tokens: Vec<TokenAllowance>,
}

impl TokenScope {
	pub fn new(tokens: impl IntoIterator<Item = TokenAllowance>) -> Result<Self, IntentError> {
		let mut scope = Self::default();
		for token in tokens {
			if token.mint.trim().is_empty() {
				return Err(IntentError::MissingField("token mint"));
			}
			if scope.tokens.iter().any(|t| t.mint == token.mint) {
				return Err(IntentError::DuplicateToken(token.mint));
			}
			scope.tokens.push(token);
		}
		Ok(scope)
	}

	pub fn tokens(&self) -> &[TokenAllowance] {
		&self.tokens
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}

/// What a session authorizes. Built fresh for every handshake attempt.
///
/// Construct through [`SessionIntent::builder`]; the builder enforces the
/// invariants (non-empty single-line fields, expiry after creation) and draws a
/// new random `session_key` each time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIntent {
	version: String,
	chain_id: String,
	domain: String,
	expires_at: DateTime<Utc>,
	session_key: Uuid,
	token_scope: Option<TokenScope>,
}

impl SessionIntent {
	pub fn builder(domain: impl Into<String>) -> IntentBuilder {
		IntentBuilder::new(domain)
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn chain_id(&self) -> &str {
		&self.chain_id
	}

	pub fn domain(&self) -> &str {
		&self.domain
	}

	pub fn expires_at(&self) -> DateTime<Utc> {
		self.expires_at
	}

	pub fn session_key(&self) -> Uuid {
		self.session_key
	}

	pub fn token_scope(&self) -> Option<&TokenScope> {
		self.token_scope.as_ref()
	}

	/// Expiry as sent on the wire and shown to the approver (ISO-8601, millisecond precision, UTC).
	pub fn expires_iso(&self) -> String {
		self.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true)
	}

	/// Renders the canonical approval text. Pure function of the intent.
	pub fn render(&self) -> String {
		let mut out = String::with_capacity(INTENT_PREAMBLE.len() + 256);
		out.push_str(INTENT_PREAMBLE);
		out.push_str("\n\n");
		let _ = writeln!(out, "version: {}", self.version);
		let _ = writeln!(out, "chain_id: {}", self.chain_id);
		let _ = writeln!(out, "domain: {}", self.domain);
		let _ = writeln!(out, "expires: {}", self.expires_iso());
		let _ = writeln!(out, "session_key: {}", self.session_key);

		match self.token_scope.as_ref().filter(|scope| !scope.is_empty()) {
			None => {
				let _ = write!(out, "tokens: {UNRESTRICTED_TOKENS}");
			}
			Some(scope) => {
				out.push_str("tokens:");
				for token in scope.tokens() {
					let _ = write!(out, "\n- {}", token.mint);
					if let Some(limit) = token.limit {
						let _ = write!(out, " (limit: {limit})");
					}
				}
			}
		}
		out
	}

	/// UTF-8 bytes of [`render`](Self::render); this is exactly what gets signed.
	pub fn signing_bytes(&self) -> Vec<u8> {
		self.render().into_bytes()
	}
}

/// Builder for [`SessionIntent`].
#[derive(Debug, Clone)]
pub struct IntentBuilder {
	version: String,
	chain_id: String,
	domain: String,
	expires_at: Option<DateTime<Utc>>,
	token_scope: Option<TokenScope>,
}

impl IntentBuilder {
	fn new(domain: impl Into<String>) -> Self {
		Self {
			version: DEFAULT_PROTOCOL_VERSION.to_string(),
			chain_id: String::new(),
			domain: domain.into(),
			expires_at: None,
			token_scope: None,
		}
	}

	pub fn version(mut self, version: impl Into<String>) -> Self {
		self.version = version.into();
		self
	}

	pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
		self.chain_id = chain_id.into();
		self
	}

	pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
		self.expires_at = Some(expires_at);
		self
	}

	pub fn token_scope(mut self, scope: Option<TokenScope>) -> Self {
		self.token_scope = scope;
		self
	}

	/// Validates the fields against `created_at` and draws a fresh session key.
	pub fn build(self, created_at: DateTime<Utc>) -> Result<SessionIntent, IntentError> {
		let version = single_line("version", self.version)?;
		let chain_id = single_line("chain_id", self.chain_id)?;
		let domain = single_line("domain", self.domain)?;
		let expires_at = self.expires_at.ok_or(IntentError::MissingField("expires"))?.trunc_subsecs(3);

		if expires_at <= created_at {
			return Err(IntentError::ExpiryNotInFuture { expires_at, created_at });
		}

		Ok(SessionIntent {
			version,
			chain_id,
			domain,
			expires_at,
			session_key: Uuid::new_v4(),
			token_scope: self.token_scope,
		})
	}
}

fn single_line(field: &'static str, value: String) -> Result<String, IntentError> {
	let value = value.trim().to_string();
	if value.is_empty() {
		return Err(IntentError::MissingField(field));
	}
	if value.contains(['\n', '\r']) {
		return Err(IntentError::MultiLine(field));
	}
	Ok(value)
}
