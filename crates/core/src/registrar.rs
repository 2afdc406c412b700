//! Session registrar client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_session_protocol::registrar::{CREATE_SESSION_PATH, CreateSessionResponse, ResponseError};
use forge_session_protocol::{SessionRecord, SignedSessionPayload};
use reqwest::header::ACCEPT;
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{Error, RegistrationFailure, Result, SessionRegistrationError};

/// Longest response body echoed back in a [`RegistrationFailure::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Exchanges a signed intent for a session record.
#[async_trait]
pub trait Registrar: Send + Sync {
	/// Submits `payload` once. Consuming it keeps a signed intent from being sent twice.
	async fn register(&self, payload: SignedSessionPayload) -> std::result::Result<SessionRecord, SessionRegistrationError>;

	/// Where sessions are registered, for diagnostics.
	fn endpoint(&self) -> &str;
}

/// [`Registrar`] speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistrar {
	client: reqwest::Client,
	endpoint: String,
	timeout: Duration,
	clock: Arc<dyn Clock>,
}

impl HttpRegistrar {
	/// `base_url` is the registrar API root, e.g. `https://testnet.fogo.io/api`.
	pub fn new(base_url: &str, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
		let base = Url::parse(base_url).map_err(|e| Error::Config(format!("registrar URL `{base_url}`: {e}")))?;
		if !matches!(base.scheme(), "http" | "https") {
			return Err(Error::Config(format!("registrar URL must be http(s), got `{}`", base.scheme())));
		}
		let endpoint = format!("{}{CREATE_SESSION_PATH}", base.as_str().trim_end_matches('/'));

		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

		Ok(Self {
			client,
			endpoint,
			timeout,
			clock,
		})
	}

	/// Registrar for `config.registrar_url`, timestamping records with `clock`.
	pub fn from_config(config: &SessionConfig, clock: Arc<dyn Clock>) -> Result<Self> {
		Self::new(&config.registrar_url, config.request_timeout(), clock)
	}

	fn fail(&self, failure: RegistrationFailure) -> SessionRegistrationError {
		warn!(target = "forge_session", endpoint = %self.endpoint, %failure, "session registration failed");
		SessionRegistrationError::new(self.endpoint.clone(), failure)
	}
}

#[async_trait]
impl Registrar for HttpRegistrar {
	async fn register(&self, payload: SignedSessionPayload) -> std::result::Result<SessionRecord, SessionRegistrationError> {
		let owner = payload.public_key();
		let (request, intent) = payload.into_request();
		debug!(
			target = "forge_session",
			endpoint = %self.endpoint,
			%owner,
			session_key = %intent.session_key(),
			"registering session"
		);

		let response = self
			.client
			.post(&self.endpoint)
			.header(ACCEPT, "application/json")
			.json(&request)
			.send()
			.await
			.map_err(|e| self.fail(classify(e, self.timeout)))?;

		let status = response.status();
		let body = response.text().await.map_err(|e| self.fail(classify(e, self.timeout)))?;

		if !status.is_success() {
			let mut body = body;
			if body.len() > MAX_ERROR_BODY {
				let mut cut = MAX_ERROR_BODY;
				while !body.is_char_boundary(cut) {
					cut -= 1;
				}
				body.truncate(cut);
			}
			return Err(self.fail(RegistrationFailure::Status {
				status: status.as_u16(),
				body,
			}));
		}

		let parsed: CreateSessionResponse = serde_json::from_str(&body).map_err(|e| {
			self.fail(RegistrationFailure::Malformed {
				reason: format!("invalid JSON: {e}"),
			})
		})?;

		let record = parsed
			.into_record(&intent, owner, self.clock.now())
			.map_err(|e| {
				self.fail(match e {
					ResponseError::Rejected(reason) => RegistrationFailure::Rejected { reason },
					ResponseError::Malformed(reason) => RegistrationFailure::Malformed { reason },
				})
			})?;

		info!(
			target = "forge_session",
			session_id = %record.session_id,
			%owner,
			expires_at = %record.expires_at,
			"session registered"
		);
		Ok(record)
	}

	fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

fn classify(err: reqwest::Error, timeout: Duration) -> RegistrationFailure {
	if err.is_timeout() {
		RegistrationFailure::Timeout { after: timeout }
	} else {
		RegistrationFailure::Network(err.to_string())
	}
}
