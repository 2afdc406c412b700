//! Wallet connector and the injected-wallet boundary.
//!
//! [`WalletProvider`] mirrors the object a browser wallet extension injects into
//! the page (`connect`, `disconnect`, `signMessage`, `publicKey`/`isConnected`
//! and its event stream). [`WalletConnector`] wraps one provider and turns its
//! raw results into the crate's error taxonomy.

mod keypair;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use forge_session_protocol::{PublicKey, Signature};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

pub use keypair::{Approval, KeypairWallet};

use crate::error::{Error, Result};

/// Raw provider failure, before classification by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
	/// The user dismissed or declined the prompt.
	#[error("request rejected by user")]
	Rejected,
	/// The provider could not service the request.
	#[error("{0}")]
	Unavailable(String),
}

/// Events a provider emits on its own initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEvent {
	Connected(PublicKey),
	Disconnected,
	/// The user switched accounts in the wallet; `None` when no account is exposed anymore.
	AccountChanged(Option<PublicKey>),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Display name, e.g. `"phantom"` or `"keypair"`.
	fn name(&self) -> &str;

	fn is_installed(&self) -> bool {
		true
	}

	fn is_connected(&self) -> bool;

	fn public_key(&self) -> Option<PublicKey>;

	async fn connect(&self) -> std::result::Result<PublicKey, ProviderError>;

	async fn disconnect(&self) -> std::result::Result<(), ProviderError>;

	/// Signs arbitrary bytes. Providers return raw signature bytes of any length.
	async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, ProviderError>;

	fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Observable connection state of a [`WalletConnector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
	#[default]
	Disconnected,
	Connected(PublicKey),
}

impl ConnectionState {
	pub fn public_key(&self) -> Option<PublicKey> {
		match self {
			ConnectionState::Connected(key) => Some(*key),
			ConnectionState::Disconnected => None,
		}
	}
}

pub struct WalletConnector {
	provider: Arc<dyn WalletProvider>,
	state: watch::Sender<ConnectionState>,
}

impl fmt::Debug for WalletConnector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WalletConnector")
			.field("provider", &self.provider.name())
			.field("state", &*self.state.borrow())
			.finish()
	}
}

impl WalletConnector {
	pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
		let (state, _) = watch::channel(ConnectionState::Disconnected);
		Self { provider, state }
	}

	/// Picks the first installed provider.
	///
	/// # Errors
	///
	/// Returns [`Error::WalletNotFound`] if none of the candidates is installed.
	pub fn detect<I>(candidates: I) -> Result<Self>
	where
		I: IntoIterator<Item = Arc<dyn WalletProvider>>,
	{
		let provider = candidates
			.into_iter()
			.find(|p| p.is_installed())
			.ok_or(Error::WalletNotFound)?;
		debug!(target = "forge_session", provider = provider.name(), "wallet provider detected");
		Ok(Self::new(provider))
	}

	pub fn provider_name(&self) -> &str {
		self.provider.name()
	}

	pub fn state(&self) -> ConnectionState {
		*self.state.borrow()
	}

	/// Receiver that observes every connection state change.
	pub fn watch(&self) -> watch::Receiver<ConnectionState> {
		self.state.subscribe()
	}

	pub fn public_key(&self) -> Option<PublicKey> {
		self.state().public_key()
	}

	/// Connects without prompting when the provider already exposes a connected account.
	///
	/// # Errors
	///
	/// Returns [`Error::UserRejected`] when the user declines, [`Error::Wallet`]
	/// when the provider fails otherwise.
	pub async fn connect(&self) -> Result<PublicKey> {
		if let Some(key) = self.public_key() {
			return Ok(key);
		}

		if self.provider.is_connected() {
			if let Some(key) = self.provider.public_key() {
				debug!(target = "forge_session", %key, "wallet already connected");
				self.state.send_replace(ConnectionState::Connected(key));
				return Ok(key);
			}
		}

		let key = self.provider.connect().await.map_err(|e| match e {
			ProviderError::Rejected => Error::UserRejected,
			ProviderError::Unavailable(msg) => Error::Wallet(msg),
		})?;
		info!(target = "forge_session", provider = self.provider.name(), %key, "wallet connected");
		self.state.send_replace(ConnectionState::Connected(key));
		Ok(key)
	}

	/// Disconnects and returns the key that was connected, if any.
	pub async fn disconnect(&self) -> Result<Option<PublicKey>> {
		self.provider
			.disconnect()
			.await
			.map_err(|e| Error::Wallet(e.to_string()))?;
		let previous = self.state.send_replace(ConnectionState::Disconnected).public_key();
		if let Some(key) = previous {
			info!(target = "forge_session", %key, "wallet disconnected");
		}
		Ok(previous)
	}

	/// Signs `message` with the connected wallet.
	///
	/// # Errors
	///
	/// Returns [`Error::NotConnected`] before a successful [`connect`](Self::connect),
	/// [`Error::SigningRejected`] when the user declines or the wallet returns
	/// something that is not an Ed25519 signature.
	pub async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
		if self.public_key().is_none() {
			return Err(Error::NotConnected);
		}

		let raw = self.provider.sign_message(message).await.map_err(|e| match e {
			ProviderError::Rejected => Error::SigningRejected {
				reason: "user declined to sign".into(),
			},
			ProviderError::Unavailable(msg) => Error::Wallet(msg),
		})?;

		Signature::from_slice(&raw).map_err(|e| Error::SigningRejected {
			reason: format!("wallet returned an invalid signature: {e}"),
		})
	}

	pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
		self.provider.subscribe()
	}

	/// Folds a provider event into the connection state.
	///
	/// Returns the key whose authority ended, so callers can drop its session.
	pub fn apply_event(&self, event: &WalletEvent) -> Option<PublicKey> {
		let next = match event {
			WalletEvent::Connected(key) | WalletEvent::AccountChanged(Some(key)) => ConnectionState::Connected(*key),
			WalletEvent::Disconnected | WalletEvent::AccountChanged(None) => ConnectionState::Disconnected,
		};
		let previous = self.state.send_replace(next).public_key();
		previous.filter(|prev| next.public_key() != Some(*prev))
	}
}
