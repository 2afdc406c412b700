//! Local Ed25519 wallet backed by a secret key on disk.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ed25519_dalek::{SECRET_KEY_LENGTH, Signer as _, SigningKey};
use forge_session_protocol::PublicKey;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use super::{ProviderError, WalletEvent, WalletProvider};
use crate::error::{Error, Result};

/// Which prompts a [`KeypairWallet`] approves. Both by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approval {
	pub connect: bool,
	pub sign: bool,
}

impl Default for Approval {
	fn default() -> Self {
		Self {
			connect: true,
			sign: true,
		}
	}
}

pub struct KeypairWallet {
	signing_key: SigningKey,
	connected: AtomicBool,
	connect_prompts: AtomicUsize,
	approval: Mutex<Approval>,
	events: broadcast::Sender<WalletEvent>,
}

impl std::fmt::Debug for KeypairWallet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeypairWallet")
			.field("public_key", &self.public_key())
			.field("connected", &self.connected.load(Ordering::SeqCst))
			.finish_non_exhaustive()
	}
}

impl KeypairWallet {
	pub fn from_signing_key(signing_key: SigningKey) -> Self {
		let (events, _) = broadcast::channel(16);
		Self {
			signing_key,
			connected: AtomicBool::new(false),
			connect_prompts: AtomicUsize::new(0),
			approval: Mutex::new(Approval::default()),
			events,
		}
	}

	pub fn generate() -> Result<Self> {
		let mut seed = [0u8; SECRET_KEY_LENGTH];
		getrandom::getrandom(&mut seed).map_err(|e| Error::Wallet(format!("no entropy source: {e}")))?;
		Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
	}

	/// Accepts a 32-byte seed or a 64-byte `seed || public key` keypair.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		match bytes.len() {
			32 => {
				let mut seed = [0u8; SECRET_KEY_LENGTH];
				seed.copy_from_slice(bytes);
				Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
			}
			64 => {
				let mut keypair = [0u8; 64];
				keypair.copy_from_slice(bytes);
				let signing_key = SigningKey::from_keypair_bytes(&keypair)
					.map_err(|_| Error::Wallet("keypair public half does not match its secret".into()))?;
				Ok(Self::from_signing_key(signing_key))
			}
			n => Err(Error::Wallet(format!("secret key must be 32 or 64 bytes, got {n}"))),
		}
	}

	/// Parses a hex secret, with or without a `0x` prefix.
	pub fn from_hex(secret: &str) -> Result<Self> {
		let trimmed = secret.trim();
		let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
		let bytes = hex::decode(trimmed).map_err(|e| Error::Wallet(format!("secret key is not valid hex: {e}")))?;
		Self::from_bytes(&bytes)
	}

	pub fn read_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)?;
		let wallet = Self::from_hex(&content)?;
		debug!(target = "forge_session", path = %path.display(), key = %wallet.public_key(), "loaded keypair");
		Ok(wallet)
	}

	/// Writes the 64-byte keypair as hex, readable only by the owner on Unix.
	pub fn write_to_file(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, self.secret_hex())?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
		}
		Ok(())
	}

	pub fn secret_hex(&self) -> String {
		hex::encode(self.signing_key.to_keypair_bytes())
	}

	pub fn public_key(&self) -> PublicKey {
		PublicKey::new(self.signing_key.verifying_key().to_bytes())
	}

	pub fn with_approval(self, approval: Approval) -> Self {
		*self.approval.lock() = approval;
		self
	}

	pub fn set_approval(&self, approval: Approval) {
		*self.approval.lock() = approval;
	}

	/// Number of times `connect` actually prompted.
	pub fn connect_prompts(&self) -> usize {
		self.connect_prompts.load(Ordering::SeqCst)
	}

	/// Emits an event as if the user acted in the wallet UI.
	pub fn emit(&self, event: WalletEvent) {
		if matches!(event, WalletEvent::Disconnected | WalletEvent::AccountChanged(None)) {
			self.connected.store(false, Ordering::SeqCst);
		}
		let _ = self.events.send(event);
	}
}

#[async_trait]
impl WalletProvider for KeypairWallet {
	fn name(&self) -> &str {
		"keypair"
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}

	fn public_key(&self) -> Option<PublicKey> {
		self.is_connected().then(|| KeypairWallet::public_key(self))
	}

	async fn connect(&self) -> std::result::Result<PublicKey, ProviderError> {
		self.connect_prompts.fetch_add(1, Ordering::SeqCst);
		if !self.approval.lock().connect {
			return Err(ProviderError::Rejected);
		}
		let key = KeypairWallet::public_key(self);
		self.connected.store(true, Ordering::SeqCst);
		let _ = self.events.send(WalletEvent::Connected(key));
		Ok(key)
	}

	async fn disconnect(&self) -> std::result::Result<(), ProviderError> {
		if self.connected.swap(false, Ordering::SeqCst) {
			let _ = self.events.send(WalletEvent::Disconnected);
		}
		Ok(())
	}

	async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, ProviderError> {
		if !self.is_connected() {
			return Err(ProviderError::Unavailable("wallet is not connected".into()));
		}
		if !self.approval.lock().sign {
			return Err(ProviderError::Rejected);
		}
		Ok(self.signing_key.sign(message).to_bytes().to_vec())
	}

	fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
		self.events.subscribe()
	}
}
