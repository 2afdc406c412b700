//! Handshake orchestration.
//!
//! [`SessionManager`] owns the connector, registrar and cache for one
//! application instance. Construct it once and share it behind an `Arc`.

use std::sync::Arc;

use chrono::Duration;
use forge_session_protocol::{IntentError, PublicKey, SessionIntent, SessionRecord, SignedSessionPayload, TokenScope};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::cache::{CacheLookup, SessionCache};
use crate::config::{FallbackPolicy, SessionConfig};
use crate::error::{Error, Result, SessionRegistrationError};
use crate::registrar::Registrar;
use crate::relay::TransactionRelay;
use crate::signer::sign_intent;
use crate::wallet::{WalletConnector, WalletEvent};

/// Per-handshake overrides of [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
	pub domain: Option<String>,
	pub expiry: Option<Duration>,
	/// `None` grants every token.
	pub token_scope: Option<TokenScope>,
}

/// Result of [`SessionManager::establish_or_simulate`].
#[derive(Debug, Clone)]
pub struct Established {
	pub record: SessionRecord,
	/// Set when the registrar failed and a simulated record was cached instead.
	pub fallback: Option<SessionRegistrationError>,
}

pub struct SessionManager {
	config: SessionConfig,
	connector: WalletConnector,
	registrar: Arc<dyn Registrar>,
	cache: SessionCache,
	updates: watch::Sender<Option<SessionRecord>>,
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("connector", &self.connector)
			.field("registrar", &self.registrar.endpoint())
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}

impl SessionManager {
	pub fn new(config: SessionConfig, connector: WalletConnector, registrar: Arc<dyn Registrar>, cache: SessionCache) -> Self {
		let (updates, _) = watch::channel(None);
		Self {
			config,
			connector,
			registrar,
			cache,
			updates,
		}
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn connector(&self) -> &WalletConnector {
		&self.connector
	}

	pub fn cache(&self) -> &SessionCache {
		&self.cache
	}

	/// Observes the active session of the connected wallet; `None` once it ends.
	pub fn subscribe(&self) -> watch::Receiver<Option<SessionRecord>> {
		self.updates.subscribe()
	}

	/// Connects the wallet and restores its cached session, if still valid.
	pub async fn connect(&self) -> Result<PublicKey> {
		let owner = self.connector.connect().await?;
		let restored = self.cache.get(&owner)?;
		if let Some(record) = &restored {
			debug!(target = "forge_session", %owner, session_id = %record.session_id, "restored cached session");
		}
		self.updates.send_replace(restored);
		Ok(owner)
	}

	/// Builds an intent from the config, `options` and the cache clock.
	pub fn compose_intent(&self, options: &SessionOptions) -> Result<SessionIntent> {
		let now = self.cache.clock().now();
		let expiry = options.expiry.unwrap_or_else(|| self.config.expiry());
		let expires_at = now
			.checked_add_signed(expiry)
			.ok_or(IntentError::ExpiryOutOfRange { expiry })?;
		let domain = options.domain.as_deref().unwrap_or(&self.config.domain);
		let intent = SessionIntent::builder(domain)
			.version(self.config.version.as_str())
			.chain_id(self.config.chain_id.as_str())
			.expires_at(expires_at)
			.token_scope(options.token_scope.clone())
			.build(now)?;
		Ok(intent)
	}

	/// Connect, compose and sign. Nothing is sent or cached.
	async fn prepare(&self, options: &SessionOptions) -> Result<SignedSessionPayload> {
		self.connect().await?;
		let intent = self.compose_intent(options)?;
		sign_intent(&self.connector, intent).await
	}

	fn commit(&self, record: SessionRecord) -> Result<SessionRecord> {
		self.cache.set(record.clone())?;
		if self.connector.public_key() == Some(record.owner) {
			self.updates.send_replace(Some(record.clone()));
		}
		Ok(record)
	}

	/// Runs the full handshake and caches the registered session.
	///
	/// # Errors
	///
	/// Any failure leaves the cache as it was. A declined signature never
	/// reaches the registrar.
	pub async fn establish(&self, options: &SessionOptions) -> Result<SessionRecord> {
		let payload = self.prepare(options).await?;
		let record = self.registrar.register(payload).await?;
		self.commit(record)
	}

	/// Like [`establish`](Self::establish), but with [`FallbackPolicy::Simulate`]
	/// a registrar failure caches a record flagged `simulated` instead.
	///
	/// Wallet failures are never simulated away.
	pub async fn establish_or_simulate(&self, options: &SessionOptions) -> Result<Established> {
		let payload = self.prepare(options).await?;
		let intent = payload.intent().clone();
		let owner = payload.public_key();

		match self.registrar.register(payload).await {
			Ok(record) => Ok(Established {
				record: self.commit(record)?,
				fallback: None,
			}),
			Err(err) if self.config.fallback == FallbackPolicy::Simulate => {
				warn!(
					target = "forge_session",
					%owner,
					error = %err,
					"registrar unavailable, caching simulated session"
				);
				let record = SessionRecord::simulated(&intent, owner, self.cache.clock().now());
				Ok(Established {
					record: self.commit(record)?,
					fallback: Some(err),
				})
			}
			Err(err) => Err(err.into()),
		}
	}

	/// Re-runs the handshake for the connected wallet, replacing its session.
	///
	/// # Errors
	///
	/// [`Error::NoActiveSession`] when the wallet never had a session.
	pub async fn renew(&self, options: &SessionOptions) -> Result<SessionRecord> {
		let owner = self.connector.public_key().ok_or(Error::NotConnected)?;
		if self.cache.lookup(&owner)? == CacheLookup::Missing {
			return Err(Error::NoActiveSession { owner });
		}
		info!(target = "forge_session", %owner, "renewing session");
		self.establish(options).await
	}

	/// The connected wallet's usable session.
	pub fn active_session(&self) -> Result<SessionRecord> {
		let owner = self.connector.public_key().ok_or(Error::NotConnected)?;
		self.session_for(&owner)
	}

	pub fn session_for(&self, owner: &PublicKey) -> Result<SessionRecord> {
		match self.cache.lookup(owner)? {
			CacheLookup::Active(record) => Ok(record),
			CacheLookup::Expired { expired_at } => {
				self.publish_cleared(owner);
				Err(Error::SessionExpired { expired_at })
			}
			CacheLookup::Missing => Err(Error::NoActiveSession { owner: *owner }),
		}
	}

	/// Drops the connected wallet's session.
	pub fn revoke(&self) -> Result<Option<SessionRecord>> {
		let owner = self.connector.public_key().ok_or(Error::NotConnected)?;
		self.revoke_owner(&owner)
	}

	pub fn revoke_owner(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		let removed = self.cache.clear(owner)?;
		self.publish_cleared(owner);
		Ok(removed)
	}

	/// Disconnects the wallet and drops its session.
	///
	/// # Errors
	///
	/// A provider failure is returned after the session has been dropped.
	pub async fn disconnect(&self) -> Result<Option<SessionRecord>> {
		let connected = self.connector.public_key();
		let outcome = self.connector.disconnect().await;
		let owner = match &outcome {
			Ok(previous) => previous.or(connected),
			Err(_) => connected,
		};
		let removed = match owner {
			Some(owner) => self.revoke_owner(&owner)?,
			None => None,
		};
		if let Err(e) = outcome {
			warn!(target = "forge_session", error = %e, "wallet disconnect failed; session dropped anyway");
			return Err(e);
		}
		Ok(removed)
	}

	/// Applies an unsolicited wallet event, dropping the session whose owner lost authority.
	pub fn handle_wallet_event(&self, event: &WalletEvent) -> Result<Option<SessionRecord>> {
		debug!(target = "forge_session", ?event, "wallet event");
		let ended = self.connector.apply_event(event);
		let removed = match ended {
			Some(owner) => self.revoke_owner(&owner)?,
			None => None,
		};
		if let WalletEvent::Connected(owner) | WalletEvent::AccountChanged(Some(owner)) = event {
			self.updates.send_replace(self.cache.get(owner)?);
		}
		Ok(removed)
	}

	/// Processes wallet events until the provider closes its channel.
	///
	/// Typically spawned: `tokio::spawn(async move { manager.watch_wallet_events().await })`.
	pub async fn watch_wallet_events(&self) {
		let mut events = self.connector.subscribe();
		loop {
			match events.recv().await {
				Ok(event) => {
					if let Err(e) = self.handle_wallet_event(&event) {
						warn!(target = "forge_session", error = %e, "failed to apply wallet event");
					}
				}
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!(target = "forge_session", skipped, "wallet events dropped");
				}
				Err(broadcast::error::RecvError::Closed) => {
					debug!(target = "forge_session", "wallet event stream closed");
					break;
				}
			}
		}
	}

	/// Submits `transaction` under the connected wallet's active session.
	///
	/// # Errors
	///
	/// Missing or expired sessions fail before the relay is called.
	pub async fn send(&self, transaction: &[u8], relay: &dyn TransactionRelay) -> Result<String> {
		let session = self.active_session()?;
		let id = relay.submit(&session, transaction).await?;
		info!(
			target = "forge_session",
			session_id = %session.session_id,
			transaction = %id,
			simulated = session.simulated,
			"transaction submitted"
		);
		Ok(id)
	}

	fn publish_cleared(&self, owner: &PublicKey) {
		self.updates.send_if_modified(|current| {
			if current.as_ref().is_some_and(|r| r.owner == *owner) {
				*current = None;
				true
			} else {
				false
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use chrono::{TimeZone, Utc};
	use parking_lot::Mutex;

	use super::*;
	use crate::cache::MemoryStore;
	use crate::clock::{Clock, ManualClock};
	use crate::error::RegistrationFailure;
	use crate::wallet::{Approval, KeypairWallet, ProviderError, WalletProvider};

	/// Registrar that answers from a script and records what it was sent.
	#[derive(Default)]
	struct ScriptedRegistrar {
		fail: Mutex<Option<RegistrationFailure>>,
		seen: Mutex<Vec<String>>,
		clock: Option<ManualClock>,
	}

	#[async_trait]
	impl Registrar for ScriptedRegistrar {
		async fn register(&self, payload: SignedSessionPayload) -> std::result::Result<SessionRecord, SessionRegistrationError> {
			self.seen.lock().push(payload.message().to_string());
			if let Some(failure) = self.fail.lock().clone() {
				return Err(SessionRegistrationError::new("scripted", failure));
			}
			let owner = payload.public_key();
			let now = self.clock.as_ref().map(|c| c.now()).unwrap_or_else(Utc::now);
			let (_, intent) = payload.into_request();
			Ok(SessionRecord {
				session_id: "abc".into(),
				session_key: intent.session_key(),
				owner,
				domain: intent.domain().into(),
				chain_id: intent.chain_id().into(),
				expires_at: intent.expires_at(),
				created_at: now,
				simulated: false,
			})
		}

		fn endpoint(&self) -> &str {
			"scripted"
		}
	}

	struct Fixture {
		wallet: Arc<KeypairWallet>,
		clock: ManualClock,
		registrar: Arc<ScriptedRegistrar>,
		manager: SessionManager,
	}

	fn fixture(config: SessionConfig) -> Fixture {
		let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap());
		let wallet = Arc::new(KeypairWallet::generate().unwrap());
		let registrar = Arc::new(ScriptedRegistrar {
			clock: Some(clock.clone()),
			..Default::default()
		});
		let cache = SessionCache::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
		let manager = SessionManager::new(config, WalletConnector::new(wallet.clone()), registrar.clone(), cache);
		Fixture {
			wallet,
			clock,
			registrar,
			manager,
		}
	}

	#[tokio::test]
	async fn establish_caches_registered_session() {
		let fx = fixture(SessionConfig::default());
		let mut updates = fx.manager.subscribe();
		let record = fx.manager.establish(&SessionOptions::default()).await.unwrap();

		assert_eq!(record.session_id, "abc");
		assert_eq!(record.owner, fx.wallet.public_key());
		assert_eq!(record.expires_at, fx.clock.now() + Duration::days(7));
		assert_eq!(fx.manager.active_session().unwrap(), record);
		assert!(updates.has_changed().unwrap());
		assert_eq!(*updates.borrow_and_update(), Some(record));
	}

	#[tokio::test]
	async fn options_override_config() {
		let fx = fixture(SessionConfig::default());
		let scope = TokenScope::new([crate::TokenAllowance::limited("MintA", 5)]).unwrap();
		let options = SessionOptions {
			domain: Some("https://other.example".into()),
			expiry: Some(Duration::hours(1)),
			token_scope: Some(scope),
		};
		let record = fx.manager.establish(&options).await.unwrap();
		assert_eq!(record.domain, "https://other.example");
		assert_eq!(record.expires_at, fx.clock.now() + Duration::hours(1));
		assert!(fx.registrar.seen.lock()[0].ends_with("tokens:\n- MintA (limit: 5)"));
	}

	#[tokio::test]
	async fn declined_signature_never_reaches_registrar() {
		let fx = fixture(SessionConfig::default());
		let earlier = fx.manager.establish(&SessionOptions::default()).await.unwrap();
		fx.wallet.set_approval(Approval {
			connect: true,
			sign: false,
		});

		let err = fx.manager.establish(&SessionOptions::default()).await.unwrap_err();
		assert!(err.is_user_rejection());
		assert_eq!(fx.registrar.seen.lock().len(), 1);
		assert_eq!(fx.manager.active_session().unwrap(), earlier);
	}

	#[tokio::test]
	async fn registrar_failure_leaves_cache_untouched() {
		let fx = fixture(SessionConfig::default());
		*fx.registrar.fail.lock() = Some(RegistrationFailure::Network("refused".into()));

		let err = fx.manager.establish(&SessionOptions::default()).await.unwrap_err();
		assert!(matches!(err, Error::SessionRegistration(_)));
		assert!(matches!(fx.manager.active_session(), Err(Error::NoActiveSession { .. })));

		let err = fx.manager.establish_or_simulate(&SessionOptions::default()).await.unwrap_err();
		assert!(matches!(err, Error::SessionRegistration(_)));
	}

	#[tokio::test]
	async fn simulate_policy_caches_flagged_record() {
		let fx = fixture(SessionConfig {
			fallback: FallbackPolicy::Simulate,
			..SessionConfig::default()
		});
		*fx.registrar.fail.lock() = Some(RegistrationFailure::Timeout {
			after: std::time::Duration::from_secs(30),
		});

		let established = fx.manager.establish_or_simulate(&SessionOptions::default()).await.unwrap();
		assert!(established.record.simulated);
		assert!(established.record.session_id.starts_with("simulated-"));
		assert!(established.fallback.is_some());
		assert_eq!(fx.manager.active_session().unwrap(), established.record);
	}

	#[tokio::test]
	async fn expired_session_is_reported_then_forgotten() {
		let fx = fixture(SessionConfig::default());
		let record = fx.manager.establish(&SessionOptions::default()).await.unwrap();
		fx.clock.set(record.expires_at);

		assert!(matches!(
			fx.manager.active_session(),
			Err(Error::SessionExpired { expired_at }) if expired_at == record.expires_at
		));
		assert!(matches!(fx.manager.active_session(), Err(Error::NoActiveSession { .. })));
		assert_eq!(*fx.manager.subscribe().borrow(), None);
	}

	#[tokio::test]
	async fn renew_requires_prior_session() {
		let fx = fixture(SessionConfig::default());
		fx.manager.connect().await.unwrap();
		assert!(matches!(
			fx.manager.renew(&SessionOptions::default()).await,
			Err(Error::NoActiveSession { .. })
		));

		let first = fx.manager.establish(&SessionOptions::default()).await.unwrap();
		fx.clock.advance(Duration::days(1));
		let renewed = fx.manager.renew(&SessionOptions::default()).await.unwrap();
		assert_ne!(renewed.session_key, first.session_key);
		assert_eq!(renewed.expires_at, fx.clock.now() + Duration::days(7));
	}

	#[tokio::test]
	async fn disconnect_clears_session() {
		let fx = fixture(SessionConfig::default());
		let record = fx.manager.establish(&SessionOptions::default()).await.unwrap();

		assert_eq!(fx.manager.disconnect().await.unwrap(), Some(record.clone()));
		assert_eq!(fx.manager.cache().get(&record.owner).unwrap(), None);
		assert!(matches!(fx.manager.active_session(), Err(Error::NotConnected)));
	}

	/// Key wallet whose extension fails on disconnect.
	struct CrashingWallet(KeypairWallet);

	#[async_trait]
	impl WalletProvider for CrashingWallet {
		fn name(&self) -> &str {
			"crashing"
		}

		fn is_connected(&self) -> bool {
			self.0.is_connected()
		}

		fn public_key(&self) -> Option<PublicKey> {
			WalletProvider::public_key(&self.0)
		}

		async fn connect(&self) -> std::result::Result<PublicKey, ProviderError> {
			self.0.connect().await
		}

		async fn disconnect(&self) -> std::result::Result<(), ProviderError> {
			Err(ProviderError::Unavailable("extension crashed".into()))
		}

		async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, ProviderError> {
			self.0.sign_message(message).await
		}

		fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
			self.0.subscribe()
		}
	}

	#[tokio::test]
	async fn failed_wallet_disconnect_still_clears_session() {
		let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap());
		let registrar = Arc::new(ScriptedRegistrar {
			clock: Some(clock.clone()),
			..Default::default()
		});
		let cache = SessionCache::new(Arc::new(MemoryStore::new()), Arc::new(clock));
		let wallet = Arc::new(CrashingWallet(KeypairWallet::generate().unwrap()));
		let manager = SessionManager::new(SessionConfig::default(), WalletConnector::new(wallet), registrar, cache);
		let record = manager.establish(&SessionOptions::default()).await.unwrap();
		let mut updates = manager.subscribe();

		let err = manager.disconnect().await.unwrap_err();
		assert!(matches!(err, Error::Wallet(ref msg) if msg == "extension crashed"));
		assert_eq!(manager.cache().get(&record.owner).unwrap(), None);
		assert_eq!(*updates.borrow_and_update(), None);
	}

	#[tokio::test]
	async fn unrepresentable_expiry_is_an_intent_error() {
		let fx = fixture(SessionConfig::default());
		let options = SessionOptions {
			expiry: Some(Duration::days(4_000_000_000)),
			..SessionOptions::default()
		};
		assert!(matches!(
			fx.manager.compose_intent(&options),
			Err(Error::Intent(IntentError::ExpiryOutOfRange { .. }))
		));
		assert!(fx.manager.establish(&options).await.is_err());
		assert!(fx.registrar.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn account_change_drops_previous_owner() {
		let fx = fixture(SessionConfig::default());
		let record = fx.manager.establish(&SessionOptions::default()).await.unwrap();
		let other = PublicKey::new([9; 32]);

		let removed = fx
			.manager
			.handle_wallet_event(&WalletEvent::AccountChanged(Some(other)))
			.unwrap();
		assert_eq!(removed, Some(record.clone()));
		assert_eq!(fx.manager.cache().get(&record.owner).unwrap(), None);
		assert!(matches!(fx.manager.active_session(), Err(Error::NoActiveSession { owner }) if owner == other));
	}

	#[tokio::test]
	async fn wallet_disconnect_event_is_watched() {
		let fx = fixture(SessionConfig::default());
		let record = fx.manager.establish(&SessionOptions::default()).await.unwrap();
		let manager = Arc::new(fx.manager);
		let mut updates = manager.subscribe();

		let watcher = tokio::spawn({
			let manager = manager.clone();
			async move { manager.watch_wallet_events().await }
		});
		tokio::task::yield_now().await;
		fx.wallet.emit(WalletEvent::Disconnected);
		updates.changed().await.unwrap();

		assert_eq!(*updates.borrow(), None);
		assert_eq!(manager.cache().get(&record.owner).unwrap(), None);
		watcher.abort();
	}

	struct EchoRelay;

	#[async_trait]
	impl TransactionRelay for EchoRelay {
		async fn submit(&self, session: &SessionRecord, transaction: &[u8]) -> Result<String> {
			Ok(format!("{}:{}", session.session_id, transaction.len()))
		}
	}

	#[tokio::test]
	async fn send_requires_active_session() {
		let fx = fixture(SessionConfig::default());
		fx.manager.connect().await.unwrap();
		assert!(matches!(
			fx.manager.send(b"tx", &EchoRelay).await,
			Err(Error::NoActiveSession { .. })
		));

		fx.manager.establish(&SessionOptions::default()).await.unwrap();
		assert_eq!(fx.manager.send(b"tx", &EchoRelay).await.unwrap(), "abc:2");

		fx.clock.advance(Duration::days(8));
		assert!(matches!(fx.manager.send(b"tx", &EchoRelay).await, Err(Error::SessionExpired { .. })));
	}
}
