//! Session-key handshake client for Forge Protocol.
//!
//! A wallet authorizes a time-boxed delegate by signing a human-readable intent;
//! the signed intent is exchanged with a remote registrar for a session record
//! that is cached until it expires or is revoked.
//!
//! ```text
//! WalletConnector -> SessionIntent::render -> sign_intent -> Registrar -> SessionCache
//! ```
//!
//! [`SessionManager`] wires these together and is meant to be constructed once
//! per application and shared by reference.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod registrar;
pub mod relay;
pub mod signer;
pub mod wallet;

pub use cache::{CacheLookup, FileStore, MemoryStore, SessionCache, SessionStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FallbackPolicy, SessionConfig};
pub use error::{Error, RegistrationFailure, Result, SessionRegistrationError};
pub use manager::{Established, SessionManager, SessionOptions};
pub use registrar::{HttpRegistrar, Registrar};
pub use relay::TransactionRelay;
pub use signer::sign_intent;
pub use wallet::{Approval, ConnectionState, KeypairWallet, ProviderError, WalletConnector, WalletEvent, WalletProvider};

pub use forge_session_protocol as protocol;
pub use forge_session_protocol::{PublicKey, SessionIntent, SessionRecord, Signature, TokenAllowance, TokenScope};
