//! Wire and data types for the Forge session-key handshake.
//!
//! A browser or local wallet authorizes a time-boxed delegate ("session key") by
//! signing a human-readable [`SessionIntent`]. The signed payload is exchanged with
//! a remote registrar for a [`SessionRecord`] that the client caches until it
//! expires or is revoked.
//!
//! # Main Types
//!
//! - [`SessionIntent`] - what the session authorizes, rendered into the approval text
//! - [`SignedSessionPayload`] - intent plus the wallet's signature, sent once
//! - [`CreateSessionRequest`] / [`CreateSessionResponse`] - registrar JSON bodies
//! - [`SessionRecord`] - the cached result of a successful handshake
//! - [`PublicKey`] / [`Signature`] - Ed25519 identity and signature newtypes

pub mod intent;
pub mod keys;
pub mod registrar;
pub mod session;

pub use intent::{IntentBuilder, IntentError, SessionIntent, TokenAllowance, TokenScope};
pub use keys::{KeyError, PublicKey, Signature};
pub use registrar::{CREATE_SESSION_PATH, CreateSessionRequest, CreateSessionResponse, ResponseError};
pub use session::{SessionRecord, SignedSessionPayload};
