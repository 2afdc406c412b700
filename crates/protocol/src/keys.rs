//! Ed25519 public key and signature newtypes.
//!
//! Public keys travel as base58 (the Solana convention), signatures as standard
//! base64, matching what the registrar verifies.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Failure decoding a key or signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
	#[error("invalid base58: {0}")]
	Base58(String),

	#[error("invalid base64: {0}")]
	Base64(String),

	#[error("expected {expected} bytes, got {actual}")]
	Length { expected: usize, actual: usize },
}

/// A wallet's long-lived public identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
	pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
		Self(bytes)
	}

	pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
		let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| KeyError::Length {
			expected: PUBLIC_KEY_LEN,
			actual: bytes.len(),
		})?;
		Ok(Self(array))
	}

	pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
		&self.0
	}

	pub fn to_base58(&self) -> String {
		bs58::encode(self.0).into_string()
	}
}

impl fmt::Display for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_base58())
	}
}

impl fmt::Debug for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PublicKey({})", self.to_base58())
	}
}

impl FromStr for PublicKey {
	type Err = KeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = bs58::decode(s.trim())
			.into_vec()
			.map_err(|e| KeyError::Base58(e.to_string()))?;
		Self::from_slice(&bytes)
	}
}

impl Serialize for PublicKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for PublicKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// Raw signature bytes returned by a wallet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
	pub const fn new(bytes: [u8; SIGNATURE_LEN]) -> Self {
		Self(bytes)
	}

	/// Wallets hand back variable-length buffers; anything but 64 bytes is not Ed25519.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
		let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| KeyError::Length {
			expected: SIGNATURE_LEN,
			actual: bytes.len(),
		})?;
		Ok(Self(array))
	}

	pub fn from_base64(s: &str) -> Result<Self, KeyError> {
		let bytes = STANDARD.decode(s).map_err(|e| KeyError::Base64(e.to_string()))?;
		Self::from_slice(&bytes)
	}

	pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
		&self.0
	}

	pub fn to_base64(&self) -> String {
		STANDARD.encode(self.0)
	}
}

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let encoded = self.to_base64();
		write!(f, "Signature({}…)", &encoded[..12])
	}
}
