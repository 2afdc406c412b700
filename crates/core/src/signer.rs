//! Turns a composed intent into a signed payload.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use forge_session_protocol::{PublicKey, SessionIntent, Signature, SignedSessionPayload};
use tracing::debug;

use crate::error::{Error, Result};
use crate::wallet::WalletConnector;

/// Asks the connected wallet to sign the rendered intent.
///
/// The signature is checked against the connected key before the payload is
/// returned, so a registrar never sees a payload that would fail verification.
///
/// # Errors
///
/// [`Error::NotConnected`] without a connected wallet, [`Error::SigningRejected`]
/// when the user declines or the wallet signs with a different key.
pub async fn sign_intent(connector: &WalletConnector, intent: SessionIntent) -> Result<SignedSessionPayload> {
	let owner = connector.public_key().ok_or(Error::NotConnected)?;
	let message = intent.render();
	let signature = connector.sign_message(message.as_bytes()).await?;

	verify(owner, message.as_bytes(), &signature)?;
	debug!(
		target = "forge_session",
		%owner,
		session_key = %intent.session_key(),
		"intent signed"
	);
	Ok(SignedSessionPayload::new(intent, message, owner, signature))
}

/// Verifies an Ed25519 signature over `message` by `owner`.
pub fn verify(owner: PublicKey, message: &[u8], signature: &Signature) -> Result<()> {
	let key = VerifyingKey::from_bytes(owner.as_bytes()).map_err(|_| Error::SigningRejected {
		reason: format!("{owner} is not a valid Ed25519 public key"),
	})?;
	key.verify(message, &DalekSignature::from_bytes(signature.as_bytes()))
		.map_err(|_| Error::SigningRejected {
			reason: "signature does not verify against the connected wallet".into(),
		})
}
