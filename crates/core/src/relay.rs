//! Hand-off point for transactions submitted under a session.

use async_trait::async_trait;
use forge_session_protocol::SessionRecord;

use crate::error::Result;

/// Submits serialized transactions on behalf of a session.
///
/// Implementations only ever receive sessions that were active when
/// [`SessionManager::send`](crate::SessionManager::send) was called.
#[async_trait]
pub trait TransactionRelay: Send + Sync {
	/// Returns the relay's identifier for the submitted transaction.
	async fn submit(&self, session: &SessionRecord, transaction: &[u8]) -> Result<String>;
}
