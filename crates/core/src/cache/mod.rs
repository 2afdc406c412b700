//! Expiry-aware session cache.
//!
//! One record per owner. Reads never hand out a record at or past its
//! `expires_at`; such records are dropped from the store when encountered.

mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use forge_session_protocol::{PublicKey, SessionRecord};
use tracing::{debug, info};

pub use store::{FileStore, MemoryStore, SessionStore};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Outcome of a cache read that distinguishes expiry from absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
	Active(SessionRecord),
	Expired { expired_at: DateTime<Utc> },
	Missing,
}

impl CacheLookup {
	pub fn active(self) -> Option<SessionRecord> {
		match self {
			CacheLookup::Active(record) => Some(record),
			_ => None,
		}
	}
}

#[derive(Clone)]
pub struct SessionCache {
	store: Arc<dyn SessionStore>,
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionCache").field("clock", &self.clock).finish_non_exhaustive()
	}
}

impl SessionCache {
	pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
		Self { store, clock }
	}

	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Reads the owner's record, removing it if it has expired.
	pub fn lookup(&self, owner: &PublicKey) -> Result<CacheLookup> {
		let Some(record) = self.store.load(owner)? else {
			return Ok(CacheLookup::Missing);
		};
		if record.is_expired_at(self.clock.now()) {
			debug!(target = "forge_session", %owner, expires_at = %record.expires_at, "dropping expired session");
			self.store.remove(owner)?;
			return Ok(CacheLookup::Expired {
				expired_at: record.expires_at,
			});
		}
		Ok(CacheLookup::Active(record))
	}

	/// The owner's record if `now < expires_at`.
	pub fn get(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		Ok(self.lookup(owner)?.active())
	}

	/// Replaces any record held for `record.owner`.
	pub fn set(&self, record: SessionRecord) -> Result<()> {
		self.store.save(&record)?;
		info!(
			target = "forge_session",
			owner = %record.owner,
			session_id = %record.session_id,
			simulated = record.simulated,
			"session cached"
		);
		Ok(())
	}

	/// Removes and returns the owner's record, expired or not.
	pub fn clear(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		let removed = self.store.remove(owner)?;
		if let Some(record) = &removed {
			info!(target = "forge_session", %owner, session_id = %record.session_id, "session cleared");
		}
		Ok(removed)
	}

	/// True when no usable record exists for `owner`.
	pub fn is_expired(&self, owner: &PublicKey) -> Result<bool> {
		Ok(self.get(owner)?.is_none())
	}

	/// All unexpired records.
	pub fn list(&self) -> Result<Vec<SessionRecord>> {
		let now = self.clock.now();
		Ok(self.store.all()?.into_iter().filter(|r| !r.is_expired_at(now)).collect())
	}

	/// Deletes expired records and returns how many were removed.
	pub fn prune(&self) -> Result<usize> {
		let now = self.clock.now();
		let mut removed = 0;
		for record in self.store.all()? {
			if record.is_expired_at(now) && self.store.remove(&record.owner)?.is_some() {
				removed += 1;
			}
		}
		if removed > 0 {
			info!(target = "forge_session", removed, "pruned expired sessions");
		}
		Ok(removed)
	}
}
