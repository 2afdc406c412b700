//! Backing stores for [`SessionCache`](super::SessionCache).

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use forge_session_protocol::{PublicKey, SessionRecord};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Durable home for session records, at most one per owner.
pub trait SessionStore: Send + Sync {
	fn load(&self, owner: &PublicKey) -> Result<Option<SessionRecord>>;

	/// Replaces whatever was stored for `record.owner`.
	fn save(&self, record: &SessionRecord) -> Result<()>;

	/// Removes and returns the owner's record.
	fn remove(&self, owner: &PublicKey) -> Result<Option<SessionRecord>>;

	fn all(&self) -> Result<Vec<SessionRecord>>;
}

/// Process-local store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
	records: Mutex<BTreeMap<PublicKey, SessionRecord>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl SessionStore for MemoryStore {
	fn load(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		Ok(self.records.lock().get(owner).cloned())
	}

	fn save(&self, record: &SessionRecord) -> Result<()> {
		self.records.lock().insert(record.owner, record.clone());
		Ok(())
	}

	fn remove(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		Ok(self.records.lock().remove(owner))
	}

	fn all(&self) -> Result<Vec<SessionRecord>> {
		Ok(self.records.lock().values().cloned().collect())
	}
}

const STORE_SCHEMA: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
	schema: u32,
	#[serde(default)]
	sessions: BTreeMap<PublicKey, SessionRecord>,
}

#[derive(Deserialize)]
struct StoreHeader {
	schema: u32,
}

impl Default for StoreFile {
	fn default() -> Self {
		Self {
			schema: STORE_SCHEMA,
			sessions: BTreeMap::new(),
		}
	}
}

/// JSON file keyed by base58 owner key.
///
/// The file is re-read on every operation so separate processes sharing it see
/// each other's writes. A missing file counts as empty, as does one that no
/// longer parses: losing it only forces a new handshake. A file written under
/// another schema is never overwritten.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read(&self) -> Result<StoreFile> {
		let content = match fs::read(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreFile::default()),
			Err(e) => return Err(e.into()),
		};
		let schema = match serde_json::from_slice::<StoreHeader>(&content) {
			Ok(header) => header.schema,
			Err(e) => return Ok(self.corrupt(&e)),
		};
		if schema != STORE_SCHEMA {
			return Err(Error::Io(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("session store {} has schema {schema}, expected {STORE_SCHEMA}", self.path.display()),
			)));
		}
		match serde_json::from_slice::<StoreFile>(&content) {
			Ok(file) => Ok(file),
			Err(e) => Ok(self.corrupt(&e)),
		}
	}

	fn corrupt(&self, err: &serde_json::Error) -> StoreFile {
		warn!(target = "forge_session", path = %self.path.display(), error = %err, "corrupt session store, ignoring");
		StoreFile::default()
	}

	/// Writes a sibling temp file, then renames it over the store.
	fn write(&self, file: &StoreFile) -> Result<()> {
		let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			Some(parent) => {
				fs::create_dir_all(parent)?;
				parent
			}
			None => Path::new("."),
		};
		let mut tmp = NamedTempFile::new_in(parent)?;
		serde_json::to_writer_pretty(&mut tmp, file)?;
		tmp.flush()?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			tmp.as_file().set_permissions(fs::Permissions::from_mode(0o600))?;
		}
		tmp.as_file().sync_all()?;
		tmp.persist(&self.path).map_err(|e| e.error)?;
		debug!(target = "forge_session", path = %self.path.display(), sessions = file.sessions.len(), "session store written");
		Ok(())
	}
}

impl SessionStore for FileStore {
	fn load(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		let _guard = self.lock.lock();
		Ok(self.read()?.sessions.remove(owner))
	}

	fn save(&self, record: &SessionRecord) -> Result<()> {
		let _guard = self.lock.lock();
		let mut file = self.read()?;
		file.sessions.insert(record.owner, record.clone());
		self.write(&file)
	}

	fn remove(&self, owner: &PublicKey) -> Result<Option<SessionRecord>> {
		let _guard = self.lock.lock();
		let mut file = self.read()?;
		let removed = file.sessions.remove(owner);
		if removed.is_some() {
			self.write(&file)?;
		}
		Ok(removed)
	}

	fn all(&self) -> Result<Vec<SessionRecord>> {
		let _guard = self.lock.lock();
		Ok(self.read()?.sessions.into_values().collect())
	}
}
