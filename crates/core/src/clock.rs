//! Time source used for expiry decisions.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + fmt::Debug {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Arc::new(Mutex::new(start)),
		}
	}

	pub fn advance(&self, by: Duration) {
		*self.now.lock() += by;
	}

	pub fn set(&self, to: DateTime<Utc>) {
		*self.now.lock() = to;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}
