//! Time sources.

use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

/// Source of the current time.
pub trait Clock: Send + Sync {
	/// Returns the current instant in UTC.
	fn now(&self) -> OffsetDateTime;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FakeClock {
	now: Mutex<OffsetDateTime>,
}

impl FakeClock {
	/// Creates a clock frozen at `now`.
	pub fn new(now: OffsetDateTime) -> Self {
		Self {
			now: Mutex::new(now),
		}
	}

	/// Moves the clock forward by `by`.
	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock();
		*now += by;
	}

	/// Sets the clock to `now`.
	pub fn set(&self, now: OffsetDateTime) {
		*self.now.lock() = now;
	}
}

impl Clock for FakeClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock()
	}
}
