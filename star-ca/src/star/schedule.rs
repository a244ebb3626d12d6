use std::collections::BTreeMap;

use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::PendingRenewal;

/// The external driver that triggers renewals once they fall due.
pub trait RenewalScheduler: Send + Sync {
	/// Records that `renewal` must be issued again at `due`.
	fn schedule(&self, renewal: &PendingRenewal, due: OffsetDateTime) -> Result<(), String>;

	/// Forgets every scheduled renewal of a flow.
	fn cancel(&self, renewal_id: Uuid);
}

/// A renewal recorded by [`InMemoryScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRenewal {
	/// The renewal to issue
	pub renewal: PendingRenewal,
	/// When it falls due
	pub due: OffsetDateTime,
}

/// A [`RenewalScheduler`] that only records, for polling drivers and tests.
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
	entries: Mutex<BTreeMap<Uuid, ScheduledRenewal>>,
}

impl InMemoryScheduler {
	/// Creates an empty schedule.
	pub fn new() -> Self {
		Self::default()
	}

	/// The next scheduled renewal of a flow.
	pub fn scheduled(&self, renewal_id: Uuid) -> Option<ScheduledRenewal> {
		self.entries.lock().get(&renewal_id).cloned()
	}

	/// Every renewal due at or before `now`.
	pub fn due(&self, now: OffsetDateTime) -> Vec<ScheduledRenewal> {
		self.entries
			.lock()
			.values()
			.filter(|entry| entry.due <= now)
			.cloned()
			.collect()
	}
}

impl RenewalScheduler for InMemoryScheduler {
	fn schedule(&self, renewal: &PendingRenewal, due: OffsetDateTime) -> Result<(), String> {
		self.entries.lock().insert(
			renewal.renewal_id,
			ScheduledRenewal {
				renewal: renewal.clone(),
				due,
			},
		);
		Ok(())
	}

	fn cancel(&self, renewal_id: Uuid) {
		self.entries.lock().remove(&renewal_id);
	}
}
