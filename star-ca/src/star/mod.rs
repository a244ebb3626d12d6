//! Short-term automatic renewal (STAR).
//!
//! A STAR flow keeps a short-lived certificate for one domain fresh without
//! the client coming back. [`StarCoordinator::begin`] arms the first
//! issuance; every issuance that carries the flow's renewal identifier
//! claims it, is signed with the flow's lifetime instead of the default
//! validity, and on success publishes the certificate under the renewal
//! identifier and a pointer under its serial. The next renewal is then
//! scheduled and, once due, re-armed with [`StarCoordinator::rearm`].

use time::OffsetDateTime;
use uuid::Uuid;

mod coordinator;
mod publish;
mod schedule;

pub use coordinator::{PublicationResponse, RenewalClaim, StarCoordinator};
pub use publish::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use schedule::{InMemoryScheduler, RenewalScheduler, ScheduledRenewal};

/// A renewal armed for its next issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRenewal {
	/// Stable identifier of the flow
	pub renewal_id: Uuid,
	/// Domain the flow certifies
	pub domain: String,
	/// Validity of each certificate, in hours
	pub lifetime_hours: u32,
}

/// A snapshot of one renewal flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalState {
	/// Stable identifier of the flow
	pub renewal_id: Uuid,
	/// Domain the flow certifies
	pub domain: String,
	/// Validity of each certificate, in hours
	pub lifetime_hours: u32,
	/// The next issuance is armed
	pub pending: bool,
	/// An issuance currently holds the claim
	pub in_flight: bool,
	/// When the next renewal falls due
	pub next_renewal_due: Option<OffsetDateTime>,
	/// Hex serial of the currently published certificate
	pub current_serial: Option<String>,
}
