use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use super::{ArtifactStore, PendingRenewal, RenewalScheduler, RenewalState};
use crate::authority::IssuedCertificate;
use crate::clock::Clock;
use crate::{Error, Result};

const CANCELED_BODY: &str = "Order status: canceled";

#[derive(Debug, Clone)]
struct Flow {
	domain: String,
	lifetime_hours: u32,
	pending: bool,
	in_flight: bool,
	next_renewal_due: Option<OffsetDateTime>,
	current_serial: Option<String>,
}

impl Flow {
	fn pending_renewal(&self, renewal_id: Uuid) -> PendingRenewal {
		PendingRenewal {
			renewal_id,
			domain: self.domain.clone(),
			lifetime_hours: self.lifetime_hours,
		}
	}
}

/// What a publication endpoint answers for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationResponse {
	/// HTTP status code
	pub status: u16,
	/// Response headers, in order
	pub headers: Vec<(String, String)>,
	/// Response body
	pub body: String,
}

impl PublicationResponse {
	fn canceled() -> Self {
		Self {
			status: 404,
			headers: vec![("Content-Type".into(), "text/plain".into())],
			body: CANCELED_BODY.into(),
		}
	}

	fn not_found() -> Self {
		Self {
			status: 404,
			headers: vec![("Content-Type".into(), "text/plain".into())],
			body: "not found".into(),
		}
	}

	/// Looks a header up by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}

/// Drives short-term automatic renewal flows.
///
/// All mutable renewal state lives behind a single lock, which is never held
/// while signing, storing or publishing.
pub struct StarCoordinator {
	flows: Mutex<HashMap<Uuid, Flow>>,
	artifacts: Arc<dyn ArtifactStore>,
	scheduler: Arc<dyn RenewalScheduler>,
	clock: Arc<dyn Clock>,
	base_uri: String,
}

impl StarCoordinator {
	/// Creates a coordinator publishing to `artifacts`; renewal pointers are
	/// `{base_uri}/{renewal-id}`.
	pub fn new(
		artifacts: Arc<dyn ArtifactStore>,
		scheduler: Arc<dyn RenewalScheduler>,
		clock: Arc<dyn Clock>,
		base_uri: impl Into<String>,
	) -> Self {
		Self {
			flows: Mutex::new(HashMap::new()),
			artifacts,
			scheduler,
			clock,
			base_uri: base_uri.into().trim_end_matches('/').to_string(),
		}
	}

	/// Starts a flow for `domain` and arms its first issuance.
	pub fn begin(&self, domain: &str, lifetime_hours: u32) -> Result<PendingRenewal> {
		if domain.is_empty() {
			return Err(Error::malformed("renewal domain must not be empty"));
		}
		if lifetime_hours == 0 {
			return Err(Error::malformed("renewal lifetime must be at least one hour"));
		}
		let renewal_id = Uuid::new_v4();
		let flow = Flow {
			domain: domain.to_string(),
			lifetime_hours,
			pending: true,
			in_flight: false,
			next_renewal_due: None,
			current_serial: None,
		};
		let pending = flow.pending_renewal(renewal_id);
		self.flows.lock().insert(renewal_id, flow);
		tracing::info!(renewal_id = %renewal_id, domain, lifetime_hours, "renewal flow started");
		Ok(pending)
	}

	/// Claims the pending renewal for one issuance.
	///
	/// Fails with [`Error::RenewalInFlight`] while another claim is alive and
	/// with [`Error::NoPendingRenewal`] when nothing is armed.
	pub fn claim(&self, renewal_id: Uuid) -> Result<RenewalClaim<'_>> {
		let mut flows = self.flows.lock();
		let flow = flows
			.get_mut(&renewal_id)
			.ok_or_else(|| Error::NotFound(format!("unknown renewal {renewal_id}")))?;
		if flow.in_flight {
			return Err(Error::RenewalInFlight(renewal_id));
		}
		if !flow.pending {
			return Err(Error::NoPendingRenewal(renewal_id));
		}
		flow.in_flight = true;
		Ok(RenewalClaim {
			coordinator: self,
			renewal: flow.pending_renewal(renewal_id),
			released: false,
		})
	}

	/// Arms the next issuance of a flow whose renewal fell due.
	pub fn rearm(&self, renewal_id: Uuid) -> Result<PendingRenewal> {
		let mut flows = self.flows.lock();
		let flow = flows
			.get_mut(&renewal_id)
			.ok_or_else(|| Error::NotFound(format!("unknown renewal {renewal_id}")))?;
		flow.pending = true;
		Ok(flow.pending_renewal(renewal_id))
	}

	/// Flows whose next renewal is due at or before `now` and not yet armed.
	pub fn due_renewals(&self, now: OffsetDateTime) -> Vec<PendingRenewal> {
		self.flows
			.lock()
			.iter()
			.filter(|(_, flow)| {
				!flow.pending
					&& !flow.in_flight
					&& flow.next_renewal_due.map_or(false, |due| due <= now)
			})
			.map(|(id, flow)| flow.pending_renewal(*id))
			.collect()
	}

	/// Cancels a flow; its endpoint serves the canceled status from now on.
	pub fn withdraw(&self, renewal_id: Uuid) -> Result<()> {
		{
			let mut flows = self.flows.lock();
			let in_flight = flows
				.get(&renewal_id)
				.map(|flow| flow.in_flight)
				.ok_or_else(|| Error::NotFound(format!("unknown renewal {renewal_id}")))?;
			if in_flight {
				return Err(Error::RenewalInFlight(renewal_id));
			}
			flows.remove(&renewal_id);
		}
		self.scheduler.cancel(renewal_id);
		self.artifacts
			.withdraw(renewal_id)
			.map_err(|e| Error::Publication(format!("withdrawing {renewal_id}: {e}")))?;
		tracing::info!(renewal_id = %renewal_id, "renewal flow withdrawn");
		Ok(())
	}

	/// A snapshot of a flow's state.
	pub fn state(&self, renewal_id: Uuid) -> Option<RenewalState> {
		self.flows.lock().get(&renewal_id).map(|flow| RenewalState {
			renewal_id,
			domain: flow.domain.clone(),
			lifetime_hours: flow.lifetime_hours,
			pending: flow.pending,
			in_flight: flow.in_flight,
			next_renewal_due: flow.next_renewal_due,
			current_serial: flow.current_serial.clone(),
		})
	}

	/// The renewal pointer published for a flow.
	pub fn renewal_uri(&self, renewal_id: Uuid) -> String {
		format!("{}/{}", self.base_uri, renewal_id)
	}

	/// Answers `GET /{path}`.
	///
	/// A renewal identifier serves the current certificate, with validity
	/// headers read from it at call time, or the canceled status. A hex
	/// serial serves the renewal pointer published for that certificate.
	pub fn serve(&self, path: &str) -> Result<PublicationResponse> {
		let path = path.trim_start_matches('/');
		let publication = |e: std::io::Error| Error::Publication(format!("serving {path}: {e}"));

		if let Ok(renewal_id) = Uuid::parse_str(path) {
			let Some(pem) = self.artifacts.certificate(renewal_id).map_err(publication)? else {
				return Ok(PublicationResponse::canceled());
			};
			let (not_before, not_after) = certificate_dates(&pem)?;
			return Ok(PublicationResponse {
				status: 200,
				headers: vec![
					(
						"Content-Type".into(),
						"application/pem-certificate-chain".into(),
					),
					("Not-Before".into(), not_before),
					("Not-After".into(), not_after),
				],
				body: pem,
			});
		}

		if !path.is_empty() && path.bytes().all(|b| b.is_ascii_hexdigit()) {
			if let Some(uri) = self.artifacts.pointer(path).map_err(publication)? {
				return Ok(PublicationResponse {
					status: 200,
					headers: vec![("Content-Type".into(), "text/plain".into())],
					body: uri,
				});
			}
		}
		Ok(PublicationResponse::not_found())
	}

	fn publish(&self, renewal: &PendingRenewal, issued: &IssuedCertificate) -> Result<()> {
		let id = renewal.renewal_id;
		let publication = |step: &str, e: String| {
			tracing::error!(
				target: "audit",
				renewal_id = %id,
				serial = %issued.serial,
				step,
				error = %e,
				"failed to publish renewal"
			);
			Error::Publication(format!("{step} for {id}: {e}"))
		};

		self.artifacts
			.publish_certificate(id, &issued.to_pem())
			.map_err(|e| publication("publishing certificate", e.to_string()))?;

		let due = self.clock.now() + Duration::hours(i64::from(renewal.lifetime_hours));
		self.scheduler
			.schedule(renewal, due)
			.map_err(|e| publication("scheduling renewal", e))?;

		let serial_hex = issued.serial.to_string();
		self.artifacts
			.publish_pointer(&serial_hex, id, &self.renewal_uri(id))
			.map_err(|e| publication("publishing renewal pointer", e.to_string()))?;

		// Markers are only cleared once every artifact is in place.
		let mut flows = self.flows.lock();
		if let Some(flow) = flows.get_mut(&id) {
			flow.pending = false;
			flow.in_flight = false;
			flow.next_renewal_due = Some(due);
			flow.current_serial = Some(serial_hex.clone());
		}
		drop(flows);

		tracing::info!(
			target: "audit",
			renewal_id = %id,
			serial = %serial_hex,
			next_renewal = %due,
			"renewal published"
		);
		Ok(())
	}

	fn release(&self, renewal_id: Uuid) {
		if let Some(flow) = self.flows.lock().get_mut(&renewal_id) {
			flow.in_flight = false;
		}
	}
}

impl fmt::Debug for StarCoordinator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StarCoordinator")
			.field("base_uri", &self.base_uri)
			.field("flows", &self.flows.lock().len())
			.finish_non_exhaustive()
	}
}

fn certificate_dates(pem_str: &str) -> Result<(String, String)> {
	let pem = pem::parse(pem_str)
		.map_err(|e| Error::Publication(format!("published certificate: {e}")))?;
	let (_, cert) = X509Certificate::from_der(pem.contents())
		.map_err(|e| Error::Publication(format!("published certificate: {e}")))?;
	// Rendered like `openssl x509 -dates`, e.g. "May  2 10:00:00 2025 GMT".
	let format = |dt: OffsetDateTime| {
		dt.format(format_description!(
			"[month repr:short] [day padding:space] [hour]:[minute]:[second] [year] GMT"
		))
		.map_err(|e| Error::internal(format!("formatting certificate date: {e}")))
	};
	let validity = cert.validity();
	Ok((
		format(validity.not_before.to_datetime())?,
		format(validity.not_after.to_datetime())?,
	))
}

/// Exclusive right to run one issuance for a renewal flow.
///
/// Dropping the claim without completing it releases the flow and keeps the
/// pending marker, so the issuance can be retried.
#[must_use]
pub struct RenewalClaim<'a> {
	coordinator: &'a StarCoordinator,
	renewal: PendingRenewal,
	released: bool,
}

impl RenewalClaim<'_> {
	/// The claimed renewal.
	pub fn renewal(&self) -> &PendingRenewal {
		&self.renewal
	}

	/// The validity the claimed issuance must use instead of the default.
	pub fn validity(&self) -> Duration {
		Duration::hours(i64::from(self.renewal.lifetime_hours))
	}

	/// Publishes `issued`, schedules the next renewal, publishes the renewal
	/// pointer and finally clears the pending marker.
	pub fn complete(mut self, issued: &IssuedCertificate) -> Result<()> {
		self.coordinator.publish(&self.renewal, issued)?;
		self.released = true;
		Ok(())
	}
}

impl Drop for RenewalClaim<'_> {
	fn drop(&mut self) {
		if !self.released {
			self.coordinator.release(self.renewal.renewal_id);
		}
	}
}

impl fmt::Debug for RenewalClaim<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RenewalClaim")
			.field("renewal", &self.renewal)
			.finish_non_exhaustive()
	}
}
