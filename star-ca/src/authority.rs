//! The issuance engine.

use std::fmt;
use std::sync::Arc;

use pem::Pem;
use pki_types::CertificateDer;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::clock::Clock;
use crate::config::CaConfig;
use crate::csr::{KeyAlgorithm, ParsedCsr};
use crate::extensions::ExtensionPolicy;
use crate::issuer::IssuerRegistry;
use crate::metrics::{CaMetrics, MetricsSnapshot, SignaturePurpose};
use crate::ocsp::{OcspResponder, OcspSigningRequest};
use crate::policy::{verify_csr, KeyPolicy, PolicyAuthority};
use crate::serial::{EntropySource, SerialGenerator, SerialNumber};
use crate::signer::{SignRequest, Subject};
use crate::star::StarCoordinator;
use crate::storage::CertificateStore;
use crate::{Error, Result};

/// One request for an end-entity certificate.
#[derive(Debug, Clone)]
pub struct IssueRequest {
	/// Registration the certificate is issued to
	pub registration_id: i64,
	/// DER-encoded PKCS#10 request
	pub csr: Vec<u8>,
	/// Renewal flow this issuance belongs to, if any
	pub renewal_id: Option<Uuid>,
}

impl IssueRequest {
	/// A plain issuance request.
	pub fn new(registration_id: i64, csr: impl Into<Vec<u8>>) -> Self {
		Self {
			registration_id,
			csr: csr.into(),
			renewal_id: None,
		}
	}

	/// Marks the request as the next issuance of a renewal flow.
	pub fn with_renewal(mut self, renewal_id: Uuid) -> Self {
		self.renewal_id = Some(renewal_id);
		self
	}
}

/// A signed and stored certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
	/// Certificate DER
	pub der: CertificateDer<'static>,
	/// Serial number
	pub serial: SerialNumber,
	/// Common name of the issuer that signed it
	pub issuer: String,
	/// Start of validity
	pub not_before: OffsetDateTime,
	/// End of validity
	pub not_after: OffsetDateTime,
}

impl IssuedCertificate {
	/// The certificate as a `CERTIFICATE` PEM block.
	pub fn to_pem(&self) -> String {
		let p = Pem::new("CERTIFICATE", self.der.to_vec());
		pem::encode_config(&p, crate::ENCODE_CONFIG)
	}
}

/// Progress of one issuance attempt; failures report the last stage reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum IssuanceStage {
	Received,
	Parsed,
	PolicyChecked,
	ExtensionsResolved,
	ProfileSelected,
	Signed,
	Stored,
}

impl fmt::Display for IssuanceStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			IssuanceStage::Received => "received",
			IssuanceStage::Parsed => "parsed",
			IssuanceStage::PolicyChecked => "policy-checked",
			IssuanceStage::ExtensionsResolved => "extensions-resolved",
			IssuanceStage::ProfileSelected => "profile-selected",
			IssuanceStage::Signed => "signed",
			IssuanceStage::Stored => "stored",
		};
		f.write_str(name)
	}
}

/// Logs the certificate as orphaned if dropped before being disarmed.
///
/// Covers callers abandoning the future or thread between signing and
/// storage: the certificate exists either way.
struct OrphanGuard<'a> {
	serial: &'a SerialNumber,
	der: &'a [u8],
	registration_id: i64,
	armed: bool,
}

impl OrphanGuard<'_> {
	fn disarm(mut self) {
		self.armed = false;
	}
}

impl Drop for OrphanGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			log_orphan(
				self.serial,
				self.der,
				self.registration_id,
				&"issuance abandoned before storage",
			);
		}
	}
}

fn log_orphan(serial: &SerialNumber, der: &[u8], registration_id: i64, error: &dyn fmt::Display) {
	tracing::error!(
		target: "audit",
		serial = %serial,
		cert = %hex::encode(der),
		cert_sha256 = %hex::encode(ring::digest::digest(&ring::digest::SHA256, der)),
		regid = registration_id,
		error = %error,
		"orphaning certificate"
	);
}

fn select_profile<'a>(
	algorithm: &KeyAlgorithm,
	rsa_profile: &'a str,
	ecdsa_profile: &'a str,
	registration_id: i64,
	csr_der: &[u8],
) -> Result<&'a str> {
	match algorithm {
		KeyAlgorithm::Rsa { .. } => Ok(rsa_profile),
		KeyAlgorithm::Ecdsa { .. } => Ok(ecdsa_profile),
		KeyAlgorithm::Other(_) => {
			let err = Error::internal("unsupported key type");
			tracing::error!(
				target: "audit",
				regid = registration_id,
				csr_sha256 = %hex::encode(ring::digest::digest(&ring::digest::SHA256, csr_der)),
				error = %err,
				"refusing to sign"
			);
			Err(err)
		},
	}
}

/// Issues certificates and OCSP responses for one authority instance.
pub struct CertificateAuthority {
	registry: Arc<IssuerRegistry>,
	store: Arc<dyn CertificateStore>,
	pa: Arc<dyn PolicyAuthority>,
	clock: Arc<dyn Clock>,
	metrics: Arc<CaMetrics>,
	ocsp: OcspResponder,
	serials: SerialGenerator,
	extensions: ExtensionPolicy,
	star: Option<Arc<StarCoordinator>>,
	validity: Duration,
	max_names: usize,
	key_policy: KeyPolicy,
	force_cn_from_san: bool,
	rsa_profile: String,
	ecdsa_profile: String,
	generate_ocsp_early: bool,
}

impl CertificateAuthority {
	/// Builds an authority; invalid configuration fails here.
	pub fn new(
		config: &CaConfig,
		registry: Arc<IssuerRegistry>,
		store: Arc<dyn CertificateStore>,
		pa: Arc<dyn PolicyAuthority>,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		config.validate()?;
		let metrics = Arc::new(CaMetrics::new());
		Ok(Self {
			ocsp: OcspResponder::new(registry.clone(), metrics.clone()),
			registry,
			store,
			pa,
			clock,
			metrics,
			serials: SerialGenerator::new(config.prefix()?),
			extensions: ExtensionPolicy::new(config.enable_must_staple),
			star: None,
			validity: config.validity()?,
			max_names: config.max_names,
			key_policy: config.key_policy.clone(),
			force_cn_from_san: config.force_cn_from_san(),
			rsa_profile: config.rsa_profile.clone(),
			ecdsa_profile: config.ecdsa_profile.clone(),
			generate_ocsp_early: config.generate_ocsp_early,
		})
	}

	/// Attaches the coordinator that renewal issuances are claimed from.
	pub fn with_star(mut self, star: Arc<StarCoordinator>) -> Self {
		self.star = Some(star);
		self
	}

	/// Replaces the random source used for serial numbers.
	pub fn with_entropy(mut self, entropy: Box<dyn EntropySource>) -> Self {
		self.serials = SerialGenerator::with_entropy(self.serials.prefix(), entropy);
		self
	}

	/// Counters accumulated so far.
	pub fn metrics(&self) -> MetricsSnapshot {
		self.metrics.snapshot()
	}

	/// The issuers this authority signs with.
	pub fn registry(&self) -> &IssuerRegistry {
		&self.registry
	}

	/// The renewal coordinator, if one is attached.
	pub fn star(&self) -> Option<&Arc<StarCoordinator>> {
		self.star.as_ref()
	}

	/// Produces a signed OCSP response for a certificate issued by this authority.
	pub fn generate_ocsp(&self, request: &OcspSigningRequest) -> Result<Vec<u8>> {
		self.ocsp.generate(request)
	}

	/// Issues a certificate for `request`.
	///
	/// No step is retried. A certificate that was signed but could not be
	/// stored is logged as orphaned and reported as [`Error::Orphaned`].
	pub fn issue_certificate(&self, request: &IssueRequest) -> Result<IssuedCertificate> {
		let mut stage = IssuanceStage::Received;
		let result = self.issue_inner(request, &mut stage);
		if let Err(err) = &result {
			tracing::warn!(
				regid = request.registration_id,
				stage = %stage,
				error = %err,
				"issuance failed"
			);
		}
		result
	}

	fn issue_inner(
		&self,
		request: &IssueRequest,
		stage: &mut IssuanceStage,
	) -> Result<IssuedCertificate> {
		let csr = ParsedCsr::from_der(&request.csr)?;
		*stage = IssuanceStage::Parsed;

		let names = verify_csr(
			&csr,
			self.max_names,
			&self.key_policy,
			self.pa.as_ref(),
			self.force_cn_from_san,
			request.registration_id,
		)?;
		*stage = IssuanceStage::PolicyChecked;

		let decision = self
			.extensions
			.evaluate(&csr.requested_extensions, &self.metrics)?;
		*stage = IssuanceStage::ExtensionsResolved;

		let profile = select_profile(
			&csr.public_key.algorithm,
			&self.rsa_profile,
			&self.ecdsa_profile,
			request.registration_id,
			csr.der(),
		)?;
		*stage = IssuanceStage::ProfileSelected;

		let claim = match request.renewal_id {
			Some(renewal_id) => {
				let star = self.star.as_ref().ok_or_else(|| {
					Error::internal("renewal requested but no renewal coordinator is attached")
				})?;
				Some(star.claim(renewal_id)?)
			},
			None => None,
		};
		let validity = claim.as_ref().map_or(self.validity, |claim| claim.validity());

		let now = self.clock.now();
		let (not_after, serial) = self.serials.generate(validity, now)?;

		let issuer = self.registry.default_issuer();
		if issuer.not_after() < not_after {
			let err = Error::internal(format!(
				"cannot issue a certificate that expires after the issuer certificate ({} < {not_after})",
				issuer.not_after()
			));
			tracing::error!(target: "audit", serial = %serial, error = %err, "refusing to sign");
			return Err(err);
		}

		let sign_request = SignRequest {
			request_pem: csr.to_pem(),
			profile: profile.to_owned(),
			hosts: names.names.clone(),
			subject: Subject {
				common_name: names.common_name.clone(),
				serial_number: (!self.force_cn_from_san).then(|| serial.to_string()),
			},
			serial: serial.clone(),
			not_after,
			extensions: decision.extensions,
		};

		tracing::info!(
			target: "audit",
			serial = %serial,
			names = %names.names.join(", "),
			csr = %hex::encode(csr.der()),
			csr_sha256 = %csr.sha256_hex(),
			"signing"
		);
		let cert_pem = issuer.signer().sign(&sign_request).map_err(|err| {
			self.metrics.note_sign_error(&err);
			tracing::error!(target: "audit", serial = %serial, error = %err, "signing failed");
			Error::Signing(err)
		})?;
		self.metrics.note_signature(SignaturePurpose::Certificate);

		let der = decode_certificate(&cert_pem).map_err(|err| {
			tracing::error!(target: "audit", serial = %serial, error = %err, "invalid signer output");
			err
		})?;
		*stage = IssuanceStage::Signed;

		let guard = OrphanGuard {
			serial: &serial,
			der: &der,
			registration_id: request.registration_id,
			armed: true,
		};
		tracing::info!(
			target: "audit",
			serial = %serial,
			cert = %hex::encode(&der),
			cert_sha256 = %hex::encode(ring::digest::digest(&ring::digest::SHA256, &der)),
			"signing success"
		);

		let (not_before, cert_not_after) = {
			let (_, cert) = X509Certificate::from_der(&der)
				.map_err(|e| Error::internal(format!("signer produced an invalid certificate: {e}")))?;
			let validity = cert.validity();
			(validity.not_before.to_datetime(), validity.not_after.to_datetime())
		};

		let ocsp = if self.generate_ocsp_early {
			match self.generate_ocsp(&OcspSigningRequest::good(der.clone())) {
				Ok(response) => Some(response),
				Err(err) => {
					tracing::info!(target: "audit", serial = %serial, error = %err, "failed to generate OCSP response early");
					None
				},
			}
		} else {
			None
		};

		if let Err(err) = self
			.store
			.add_certificate(&der, request.registration_id, ocsp.as_deref())
		{
			guard.disarm();
			log_orphan(&serial, &der, request.registration_id, &err);
			return Err(Error::Orphaned {
				serial: serial.to_string(),
				source: err,
			});
		}
		guard.disarm();
		*stage = IssuanceStage::Stored;

		let issued = IssuedCertificate {
			der: CertificateDer::from(der),
			serial,
			issuer: issuer.common_name().to_string(),
			not_before,
			not_after: cert_not_after,
		};
		if let Some(claim) = claim {
			claim.complete(&issued)?;
		}
		Ok(issued)
	}
}

impl fmt::Debug for CertificateAuthority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CertificateAuthority")
			.field("registry", &self.registry)
			.field("serials", &self.serials)
			.field("validity", &self.validity)
			.finish_non_exhaustive()
	}
}

fn decode_certificate(cert_pem: &str) -> Result<Vec<u8>> {
	if cert_pem.is_empty() {
		return Err(Error::internal("no certificate returned by server"));
	}
	let block = pem::parse(cert_pem)
		.map_err(|e| Error::internal(format!("invalid certificate value returned: {e}")))?;
	if block.tag() != "CERTIFICATE" {
		return Err(Error::internal(format!(
			"invalid certificate value returned: unexpected {} block",
			block.tag()
		)));
	}
	Ok(block.into_contents())
}
