//! OCSP response generation.

use std::sync::Arc;

use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::issuer::IssuerRegistry;
use crate::metrics::{CaMetrics, SignaturePurpose};
use crate::signer::{CertStatus, OcspSignRequest, RevocationReason};
use crate::{Error, Result};

/// A request to attest the status of one certificate.
#[derive(Debug, Clone)]
pub struct OcspSigningRequest {
	/// DER of the certificate in question
	pub cert_der: Vec<u8>,
	/// Status to attest
	pub status: CertStatus,
	/// Revocation reason, for revoked certificates
	pub reason: Option<RevocationReason>,
	/// Revocation time, for revoked certificates
	pub revoked_at: Option<OffsetDateTime>,
}

impl OcspSigningRequest {
	/// A `good` status request for `cert_der`.
	pub fn good(cert_der: impl Into<Vec<u8>>) -> Self {
		Self {
			cert_der: cert_der.into(),
			status: CertStatus::Good,
			reason: None,
			revoked_at: None,
		}
	}

	/// A `revoked` status request for `cert_der`.
	pub fn revoked(
		cert_der: impl Into<Vec<u8>>,
		reason: Option<RevocationReason>,
		revoked_at: OffsetDateTime,
	) -> Self {
		Self {
			cert_der: cert_der.into(),
			status: CertStatus::Revoked,
			reason,
			revoked_at: Some(revoked_at),
		}
	}
}

/// Signs OCSP responses, but only for certificates chaining to a registered issuer.
#[derive(Debug)]
pub struct OcspResponder {
	registry: Arc<IssuerRegistry>,
	metrics: Arc<CaMetrics>,
}

impl OcspResponder {
	/// Creates a responder over `registry`.
	pub fn new(registry: Arc<IssuerRegistry>, metrics: Arc<CaMetrics>) -> Self {
		Self { registry, metrics }
	}

	/// Produces a signed `OCSPResponse` for `request`.
	pub fn generate(&self, request: &OcspSigningRequest) -> Result<Vec<u8>> {
		let (_, cert) = X509Certificate::from_der(&request.cert_der)
			.map_err(|e| Error::malformed(format!("invalid certificate: {e}")))?;

		let issuer_cn = cert
			.issuer()
			.iter_common_name()
			.next()
			.and_then(|cn| cn.as_str().ok())
			.unwrap_or_default();
		let issuer = self.registry.resolve_by_identity(issuer_cn).ok_or_else(|| {
			Error::NotFound(format!(
				"this CA doesn't have an issuer cert with CommonName {issuer_cn:?}"
			))
		})?;

		let (_, issuer_cert) = X509Certificate::from_der(issuer.certificate().as_ref())
			.map_err(|e| Error::internal(format!("registered issuer certificate: {e}")))?;
		cert.verify_signature(Some(issuer_cert.public_key()))
			.map_err(|e| {
				Error::malformed(format!(
					"certificate is not signed by issuer {issuer_cn:?}: {e}"
				))
			})?;

		let sign_request = OcspSignRequest {
			certificate: request.cert_der.clone(),
			serial: cert.raw_serial().to_vec(),
			status: request.status,
			reason: request.reason,
			revoked_at: request.revoked_at,
		};
		let response = issuer.ocsp_signer().sign(&sign_request).map_err(|err| {
			self.metrics.note_sign_error(&err);
			tracing::error!(
				target: "audit",
				serial = %hex::encode(cert.raw_serial()),
				error = %err,
				"failed to sign OCSP response"
			);
			Error::Signing(err)
		})?;
		self.metrics.note_signature(SignaturePurpose::Ocsp);
		Ok(response)
	}
}
