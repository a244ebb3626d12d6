//! The opaque signing capabilities an issuer is built from.
//!
//! The authority never touches private key material. It hands a fully
//! resolved [`SignRequest`] or [`OcspSignRequest`] to whichever backend the
//! issuer was registered with, be that a hardware module or the
//! [`local`](crate::local) software signer.

use std::fmt;

use time::OffsetDateTime;

use crate::serial::SerialNumber;

/// A certificate extension as it will appear in the issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
	/// Object identifier arcs
	pub oid: Vec<u64>,
	/// Whether relying parties must understand the extension
	pub critical: bool,
	/// DER-encoded `extnValue` contents
	pub value: Vec<u8>,
}

/// The subject of an end-entity certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
	/// Subject common name
	pub common_name: String,
	/// Subject serialNumber attribute: the certificate serial in hex, unless
	/// the CN is forced from the SANs
	pub serial_number: Option<String>,
}

/// Everything a backend needs to produce one end-entity certificate.
#[derive(Debug, Clone)]
pub struct SignRequest {
	/// The CSR in PEM form (`CERTIFICATE REQUEST`)
	pub request_pem: String,
	/// Name of the signing profile
	pub profile: String,
	/// DNS names for the subject alternative name extension
	pub hosts: Vec<String>,
	/// Certificate subject
	pub subject: Subject,
	/// Serial number to embed
	pub serial: SerialNumber,
	/// Expiry of the certificate, computed per call
	pub not_after: OffsetDateTime,
	/// Extra extensions chosen by the extension policy
	pub extensions: Vec<Extension>,
}

/// Produces signed end-entity certificates.
///
/// Implementations may block (for example on a hardware module) and must be
/// safe to call from many threads at once.
pub trait CertificateSigner: Send + Sync {
	/// Signs `request`, returning the certificate as PEM.
	fn sign(&self, request: &SignRequest) -> Result<String, SignerError>;
}

/// Revocation status attested by an OCSP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
	/// The certificate is not revoked
	Good,
	/// The certificate is revoked
	Revoked,
}

/// Identifies the reason a certificate was revoked.
///
/// See [RFC 5280 §5.3.1][1]
///
/// [1]: <https://www.rfc-editor.org/rfc/rfc5280#section-5.3.1>
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum RevocationReason {
	Unspecified = 0,
	KeyCompromise = 1,
	CaCompromise = 2,
	AffiliationChanged = 3,
	Superseded = 4,
	CessationOfOperation = 5,
	CertificateHold = 6,
	// 7 is not defined.
	RemoveFromCrl = 8,
	PrivilegeWithdrawn = 9,
	AaCompromise = 10,
}

impl RevocationReason {
	/// Maps a CRLReason code to a reason, if the code is defined.
	pub fn from_code(code: u8) -> Option<Self> {
		use RevocationReason::*;
		Some(match code {
			0 => Unspecified,
			1 => KeyCompromise,
			2 => CaCompromise,
			3 => AffiliationChanged,
			4 => Superseded,
			5 => CessationOfOperation,
			6 => CertificateHold,
			8 => RemoveFromCrl,
			9 => PrivilegeWithdrawn,
			10 => AaCompromise,
			_ => return None,
		})
	}

	/// The CRLReason code.
	pub fn code(self) -> u8 {
		self as u8
	}
}

/// Everything a backend needs to produce one OCSP response.
#[derive(Debug, Clone)]
pub struct OcspSignRequest {
	/// DER of the certificate the response is about
	pub certificate: Vec<u8>,
	/// Big-endian serial of that certificate
	pub serial: Vec<u8>,
	/// Status to attest
	pub status: CertStatus,
	/// Reason, for revoked certificates
	pub reason: Option<RevocationReason>,
	/// Revocation time, for revoked certificates
	pub revoked_at: Option<OffsetDateTime>,
}

/// Produces signed OCSP responses.
pub trait OcspSigner: Send + Sync {
	/// Signs `request`, returning a DER-encoded `OCSPResponse`.
	fn sign(&self, request: &OcspSignRequest) -> Result<Vec<u8>, SignerError>;
}

/// Where a backend failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerErrorKind {
	/// The hardware security module failed
	Hsm,
	/// The signing engine failed with the given error code
	Engine(u32),
}

/// A failure reported by a signing backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerError {
	/// Classification used for metrics
	pub kind: SignerErrorKind,
	/// Human-readable detail
	pub message: String,
}

impl SignerError {
	/// Creates a new backend error.
	pub fn new(kind: SignerErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}
}

impl fmt::Display for SignerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			SignerErrorKind::Hsm => write!(f, "HSM error: {}", self.message),
			SignerErrorKind::Engine(code) => write!(f, "signing error {code}: {}", self.message),
		}
	}
}

impl std::error::Error for SignerError {}
