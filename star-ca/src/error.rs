use uuid::Uuid;

use crate::signer::SignerError;
use crate::storage::StoreError;

/// A specialized `Result` type for certificate authority operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while issuing certificates, signing OCSP responses or
/// driving short-term automatic renewals.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The request was rejected because of something the caller sent
	#[error("malformed request: {0}")]
	Malformed(String),
	/// A deployment or logic fault inside the authority
	#[error("internal error: {0}")]
	Internal(String),
	/// The signing backend failed
	#[error("failed to sign: {0}")]
	Signing(#[from] SignerError),
	/// The random source failed while generating a serial number
	#[error("failed to generate serial: {0}")]
	Entropy(String),
	/// A certificate was signed but could not be stored
	#[error("failed to store certificate {serial}, orphaning it: {source}")]
	Orphaned {
		/// Hex serial of the orphaned certificate
		serial: String,
		/// The storage failure
		#[source]
		source: StoreError,
	},
	/// A renewal artifact could not be published
	#[error("failed to publish renewal artifacts: {0}")]
	Publication(String),
	/// The requested object is unknown to this authority
	#[error("not found: {0}")]
	NotFound(String),
	/// Another issuance for the same renewal identifier is in flight
	#[error("renewal {0} is already claimed by another issuance")]
	RenewalInFlight(Uuid),
	/// The renewal identifier has no pending renewal marker
	#[error("no pending renewal for {0}")]
	NoPendingRenewal(Uuid),
	/// Construction-time configuration was missing or invalid
	#[error("invalid configuration: {0}")]
	Config(String),
}

/// Coarse classification of an [`Error`], used by transport layers to pick a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Caller-caused; never retried automatically
	Malformed,
	/// Opaque server-side failure
	Internal,
	/// Unknown issuer, artifact or renewal
	NotFound,
	/// Concurrent or out-of-order use of a renewal identifier
	Conflict,
}

impl Error {
	/// Returns the class of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Malformed(_) => ErrorKind::Malformed,
			Error::NotFound(_) => ErrorKind::NotFound,
			Error::RenewalInFlight(_) | Error::NoPendingRenewal(_) => ErrorKind::Conflict,
			Error::Internal(_)
			| Error::Signing(_)
			| Error::Entropy(_)
			| Error::Orphaned { .. }
			| Error::Publication(_)
			| Error::Config(_) => ErrorKind::Internal,
		}
	}

	pub(crate) fn malformed(msg: impl Into<String>) -> Self {
		Error::Malformed(msg.into())
	}

	pub(crate) fn internal(msg: impl Into<String>) -> Self {
		Error::Internal(msg.into())
	}
}
