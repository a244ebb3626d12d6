//! The certificate storage collaborator.

use std::fmt;

use parking_lot::Mutex;

/// A failure reported by a [`CertificateStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(String);

impl StoreError {
	/// Creates a new storage error.
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl std::error::Error for StoreError {}

/// Durable storage for issued certificates.
pub trait CertificateStore: Send + Sync {
	/// Records a certificate issued for `registration_id`, optionally along
	/// with an OCSP response produced at issuance time. Returns the digest the
	/// store indexes the certificate by.
	fn add_certificate(
		&self,
		der: &[u8],
		registration_id: i64,
		ocsp: Option<&[u8]>,
	) -> Result<String, StoreError>;
}

/// A record kept by [`MemoryCertificateStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCertificate {
	/// Certificate DER
	pub der: Vec<u8>,
	/// Owning registration
	pub registration_id: i64,
	/// OCSP response stored alongside, if any
	pub ocsp: Option<Vec<u8>>,
}

/// An in-process [`CertificateStore`].
#[derive(Debug, Default)]
pub struct MemoryCertificateStore {
	certificates: Mutex<Vec<StoredCertificate>>,
}

impl MemoryCertificateStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a copy of everything stored so far.
	pub fn certificates(&self) -> Vec<StoredCertificate> {
		self.certificates.lock().clone()
	}
}

impl CertificateStore for MemoryCertificateStore {
	fn add_certificate(
		&self,
		der: &[u8],
		registration_id: i64,
		ocsp: Option<&[u8]>,
	) -> Result<String, StoreError> {
		let digest = hex::encode(ring::digest::digest(&ring::digest::SHA256, der));
		self.certificates.lock().push(StoredCertificate {
			der: der.to_vec(),
			registration_id,
			ocsp: ocsp.map(<[u8]>::to_vec),
		});
		Ok(digest)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_store_keeps_records() {
		let store = MemoryCertificateStore::new();
		let digest = store.add_certificate(b"der", 7, Some(b"ocsp")).unwrap();
		assert_eq!(digest.len(), 64);
		let stored = store.certificates();
		assert_eq!(stored.len(), 1);
		assert_eq!(stored[0].registration_id, 7);
		assert_eq!(stored[0].ocsp.as_deref(), Some(&b"ocsp"[..]));
	}
}
