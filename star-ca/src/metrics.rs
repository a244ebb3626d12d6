//! Counters exported by the authority.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::extensions::ExtensionCategory;
use crate::signer::{SignerError, SignerErrorKind};

/// What a signature was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePurpose {
	/// An end-entity certificate
	Certificate,
	/// An OCSP response
	Ocsp,
}

/// Thread-safe counters shared by every issuance and OCSP call.
#[derive(Debug, Default)]
pub struct CaMetrics {
	cert_signatures: AtomicU64,
	ocsp_signatures: AtomicU64,
	csr_basic: AtomicU64,
	csr_tls_feature: AtomicU64,
	csr_tls_feature_invalid: AtomicU64,
	csr_other: AtomicU64,
	hsm_errors: AtomicU64,
	signing_errors: Mutex<BTreeMap<u32, u64>>,
}

/// A point-in-time copy of [`CaMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
	pub cert_signatures: u64,
	pub ocsp_signatures: u64,
	pub csr_basic: u64,
	pub csr_tls_feature: u64,
	pub csr_tls_feature_invalid: u64,
	pub csr_other: u64,
	pub hsm_errors: u64,
	/// Signing engine errors by engine error code
	pub signing_errors: BTreeMap<u32, u64>,
}

impl CaMetrics {
	/// Creates zeroed counters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Counts one produced signature.
	pub fn note_signature(&self, purpose: SignaturePurpose) {
		let counter = match purpose {
			SignaturePurpose::Certificate => &self.cert_signatures,
			SignaturePurpose::Ocsp => &self.ocsp_signatures,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}

	/// Counts one CSR that contained an extension of `category`.
	pub fn note_extension(&self, category: ExtensionCategory) {
		let counter = match category {
			ExtensionCategory::Basic => &self.csr_basic,
			ExtensionCategory::TlsFeature => &self.csr_tls_feature,
			ExtensionCategory::TlsFeatureInvalid => &self.csr_tls_feature_invalid,
			ExtensionCategory::Other => &self.csr_other,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}

	/// Counts a backend failure under its classification.
	pub fn note_sign_error(&self, err: &SignerError) {
		match err.kind {
			SignerErrorKind::Hsm => {
				self.hsm_errors.fetch_add(1, Ordering::Relaxed);
			},
			SignerErrorKind::Engine(code) => {
				*self.signing_errors.lock().entry(code).or_default() += 1;
			},
		}
	}

	/// Copies every counter.
	pub fn snapshot(&self) -> MetricsSnapshot {
		MetricsSnapshot {
			cert_signatures: self.cert_signatures.load(Ordering::Relaxed),
			ocsp_signatures: self.ocsp_signatures.load(Ordering::Relaxed),
			csr_basic: self.csr_basic.load(Ordering::Relaxed),
			csr_tls_feature: self.csr_tls_feature.load(Ordering::Relaxed),
			csr_tls_feature_invalid: self.csr_tls_feature_invalid.load(Ordering::Relaxed),
			csr_other: self.csr_other.load(Ordering::Relaxed),
			hsm_errors: self.hsm_errors.load(Ordering::Relaxed),
			signing_errors: self.signing_errors.lock().clone(),
		}
	}
}
