//! Filtering of the extensions a CSR asks for.
//!
//! A request may carry any number of extensions in its extension request
//! attribute. Only one of them can ever reach the issued certificate: the
//! TLS feature extension asking for OCSP must-staple, and only when the
//! deployment enables it. Standard extensions the authority computes itself
//! are counted and dropped, anything else is counted and ignored.

use std::collections::HashSet;

use crate::csr::RequestedExtension;
use crate::metrics::CaMetrics;
use crate::oid;
use crate::signer::Extension;
use crate::{Error, Result};

/// DER of a TLS feature list containing only `status_request` (5).
pub const MUST_STAPLE_FEATURE_VALUE: &[u8] = &[0x30, 0x03, 0x02, 0x01, 0x05];

const BASIC_EXTENSIONS: &[&[u64]] = &[
	oid::AUTHORITY_INFO_ACCESS,
	oid::AUTHORITY_KEY_IDENTIFIER,
	oid::BASIC_CONSTRAINTS,
	oid::CERTIFICATE_POLICIES,
	oid::CRL_DISTRIBUTION_POINTS,
	oid::EXT_KEY_USAGE,
	oid::KEY_USAGE,
	oid::SUBJECT_ALT_NAME,
	oid::SUBJECT_KEY_IDENTIFIER,
];

/// How a requested extension was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionCategory {
	/// A standard extension the authority computes itself
	Basic,
	/// A well-formed must-staple request
	TlsFeature,
	/// A TLS feature request with any other value
	TlsFeatureInvalid,
	/// Anything else, ignored
	Other,
}

/// The must-staple extension as embedded in issued certificates.
pub fn must_staple_extension() -> Extension {
	Extension {
		oid: oid::TLS_FEATURE.to_vec(),
		critical: false,
		value: MUST_STAPLE_FEATURE_VALUE.to_vec(),
	}
}

/// The outcome of evaluating a request's extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionDecision {
	/// Extensions to embed in the certificate
	pub extensions: Vec<Extension>,
	/// Categories seen in this request, each listed once
	pub categories: Vec<ExtensionCategory>,
}

/// Decides which requested extensions make it into a certificate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionPolicy {
	enable_must_staple: bool,
}

impl ExtensionPolicy {
	/// Creates a policy; must-staple requests are only honoured when enabled.
	pub fn new(enable_must_staple: bool) -> Self {
		Self { enable_must_staple }
	}

	/// Classifies `requested` and returns the extensions to embed.
	///
	/// Duplicate OIDs are skipped, so only the first occurrence counts. Each
	/// category is counted at most once per request. An invalid TLS feature
	/// value fails the whole request.
	pub fn evaluate(
		&self,
		requested: &[RequestedExtension],
		metrics: &CaMetrics,
	) -> Result<ExtensionDecision> {
		let mut seen = HashSet::new();
		let mut decision = ExtensionDecision::default();
		let note = |decision: &mut ExtensionDecision, category: ExtensionCategory| {
			if !decision.categories.contains(&category) {
				decision.categories.push(category);
				metrics.note_extension(category);
			}
		};

		for ext in requested {
			if !seen.insert(ext.oid_der.as_slice()) {
				continue;
			}

			let arcs = ext.oid.as_deref();
			if arcs == Some(oid::TLS_FEATURE) {
				note(&mut decision, ExtensionCategory::TlsFeature);
				if ext.value != MUST_STAPLE_FEATURE_VALUE {
					note(&mut decision, ExtensionCategory::TlsFeatureInvalid);
					return Err(Error::malformed(
						"unsupported value for extension with OID 1.3.6.1.5.5.7.1.24",
					));
				}
				if self.enable_must_staple {
					decision.extensions.push(must_staple_extension());
				}
			} else if BASIC_EXTENSIONS.iter().any(|basic| arcs == Some(*basic)) {
				note(&mut decision, ExtensionCategory::Basic);
			} else {
				note(&mut decision, ExtensionCategory::Other);
			}
		}

		Ok(decision)
	}
}
