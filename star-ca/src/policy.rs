//! Structural and policy checks applied to a request before anything is signed.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::csr::{KeyAlgorithm, ParsedCsr};
use crate::oid;
use crate::{Error, Result};

/// Longest common name accepted, per the X.520 upper bound.
pub const MAX_CN_LENGTH: usize = 64;

/// Which subject keys are acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyPolicy {
	/// Accept RSA keys
	pub allow_rsa: bool,
	/// Accept ECDSA keys on P-256 and P-384
	pub allow_ecdsa: bool,
	/// Smallest accepted RSA modulus
	pub min_rsa_bits: usize,
	/// Largest accepted RSA modulus
	pub max_rsa_bits: usize,
}

impl Default for KeyPolicy {
	fn default() -> Self {
		Self {
			allow_rsa: true,
			allow_ecdsa: true,
			min_rsa_bits: 2048,
			max_rsa_bits: 4096,
		}
	}
}

impl KeyPolicy {
	/// Checks the subject key of `csr`.
	pub fn check(&self, algorithm: &KeyAlgorithm) -> std::result::Result<(), String> {
		match algorithm {
			KeyAlgorithm::Rsa { .. } if !self.allow_rsa => Err("RSA keys are not allowed".into()),
			KeyAlgorithm::Rsa { bits } if *bits < self.min_rsa_bits || *bits > self.max_rsa_bits => {
				Err(format!(
					"RSA key size {bits} outside {}..={}",
					self.min_rsa_bits, self.max_rsa_bits
				))
			},
			KeyAlgorithm::Rsa { .. } => Ok(()),
			KeyAlgorithm::Ecdsa { .. } if !self.allow_ecdsa => {
				Err("ECDSA keys are not allowed".into())
			},
			KeyAlgorithm::Ecdsa { curve: Some(curve) }
				if curve == oid::EC_SECP_256_R1 || curve == oid::EC_SECP_384_R1 =>
			{
				Ok(())
			},
			KeyAlgorithm::Ecdsa { .. } => Err("unsupported ECDSA curve".into()),
			KeyAlgorithm::Other(_) => Err("unsupported key type".into()),
		}
	}
}

/// Decides whether the authority may issue for a name.
///
/// Domain validation and rate limiting happen elsewhere; this only rules on
/// the name itself.
pub trait PolicyAuthority: Send + Sync {
	/// Returns a reason if `name` must not appear in a certificate.
	fn willing_to_issue(&self, name: &str) -> std::result::Result<(), String>;
}

/// A [`PolicyAuthority`] accepting syntactically valid, fully qualified DNS names.
#[derive(Debug, Default, Clone)]
pub struct DnsPolicy {
	blocked: BTreeSet<String>,
}

impl DnsPolicy {
	/// A policy with no blocked names.
	pub fn new() -> Self {
		Self::default()
	}

	/// Refuses `name` and every name below it.
	pub fn block(mut self, name: impl Into<String>) -> Self {
		self.blocked.insert(name.into().to_ascii_lowercase());
		self
	}
}

impl PolicyAuthority for DnsPolicy {
	fn willing_to_issue(&self, name: &str) -> std::result::Result<(), String> {
		if name.is_empty() || name.len() > 253 {
			return Err(format!("invalid name length for {name:?}"));
		}
		let labels: Vec<&str> = name.split('.').collect();
		if labels.len() < 2 {
			return Err(format!("{name:?} is not fully qualified"));
		}
		for label in &labels {
			let valid = !label.is_empty()
				&& label.len() <= 63
				&& !label.starts_with('-')
				&& !label.ends_with('-')
				&& label
					.bytes()
					.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
			if !valid {
				return Err(format!("invalid label {label:?} in {name:?}"));
			}
		}
		if labels
			.last()
			.map_or(false, |tld| tld.bytes().all(|b| b.is_ascii_digit()))
		{
			return Err(format!("{name:?} looks like an IP address"));
		}
		let blocked = self.blocked.iter().any(|blocked| {
			name == blocked
				|| name
					.strip_suffix(blocked.as_str())
					.map_or(false, |prefix| prefix.ends_with('.'))
		});
		if blocked {
			return Err(format!("policy forbids issuing for {name:?}"));
		}
		Ok(())
	}
}

/// The names a request is allowed to receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedNames {
	/// Subject common name
	pub common_name: String,
	/// Every distinct name, lowercased and sorted, common name included
	pub names: Vec<String>,
}

const ALLOWED_SIGNATURE_ALGORITHMS: &[&[u64]] = &[
	oid::SHA256_WITH_RSA,
	oid::SHA384_WITH_RSA,
	oid::SHA512_WITH_RSA,
	oid::ECDSA_WITH_SHA256,
	oid::ECDSA_WITH_SHA384,
	oid::ECDSA_WITH_SHA512,
];

/// Runs every structural and policy check on `csr`.
///
/// Checks run in a fixed order: subject key, signature algorithm,
/// self-signature, presence of names, common name, name count, and finally
/// the policy authority for each name. The first failure is returned as
/// [`Error::Malformed`].
pub fn verify_csr(
	csr: &ParsedCsr,
	max_names: usize,
	key_policy: &KeyPolicy,
	pa: &dyn PolicyAuthority,
	force_cn_from_san: bool,
	registration_id: i64,
) -> Result<VerifiedNames> {
	key_policy
		.check(&csr.public_key.algorithm)
		.map_err(|reason| Error::malformed(format!("invalid public key in CSR: {reason}")))?;

	if !ALLOWED_SIGNATURE_ALGORITHMS
		.iter()
		.any(|alg| csr.signature_algorithm.as_slice() == *alg)
	{
		return Err(Error::malformed("signature algorithm not supported"));
	}
	if !csr.signature_valid {
		return Err(Error::malformed("invalid signature on CSR"));
	}

	let mut common_name = csr
		.common_name
		.as_deref()
		.unwrap_or_default()
		.to_ascii_lowercase();
	let sans: Vec<String> = csr
		.dns_names
		.iter()
		.map(|name| name.to_ascii_lowercase())
		.collect();
	if common_name.is_empty() && sans.is_empty() {
		return Err(Error::malformed("at least one DNS name is required"));
	}
	if force_cn_from_san && common_name.is_empty() {
		if let Some(first) = sans.first() {
			common_name = first.clone();
		}
	}
	if common_name.len() > MAX_CN_LENGTH {
		return Err(Error::malformed(format!(
			"CN was longer than {MAX_CN_LENGTH} bytes"
		)));
	}

	let mut names: BTreeSet<String> = sans.into_iter().collect();
	if !common_name.is_empty() {
		names.insert(common_name.clone());
	}
	if names.len() > max_names {
		return Err(Error::malformed(format!(
			"CSR contains more than {max_names} DNS names"
		)));
	}
	for name in &names {
		if let Err(reason) = pa.willing_to_issue(name) {
			tracing::debug!(regid = registration_id, name = %name, %reason, "policy refused name");
			return Err(Error::malformed(format!("policy forbids issuing for name: {reason}")));
		}
	}

	Ok(VerifiedNames {
		common_name,
		names: names.into_iter().collect(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dns_policy_checks_syntax() {
		let pa = DnsPolicy::new().block("example.net");
		assert!(pa.willing_to_issue("www.example.com").is_ok());
		assert!(pa.willing_to_issue("xn--bcher-kva.example").is_ok());
		assert!(pa.willing_to_issue("localhost").is_err());
		assert!(pa.willing_to_issue("*.example.com").is_err());
		assert!(pa.willing_to_issue("-bad.example.com").is_err());
		assert!(pa.willing_to_issue("a..example.com").is_err());
		assert!(pa.willing_to_issue("10.0.0.1").is_err());
		assert!(pa.willing_to_issue("example.net").is_err());
		assert!(pa.willing_to_issue("www.example.net").is_err());
		assert!(pa.willing_to_issue("notexample.net").is_ok());
	}

	#[test]
	fn key_policy_limits() {
		let policy = KeyPolicy::default();
		assert!(policy.check(&KeyAlgorithm::Rsa { bits: 2048 }).is_ok());
		assert!(policy.check(&KeyAlgorithm::Rsa { bits: 1024 }).is_err());
		assert!(policy.check(&KeyAlgorithm::Rsa { bits: 8192 }).is_err());
		let p256 = KeyAlgorithm::Ecdsa {
			curve: Some(oid::EC_SECP_256_R1.to_vec()),
		};
		assert!(policy.check(&p256).is_ok());
		assert!(policy.check(&KeyAlgorithm::Ecdsa { curve: None }).is_err());
		assert!(policy.check(&KeyAlgorithm::Other(vec![1, 3, 101, 112])).is_err());

		let no_ecdsa = KeyPolicy {
			allow_ecdsa: false,
			..KeyPolicy::default()
		};
		assert!(no_ecdsa.check(&p256).is_err());
	}
}
