//! Certificate signing request parsing.

use pem::Pem;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::{FromDer, ParsedCriAttribute};
use x509_parser::public_key::PublicKey;

use crate::oid;
use crate::{Error, Result};

/// The algorithm of a subject public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAlgorithm {
	/// RSA with the given modulus size in bits
	Rsa {
		/// Modulus size in bits
		bits: usize,
	},
	/// ECDSA on the named curve
	Ecdsa {
		/// Curve OID arcs, if the parameters name one
		curve: Option<Vec<u64>>,
	},
	/// Any other algorithm, by OID arcs
	Other(Vec<u64>),
}

/// The public key carried by a CSR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
	/// Key algorithm
	pub algorithm: KeyAlgorithm,
	/// DER-encoded SubjectPublicKeyInfo
	pub spki_der: Vec<u8>,
	/// Contents of the SubjectPublicKeyInfo bit string
	pub key_bits: Vec<u8>,
}

/// One entry of the CSR's extension request attribute, kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedExtension {
	/// Object identifier arcs, `None` when an arc does not fit in a `u64`
	pub oid: Option<Vec<u64>>,
	/// Content octets of the DER-encoded object identifier
	pub oid_der: Vec<u8>,
	/// Critical flag as requested
	pub critical: bool,
	/// Raw `extnValue` contents
	pub value: Vec<u8>,
}

/// An owned view of a parsed PKCS#10 request.
#[derive(Debug, Clone)]
pub struct ParsedCsr {
	der: Vec<u8>,
	/// Subject public key
	pub public_key: PublicKeyInfo,
	/// Subject common name, if present
	pub common_name: Option<String>,
	/// DNS names of the first requested subject alternative name extension
	pub dns_names: Vec<String>,
	/// Every requested extension, in request order, duplicates included
	pub requested_extensions: Vec<RequestedExtension>,
	/// Signature algorithm OID arcs
	pub signature_algorithm: Vec<u64>,
	/// Whether the request's self-signature verified
	pub signature_valid: bool,
}

impl ParsedCsr {
	/// Parse a certificate signing request from DER-encoded bytes
	pub fn from_der(der: &[u8]) -> Result<Self> {
		let (rest, csr) = X509CertificationRequest::from_der(der)
			.map_err(|e| Error::malformed(format!("invalid CSR: {e}")))?;
		if !rest.is_empty() {
			return Err(Error::malformed("trailing data after CSR"));
		}

		let signature_valid = csr.verify_signature().is_ok();
		let signature_algorithm = oid::arcs(&csr.signature_algorithm.algorithm)
			.ok_or_else(|| Error::malformed("unrepresentable signature algorithm"))?;

		let info = &csr.certification_request_info;
		let spki = &info.subject_pki;
		let algorithm = if oid::matches(&spki.algorithm.algorithm, oid::RSA_ENCRYPTION) {
			let bits = match spki.parsed() {
				Ok(PublicKey::RSA(rsa)) => modulus_bits(rsa.modulus),
				_ => return Err(Error::malformed("invalid RSA public key")),
			};
			KeyAlgorithm::Rsa { bits }
		} else if oid::matches(&spki.algorithm.algorithm, oid::EC_PUBLIC_KEY) {
			let curve = spki
				.algorithm
				.parameters
				.as_ref()
				.and_then(|params| params.as_oid().ok())
				.and_then(|curve| oid::arcs(&curve));
			KeyAlgorithm::Ecdsa { curve }
		} else {
			KeyAlgorithm::Other(oid::arcs(&spki.algorithm.algorithm).unwrap_or_default())
		};

		let common_name = info
			.subject
			.iter_common_name()
			.next()
			.and_then(|cn| cn.as_str().ok())
			.map(str::to_owned);

		// Raw values are kept so unknown extensions can be classified later.
		let mut requested_extensions = Vec::new();
		let mut dns_names = None;
		for attr in info.iter_attributes() {
			let ParsedCriAttribute::ExtensionRequest(request) = attr.parsed_attribute() else {
				continue;
			};
			for ext in &request.extensions {
				if dns_names.is_none() {
					if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
						dns_names = Some(
							san.general_names
								.iter()
								.filter_map(|name| match name {
									GeneralName::DNSName(dns) => Some(dns.to_string()),
									_ => None,
								})
								.collect::<Vec<_>>(),
						);
					}
				}
				requested_extensions.push(RequestedExtension {
					oid: oid::arcs(&ext.oid),
					oid_der: ext.oid.as_bytes().to_vec(),
					critical: ext.critical,
					value: ext.value.to_vec(),
				});
			}
		}

		Ok(Self {
			der: der.to_vec(),
			public_key: PublicKeyInfo {
				algorithm,
				spki_der: spki.raw.to_vec(),
				key_bits: spki.subject_public_key.data.to_vec(),
			},
			common_name,
			dns_names: dns_names.unwrap_or_default(),
			requested_extensions,
			signature_algorithm,
			signature_valid,
		})
	}

	/// Parse a certificate signing request from the ASCII PEM format
	pub fn from_pem(pem_str: &str) -> Result<Self> {
		let csr = pem::parse(pem_str).map_err(|e| Error::malformed(format!("invalid PEM: {e}")))?;
		Self::from_der(csr.contents())
	}

	/// The request exactly as it was received.
	pub fn der(&self) -> &[u8] {
		&self.der
	}

	/// The request as a `CERTIFICATE REQUEST` PEM block.
	pub fn to_pem(&self) -> String {
		let p = Pem::new("CERTIFICATE REQUEST", self.der.clone());
		pem::encode_config(&p, crate::ENCODE_CONFIG)
	}

	/// Hex SHA-256 of the raw request, used to correlate audit records.
	pub fn sha256_hex(&self) -> String {
		hex::encode(ring::digest::digest(&ring::digest::SHA256, &self.der))
	}
}

fn modulus_bits(modulus: &[u8]) -> usize {
	let significant = match modulus.iter().position(|b| *b != 0) {
		Some(start) => &modulus[start..],
		None => return 0,
	};
	significant.len() * 8 - significant[0].leading_zeros() as usize
}
