use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pem::Pem;
use pki_types::CertificateDer;
use ring::rand::{SecureRandom, SystemRandom};
use time::{Duration, OffsetDateTime};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use yasna::{DERWriter, Tag};

use super::der::{
	key_identifier, sign_der, write_dt_utc_or_generalized, write_implicit_bytes, write_oid,
	write_x509_extension,
};
use super::{SigningKey, CERTIFICATE_ERROR, CSR_ERROR, POLICY_ERROR};
use crate::clock::Clock;
use crate::csr::ParsedCsr;
use crate::oid;
use crate::signer::{CertificateSigner, SignRequest, SignerError, SignerErrorKind};
use crate::{Error, Result};

/// Purposes of the key usage extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum KeyUsage {
	DigitalSignature,
	KeyEncipherment,
	KeyCertSign,
	CrlSign,
}

impl KeyUsage {
	fn bit(self) -> u16 {
		match self {
			KeyUsage::DigitalSignature => 0,
			KeyUsage::KeyEncipherment => 2,
			KeyUsage::KeyCertSign => 5,
			KeyUsage::CrlSign => 6,
		}
	}
}

/// Purposes of the extended key usage extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ExtendedKeyUsage {
	ServerAuth,
	ClientAuth,
	OcspSigning,
}

impl ExtendedKeyUsage {
	fn oid(self) -> &'static [u64] {
		match self {
			ExtendedKeyUsage::ServerAuth => oid::KP_SERVER_AUTH,
			ExtendedKeyUsage::ClientAuth => oid::KP_CLIENT_AUTH,
			ExtendedKeyUsage::OcspSigning => oid::KP_OCSP_SIGNING,
		}
	}
}

/// A named bundle of certificate contents selected per subject key type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
	/// Key usages, marked critical
	pub key_usages: Vec<KeyUsage>,
	/// Extended key usages
	pub ext_key_usages: Vec<ExtendedKeyUsage>,
	/// How far before signing time the validity starts
	pub backdate: Duration,
}

impl Profile {
	/// TLS server and client certificates for RSA keys.
	pub fn rsa_end_entity() -> Self {
		Self {
			key_usages: vec![KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment],
			ext_key_usages: vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth],
			backdate: Duration::minutes(5),
		}
	}

	/// TLS server and client certificates for ECDSA keys.
	pub fn ecdsa_end_entity() -> Self {
		Self {
			key_usages: vec![KeyUsage::DigitalSignature],
			..Self::rsa_end_entity()
		}
	}
}

/// A [`CertificateSigner`] holding the issuer key in process memory.
pub struct LocalSigner {
	issuer_name: Vec<u8>,
	issuer_key_id: Vec<u8>,
	key: Arc<SigningKey>,
	clock: Arc<dyn Clock>,
	profiles: HashMap<String, Profile>,
}

impl LocalSigner {
	/// Creates a signer for `issuer`, whose private key is `key`.
	pub fn new(
		issuer: &CertificateDer<'_>,
		key: Arc<SigningKey>,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		let (_, cert) = X509Certificate::from_der(issuer.as_ref())
			.map_err(|e| Error::Config(format!("issuer certificate: {e}")))?;
		if *cert.public_key().subject_public_key.data != *key.public_key_raw() {
			return Err(Error::Config(
				"issuer key does not match issuer certificate".into(),
			));
		}
		Ok(Self {
			issuer_name: cert.subject().as_raw().to_vec(),
			issuer_key_id: key_identifier(key.public_key_raw()),
			key,
			clock,
			profiles: HashMap::new(),
		})
	}

	/// Registers `profile` under `name`.
	pub fn with_profile(mut self, name: impl Into<String>, profile: Profile) -> Self {
		self.profiles.insert(name.into(), profile);
		self
	}
}

impl CertificateSigner for LocalSigner {
	fn sign(&self, request: &SignRequest) -> std::result::Result<String, SignerError> {
		let engine =
			|code: u32, message: String| SignerError::new(SignerErrorKind::Engine(code), message);

		let profile = self.profiles.get(&request.profile).ok_or_else(|| {
			engine(POLICY_ERROR, format!("unknown profile {:?}", request.profile))
		})?;
		let csr = ParsedCsr::from_pem(&request.request_pem)
			.map_err(|e| engine(CSR_ERROR, e.to_string()))?;

		let not_before = self.clock.now() - profile.backdate;
		if request.not_after <= not_before {
			return Err(engine(POLICY_ERROR, "expiry precedes validity start".into()));
		}
		if request.hosts.iter().any(|host| !host.is_ascii()) {
			return Err(engine(CSR_ERROR, "non-ASCII DNS name".into()));
		}
		if let Some(serial) = &request.subject.serial_number {
			if !is_printable(serial) {
				return Err(engine(CSR_ERROR, "subject serialNumber is not printable".into()));
			}
		}

		let mut seen: HashSet<&[u64]> = [
			oid::AUTHORITY_KEY_IDENTIFIER,
			oid::SUBJECT_KEY_IDENTIFIER,
			oid::BASIC_CONSTRAINTS,
			oid::KEY_USAGE,
			oid::EXT_KEY_USAGE,
			oid::SUBJECT_ALT_NAME,
		]
		.into_iter()
		.collect();
		for ext in &request.extensions {
			if !seen.insert(ext.oid.as_slice()) {
				return Err(engine(POLICY_ERROR, format!("duplicate extension {:?}", ext.oid)));
			}
		}

		let der = sign_der(&self.key, |writer| {
			writer.write_sequence(|writer| {
				// Version: v3
				writer.next().write_tagged(Tag::context(0), |writer| {
					writer.write_u8(2);
				});
				writer
					.next()
					.write_bigint_bytes(request.serial.as_ref(), true);
				self.key.write_alg_ident(writer.next());
				writer.next().write_der(&self.issuer_name);
				writer.next().write_sequence(|writer| {
					write_dt_utc_or_generalized(writer.next(), not_before);
					write_dt_utc_or_generalized(writer.next(), request.not_after);
				});
				writer.next().write_sequence(|writer| {
					if !request.subject.common_name.is_empty() {
						write_rdn(writer.next(), oid::COMMON_NAME, |writer| {
							writer.write_utf8_string(&request.subject.common_name)
						});
					}
					if let Some(serial) = &request.subject.serial_number {
						write_rdn(writer.next(), oid::SERIAL_NUMBER, |writer| {
							writer.write_printable_string(serial)
						});
					}
				});
				writer.next().write_der(&csr.public_key.spki_der);
				writer.next().write_tagged(Tag::context(3), |writer| {
					writer.write_sequence(|writer| {
						write_x509_extension(
							writer.next(),
							oid::AUTHORITY_KEY_IDENTIFIER,
							false,
							|writer| {
								writer.write_sequence(|writer| {
									write_implicit_bytes(writer.next(), 0, &self.issuer_key_id)
								})
							},
						);
						write_x509_extension(
							writer.next(),
							oid::SUBJECT_KEY_IDENTIFIER,
							false,
							|writer| writer.write_bytes(&key_identifier(&csr.public_key.key_bits)),
						);
						write_x509_extension(writer.next(), oid::BASIC_CONSTRAINTS, true, |writer| {
							writer.write_sequence(|_| {})
						});
						write_x509_extension(writer.next(), oid::KEY_USAGE, true, |writer| {
							write_key_usage(writer, &profile.key_usages)
						});
						if !profile.ext_key_usages.is_empty() {
							write_x509_extension(writer.next(), oid::EXT_KEY_USAGE, false, |writer| {
								writer.write_sequence(|writer| {
									for usage in &profile.ext_key_usages {
										write_oid(writer.next(), usage.oid());
									}
								})
							});
						}
						if !request.hosts.is_empty() {
							write_x509_extension(writer.next(), oid::SUBJECT_ALT_NAME, false, |writer| {
								writer.write_sequence(|writer| {
									for host in &request.hosts {
										writer
											.next()
											.write_tagged_implicit(Tag::context(2), |writer| {
												writer.write_ia5_string(host)
											});
									}
								})
							});
						}
						for ext in &request.extensions {
							write_x509_extension(writer.next(), &ext.oid, ext.critical, |writer| {
								writer.write_der(&ext.value)
							});
						}
					})
				});
			})
		})
		.map_err(|e| engine(CERTIFICATE_ERROR, e.message))?;

		Ok(pem::encode_config(
			&Pem::new("CERTIFICATE", der),
			crate::ENCODE_CONFIG,
		))
	}
}

fn write_rdn(writer: DERWriter, attr: &[u64], value: impl FnOnce(DERWriter)) {
	writer.write_set(|writer| {
		writer.next().write_sequence(|writer| {
			write_oid(writer.next(), attr);
			value(writer.next());
		});
	});
}

fn write_key_usage(writer: DERWriter, usages: &[KeyUsage]) {
	let bits = usages.iter().fold(0u16, |bits, usage| bits | 1 << usage.bit());
	// Only the bits up to the highest one set are encoded.
	let msb = 16 - bits.leading_zeros();
	let nb = if msb <= 8 { 1 } else { 2 };
	let bytes = bits.reverse_bits().to_be_bytes();
	writer.write_bitvec_bytes(&bytes[..nb], msb as usize);
}

fn is_printable(s: &str) -> bool {
	s.bytes().all(|b| {
		b.is_ascii_alphanumeric()
			|| matches!(
				b,
				b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
			)
	})
}

/// Creates a self-signed CA certificate for `key`.
///
/// The certificate carries a critical basic constraints extension with
/// `cA` set, key usages for certificate and CRL signing, and a subject key
/// identifier matching the authority key identifier [`LocalSigner`] writes.
pub fn self_signed_issuer(
	common_name: &str,
	not_before: OffsetDateTime,
	not_after: OffsetDateTime,
	key: &SigningKey,
) -> Result<CertificateDer<'static>> {
	let mut serial = [0u8; 16];
	SystemRandom::new()
		.fill(&mut serial)
		.map_err(|_| Error::Entropy("system random source failed".into()))?;
	serial[0] &= 0x7f;
	serial[0] |= 0x01;

	let key_id = key_identifier(key.public_key_raw());
	let spki = key.public_key_der();
	let name = yasna::construct_der(|writer| {
		writer.write_sequence(|writer| {
			write_rdn(writer.next(), oid::COMMON_NAME, |writer| {
				writer.write_utf8_string(common_name)
			});
		})
	});

	let der = sign_der(key, |writer| {
		writer.write_sequence(|writer| {
			writer.next().write_tagged(Tag::context(0), |writer| {
				writer.write_u8(2);
			});
			writer.next().write_bigint_bytes(&serial, true);
			key.write_alg_ident(writer.next());
			writer.next().write_der(&name);
			writer.next().write_sequence(|writer| {
				write_dt_utc_or_generalized(writer.next(), not_before);
				write_dt_utc_or_generalized(writer.next(), not_after);
			});
			writer.next().write_der(&name);
			writer.next().write_der(&spki);
			writer.next().write_tagged(Tag::context(3), |writer| {
				writer.write_sequence(|writer| {
					write_x509_extension(writer.next(), oid::BASIC_CONSTRAINTS, true, |writer| {
						writer.write_sequence(|writer| writer.next().write_bool(true))
					});
					write_x509_extension(writer.next(), oid::KEY_USAGE, true, |writer| {
						write_key_usage(
							writer,
							&[
								KeyUsage::DigitalSignature,
								KeyUsage::KeyCertSign,
								KeyUsage::CrlSign,
							],
						)
					});
					write_x509_extension(
						writer.next(),
						oid::SUBJECT_KEY_IDENTIFIER,
						false,
						|writer| writer.write_bytes(&key_id),
					);
				})
			});
		})
	})
	.map_err(Error::from)?;

	Ok(CertificateDer::from(der))
}
