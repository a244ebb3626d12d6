use std::sync::Arc;

use pki_types::CertificateDer;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};
use time::Duration;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use yasna::models::ObjectIdentifier;
use yasna::{DERWriter, Tag};

use super::der::{sign_der, write_generalized_time, write_oid};
use super::{SigningKey, OCSP_ERROR};
use crate::clock::Clock;
use crate::oid;
use crate::signer::{CertStatus, OcspSignRequest, OcspSigner, SignerError, SignerErrorKind};
use crate::{Error, Result};

/// An [`OcspSigner`] answering for one issuer with that issuer's own key.
///
/// Responses identify the responder by key hash and carry no certificates,
/// so relying parties verify them directly against the issuer.
pub struct LocalOcspSigner {
	issuer_name_hash: Vec<u8>,
	issuer_key_hash: Vec<u8>,
	key: Arc<SigningKey>,
	clock: Arc<dyn Clock>,
	lifespan: Duration,
}

impl LocalOcspSigner {
	/// Creates a responder for `issuer`; responses are valid for `lifespan`.
	pub fn new(
		issuer: &CertificateDer<'_>,
		key: Arc<SigningKey>,
		clock: Arc<dyn Clock>,
		lifespan: Duration,
	) -> Result<Self> {
		let (_, cert) = X509Certificate::from_der(issuer.as_ref())
			.map_err(|e| Error::Config(format!("issuer certificate: {e}")))?;
		let key_bits = &cert.public_key().subject_public_key.data;
		if **key_bits != *key.public_key_raw() {
			return Err(Error::Config(
				"issuer key does not match issuer certificate".into(),
			));
		}
		Ok(Self {
			issuer_name_hash: sha1(cert.subject().as_raw()),
			issuer_key_hash: sha1(key_bits),
			key,
			clock,
			lifespan,
		})
	}

	fn write_cert_id(&self, writer: DERWriter, serial: &[u8]) {
		// CertID ::= SEQUENCE {
		//     hashAlgorithm       AlgorithmIdentifier,
		//     issuerNameHash      OCTET STRING,
		//     issuerKeyHash       OCTET STRING,
		//     serialNumber        CertificateSerialNumber }
		writer.write_sequence(|writer| {
			writer.next().write_sequence(|writer| {
				write_oid(writer.next(), oid::SHA1);
				writer.next().write_null();
			});
			writer.next().write_bytes(&self.issuer_name_hash);
			writer.next().write_bytes(&self.issuer_key_hash);
			writer.next().write_bigint_bytes(serial, true);
		});
	}
}

fn sha1(data: &[u8]) -> Vec<u8> {
	digest(&SHA1_FOR_LEGACY_USE_ONLY, data).as_ref().to_vec()
}

impl OcspSigner for LocalOcspSigner {
	fn sign(&self, request: &OcspSignRequest) -> std::result::Result<Vec<u8>, SignerError> {
		let revoked_at = match (request.status, request.revoked_at) {
			(CertStatus::Revoked, None) => {
				return Err(SignerError::new(
					SignerErrorKind::Engine(OCSP_ERROR),
					"revoked status requires a revocation time",
				))
			},
			(_, revoked_at) => revoked_at,
		};
		let now = self.clock.now();
		let next_update = now + self.lifespan;

		// https://www.rfc-editor.org/rfc/rfc6960#section-4.2.1
		let basic = sign_der(&self.key, |writer| {
			writer.write_sequence(|writer| {
				writer.next().write_tagged(Tag::context(2), |writer| {
					writer.write_bytes(&self.issuer_key_hash)
				});
				write_generalized_time(writer.next(), now);
				writer.next().write_sequence(|writer| {
					writer.next().write_sequence(|writer| {
						self.write_cert_id(writer.next(), &request.serial);
						match (request.status, revoked_at) {
							(CertStatus::Revoked, Some(revoked_at)) => writer
								.next()
								.write_tagged_implicit(Tag::context(1), |writer| {
									writer.write_sequence(|writer| {
										write_generalized_time(writer.next(), revoked_at);
										if let Some(reason) = request.reason {
											writer.next().write_tagged(Tag::context(0), |writer| {
												writer.write_enum(i64::from(reason.code()))
											});
										}
									})
								}),
							_ => writer
								.next()
								.write_tagged_implicit(Tag::context(0), |writer| writer.write_null()),
						}
						write_generalized_time(writer.next(), now);
						writer.next().write_tagged(Tag::context(0), |writer| {
							write_generalized_time(writer, next_update)
						});
					});
				});
			})
		})?;

		Ok(yasna::construct_der(|writer| {
			writer.write_sequence(|writer| {
				// successful
				writer.next().write_enum(0);
				writer.next().write_tagged(Tag::context(0), |writer| {
					writer.write_sequence(|writer| {
						writer
							.next()
							.write_oid(&ObjectIdentifier::from_slice(oid::OCSP_BASIC));
						writer.next().write_bytes(&basic);
					})
				});
			})
		}))
	}
}
