use std::fmt;

use pem::Pem;
use ring::rand::SystemRandom;
use ring::signature::{
	self, EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair as RingKeyPair, RsaKeyPair,
};
use yasna::models::ObjectIdentifier;
use yasna::DERWriter;

use super::PRIVATE_KEY_ERROR;
use crate::oid;
use crate::signer::{SignerError, SignerErrorKind};
use crate::{Error, Result};

#[allow(clippy::large_enum_variant)]
enum KeyKind {
	Ec(EcdsaKeyPair, Curve),
	Rsa(RsaKeyPair),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Curve {
	P256,
	P384,
}

impl Curve {
	fn signing_alg(self) -> &'static EcdsaSigningAlgorithm {
		match self {
			Curve::P256 => &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
			Curve::P384 => &signature::ECDSA_P384_SHA384_ASN1_SIGNING,
		}
	}

	fn oid(self) -> &'static [u64] {
		match self {
			Curve::P256 => oid::EC_SECP_256_R1,
			Curve::P384 => oid::EC_SECP_384_R1,
		}
	}
}

/// A private key held in process memory.
///
/// ECDSA keys sign with SHA-256 (P-256) or SHA-384 (P-384), RSA keys with
/// PKCS#1 v1.5 and SHA-256. Note that ring only accepts RSA keys in PKCS#8
/// form, so `openssl genrsa` output needs converting first.
pub struct SigningKey {
	kind: KeyKind,
	pkcs8: Vec<u8>,
}

impl SigningKey {
	/// Generate a new random P-256 key
	pub fn generate_ecdsa_p256() -> Result<Self> {
		let rng = SystemRandom::new();
		let doc = EcdsaKeyPair::generate_pkcs8(Curve::P256.signing_alg(), &rng)
			.map_err(|_| Error::internal("failed to generate key"))?;
		Self::from_pkcs8_der(doc.as_ref())
	}

	/// Obtains the key from a PKCS#8 DER document, detecting its type.
	pub fn from_pkcs8_der(pkcs8: &[u8]) -> Result<Self> {
		let rng = SystemRandom::new();
		let kind = if let Ok(pair) = EcdsaKeyPair::from_pkcs8(Curve::P256.signing_alg(), pkcs8, &rng)
		{
			KeyKind::Ec(pair, Curve::P256)
		} else if let Ok(pair) = EcdsaKeyPair::from_pkcs8(Curve::P384.signing_alg(), pkcs8, &rng) {
			KeyKind::Ec(pair, Curve::P384)
		} else {
			let pair = RsaKeyPair::from_pkcs8(pkcs8)
				.map_err(|e| Error::Config(format!("unsupported private key: {e}")))?;
			KeyKind::Rsa(pair)
		};
		Ok(Self {
			kind,
			pkcs8: pkcs8.to_vec(),
		})
	}

	/// Parses a `PRIVATE KEY` PEM block
	pub fn from_pkcs8_pem(pem_str: &str) -> Result<Self> {
		let key = pem::parse(pem_str).map_err(|e| Error::Config(format!("invalid key PEM: {e}")))?;
		Self::from_pkcs8_der(key.contents())
	}

	/// The key as a `PRIVATE KEY` PEM block.
	pub fn to_pkcs8_pem(&self) -> String {
		let p = Pem::new("PRIVATE KEY", self.pkcs8.clone());
		pem::encode_config(&p, crate::ENCODE_CONFIG)
	}

	/// The raw public key, i.e. the contents of the SPKI bit string.
	pub fn public_key_raw(&self) -> &[u8] {
		match &self.kind {
			KeyKind::Ec(pair, _) => pair.public_key().as_ref(),
			KeyKind::Rsa(pair) => pair.public_key().as_ref(),
		}
	}

	/// DER-encoded SubjectPublicKeyInfo.
	pub fn public_key_der(&self) -> Vec<u8> {
		yasna::construct_der(|writer| {
			writer.write_sequence(|writer| {
				writer.next().write_sequence(|writer| match &self.kind {
					KeyKind::Ec(_, curve) => {
						writer
							.next()
							.write_oid(&ObjectIdentifier::from_slice(oid::EC_PUBLIC_KEY));
						writer
							.next()
							.write_oid(&ObjectIdentifier::from_slice(curve.oid()));
					},
					KeyKind::Rsa(_) => {
						writer
							.next()
							.write_oid(&ObjectIdentifier::from_slice(oid::RSA_ENCRYPTION));
						writer.next().write_null();
					},
				});
				let pk = self.public_key_raw();
				writer.next().write_bitvec_bytes(pk, pk.len() * 8);
			})
		})
	}

	/// Writes the AlgorithmIdentifier of the signatures this key produces.
	pub(crate) fn write_alg_ident(&self, writer: DERWriter) {
		writer.write_sequence(|writer| match &self.kind {
			KeyKind::Ec(_, Curve::P256) => {
				writer
					.next()
					.write_oid(&ObjectIdentifier::from_slice(oid::ECDSA_WITH_SHA256));
			},
			KeyKind::Ec(_, Curve::P384) => {
				writer
					.next()
					.write_oid(&ObjectIdentifier::from_slice(oid::ECDSA_WITH_SHA384));
			},
			KeyKind::Rsa(_) => {
				writer
					.next()
					.write_oid(&ObjectIdentifier::from_slice(oid::SHA256_WITH_RSA));
				writer.next().write_null();
			},
		})
	}

	/// Signs `msg`.
	pub fn sign(&self, msg: &[u8]) -> std::result::Result<Vec<u8>, SignerError> {
		let rng = SystemRandom::new();
		let failed = |_: ring::error::Unspecified| {
			SignerError::new(SignerErrorKind::Engine(PRIVATE_KEY_ERROR), "signing failed")
		};
		match &self.kind {
			KeyKind::Ec(pair, _) => Ok(pair.sign(&rng, msg).map_err(failed)?.as_ref().to_vec()),
			KeyKind::Rsa(pair) => {
				let mut sig = vec![0; pair.public().modulus_len()];
				pair.sign(&signature::RSA_PKCS1_SHA256, &rng, msg, &mut sig)
					.map_err(failed)?;
				Ok(sig)
			},
		}
	}

	/// `true` for RSA keys.
	pub fn is_rsa(&self) -> bool {
		matches!(self.kind, KeyKind::Rsa(_))
	}
}

impl fmt::Debug for SigningKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match &self.kind {
			KeyKind::Ec(_, Curve::P256) => "ECDSA P-256",
			KeyKind::Ec(_, Curve::P384) => "ECDSA P-384",
			KeyKind::Rsa(_) => "RSA",
		};
		f.debug_struct("SigningKey").field("kind", &kind).finish()
	}
}

impl TryFrom<&[u8]> for SigningKey {
	type Error = Error;

	fn try_from(pkcs8: &[u8]) -> Result<Self> {
		Self::from_pkcs8_der(pkcs8)
	}
}
