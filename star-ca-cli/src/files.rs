use std::fs::{self, File};
use std::io;
use std::path::Path;

use anyhow::Context;
use pki_types::CertificateDer;
use star_ca::local::{self_signed_issuer, SigningKey};
use time::OffsetDateTime;

use crate::Result;

/// Basename of the issuer certificate and key files.
pub const ISSUER_FILE_NAME: &str = "issuer";

#[derive(Debug, Clone)]
/// PEM serialized issuer certificate and corresponding private key
pub struct PemIssuer {
	/// `CERTIFICATE` PEM block
	pub cert_pem: String,
	/// `PRIVATE KEY` PEM block
	pub private_key_pem: String,
}

impl PemIssuer {
	/// Generates a P-256 key and a self-signed issuer certificate for it.
	pub fn generate(
		common_name: &str,
		not_before: OffsetDateTime,
		not_after: OffsetDateTime,
	) -> Result<Self> {
		let key = SigningKey::generate_ecdsa_p256()?;
		let cert = self_signed_issuer(common_name, not_before, not_after, &key)?;
		Ok(Self {
			cert_pem: pem::encode(&pem::Pem::new("CERTIFICATE", cert.to_vec())),
			private_key_pem: key.to_pkcs8_pem(),
		})
	}

	/// Writes `{name}.pem` and `{name}.key.pem` into `dir`.
	pub fn write(&self, dir: &Path, name: &str) -> io::Result<()> {
		use std::io::Write;
		fs::create_dir_all(dir)?;

		let key_path = dir.join(format!("{name}.key.pem"));
		let mut key_out = File::create(key_path)?;
		write!(key_out, "{}", &self.private_key_pem)?;

		let cert_path = dir.join(format!("{name}.pem"));
		let mut cert_out = File::create(cert_path)?;
		write!(cert_out, "{}", &self.cert_pem)?;

		Ok(())
	}

	/// Reads the files [`PemIssuer::write`] produced.
	pub fn read(dir: &Path, name: &str) -> Result<Self> {
		let read = |file: String| {
			let path = dir.join(file);
			fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
		};
		Ok(Self {
			cert_pem: read(format!("{name}.pem"))?,
			private_key_pem: read(format!("{name}.key.pem"))?,
		})
	}

	/// The issuer certificate.
	pub fn certificate(&self) -> Result<CertificateDer<'static>> {
		let block = pem::parse(&self.cert_pem).context("parsing issuer certificate")?;
		anyhow::ensure!(
			block.tag() == "CERTIFICATE",
			"expected a CERTIFICATE block, found {}",
			block.tag()
		);
		Ok(CertificateDer::from(block.into_contents()))
	}

	/// The issuer private key.
	pub fn key(&self) -> Result<SigningKey> {
		Ok(SigningKey::from_pkcs8_pem(&self.private_key_pem)?)
	}
}

/// Reads a PEM or DER encoded object from `path` and returns its DER.
pub fn read_der(path: &Path) -> Result<Vec<u8>> {
	let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
	if bytes.starts_with(b"-----BEGIN") {
		let block = pem::parse(&bytes).with_context(|| format!("parsing {}", path.display()))?;
		return Ok(block.into_contents());
	}
	Ok(bytes)
}
