//! Authority configuration.
//!
//! Configuration is consumed, not owned, by the authority: it is read once
//! when [`CertificateAuthority`](crate::CertificateAuthority) is built, and
//! every missing or out-of-range value is reported then rather than on the
//! first issuance.

use std::path::Path;
use std::time::Duration as StdDuration;

use serde::Deserialize;
use time::Duration;

use crate::policy::KeyPolicy;
use crate::{Error, Result};

/// Settings for issuance, OCSP and serial generation.
///
/// ```
/// # use star_ca::CaConfig;
/// let config = CaConfig::from_toml_str(r#"
/// serial_prefix = 42
/// expiry = "2160h"
/// lifespan_ocsp = "96h"
/// max_names = 100
/// rsa_profile = "rsaEE"
/// ecdsa_profile = "ecdsaEE"
/// "#).unwrap();
/// assert_eq!(config.validity().unwrap().whole_hours(), 2160);
/// assert!(config.force_cn_from_san());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfig {
	/// Instance byte prepended to every serial number (1–255)
	pub serial_prefix: u32,
	/// Validity period of end-entity certificates
	#[serde(with = "humantime_serde")]
	pub expiry: StdDuration,
	/// Validity period of OCSP responses
	#[serde(with = "humantime_serde")]
	pub lifespan_ocsp: StdDuration,
	/// Maximum number of distinct names per certificate
	pub max_names: usize,
	/// Embed the must-staple TLS feature when a CSR asks for it
	#[serde(default)]
	pub enable_must_staple: bool,
	/// Skip copying the first SAN into an empty common name
	#[serde(default)]
	pub do_not_force_cn: bool,
	/// Signing profile used for RSA subject keys
	pub rsa_profile: String,
	/// Signing profile used for ECDSA subject keys
	pub ecdsa_profile: String,
	/// Produce a `good` OCSP response right after signing
	#[serde(default)]
	pub generate_ocsp_early: bool,
	/// Subject key acceptance rules
	#[serde(default)]
	pub key_policy: KeyPolicy,
	/// Short-term automatic renewal settings
	#[serde(default)]
	pub star: StarConfig,
}

/// Settings for the short-term automatic renewal publication endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StarConfig {
	/// Base URI prepended to renewal identifiers in renewal pointers
	#[serde(default = "default_renewal_base_uri")]
	pub renewal_base_uri: String,
}

fn default_renewal_base_uri() -> String {
	"https://localhost:9898".to_string()
}

impl Default for StarConfig {
	fn default() -> Self {
		Self {
			renewal_base_uri: default_renewal_base_uri(),
		}
	}
}

impl CaConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(s: &str) -> Result<Self> {
		let config: CaConfig = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
		Self::from_toml_str(&contents)
	}

	/// Checks every value the authority depends on.
	pub fn validate(&self) -> Result<()> {
		if self.serial_prefix == 0 || self.serial_prefix > 255 {
			return Err(Error::Config(
				"must have a positive non-zero serial prefix less than 256".into(),
			));
		}
		if self.expiry.is_zero() {
			return Err(Error::Config("must specify an expiry period".into()));
		}
		if self.lifespan_ocsp.is_zero() {
			return Err(Error::Config("must specify an OCSP lifespan period".into()));
		}
		if self.max_names == 0 {
			return Err(Error::Config("max_names must be positive".into()));
		}
		if self.rsa_profile.is_empty() || self.ecdsa_profile.is_empty() {
			return Err(Error::Config("must specify rsa_profile and ecdsa_profile".into()));
		}
		self.validity()?;
		self.ocsp_lifespan()?;
		Ok(())
	}

	/// The serial prefix as a byte.
	pub fn prefix(&self) -> Result<u8> {
		u8::try_from(self.serial_prefix)
			.ok()
			.filter(|p| *p != 0)
			.ok_or_else(|| Error::Config(format!("invalid serial prefix {}", self.serial_prefix)))
	}

	/// Certificate validity as a signed duration.
	pub fn validity(&self) -> Result<Duration> {
		Duration::try_from(self.expiry).map_err(|e| Error::Config(format!("expiry: {e}")))
	}

	/// OCSP response validity as a signed duration.
	pub fn ocsp_lifespan(&self) -> Result<Duration> {
		Duration::try_from(self.lifespan_ocsp)
			.map_err(|e| Error::Config(format!("lifespan_ocsp: {e}")))
	}

	/// Whether an empty common name is filled from the first SAN.
	pub fn force_cn_from_san(&self) -> bool {
		!self.do_not_force_cn
	}
}
