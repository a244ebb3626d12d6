//! The set of issuers an authority instance signs with.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use pki_types::CertificateDer;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::signer::{CertificateSigner, OcspSigner};
use crate::{Error, Result};

/// The inputs for one issuer, as supplied by the deployment.
///
/// Every field is optional so that incomplete deployments are reported by
/// [`IssuerRegistry::new`] rather than at first use.
#[derive(Clone, Default)]
pub struct IssuerParams {
	/// The issuer's own certificate
	pub certificate: Option<CertificateDer<'static>>,
	/// Capability signing end-entity certificates
	pub signer: Option<Arc<dyn CertificateSigner>>,
	/// Capability signing OCSP responses
	pub ocsp_signer: Option<Arc<dyn OcspSigner>>,
}

/// One issuing certificate together with its signing capabilities.
pub struct Issuer {
	common_name: String,
	certificate: CertificateDer<'static>,
	not_after: OffsetDateTime,
	signer: Arc<dyn CertificateSigner>,
	ocsp_signer: Arc<dyn OcspSigner>,
}

impl Issuer {
	fn from_params(index: usize, params: IssuerParams) -> Result<Self> {
		let certificate = params
			.certificate
			.ok_or_else(|| Error::Config(format!("issuer {index} has no certificate")))?;
		let signer = params
			.signer
			.ok_or_else(|| Error::Config(format!("issuer {index} has no signer")))?;
		let ocsp_signer = params
			.ocsp_signer
			.ok_or_else(|| Error::Config(format!("issuer {index} has no OCSP signer")))?;

		let (_, cert) = X509Certificate::from_der(certificate.as_ref())
			.map_err(|e| Error::Config(format!("issuer {index} certificate: {e}")))?;
		let common_name = cert
			.subject()
			.iter_common_name()
			.next()
			.and_then(|cn| cn.as_str().ok())
			.map(str::to_owned)
			.ok_or_else(|| Error::Config(format!("issuer {index} has no common name")))?;
		let not_after = cert.validity().not_after.to_datetime();

		Ok(Self {
			common_name,
			certificate,
			not_after,
			signer,
			ocsp_signer,
		})
	}

	/// The subject common name identifying this issuer.
	pub fn common_name(&self) -> &str {
		&self.common_name
	}

	/// The issuer's certificate.
	pub fn certificate(&self) -> &CertificateDer<'static> {
		&self.certificate
	}

	/// Expiry of the issuer's certificate.
	pub fn not_after(&self) -> OffsetDateTime {
		self.not_after
	}

	/// The end-entity signing capability.
	pub fn signer(&self) -> &dyn CertificateSigner {
		self.signer.as_ref()
	}

	/// The OCSP signing capability.
	pub fn ocsp_signer(&self) -> &dyn OcspSigner {
		self.ocsp_signer.as_ref()
	}
}

impl fmt::Debug for Issuer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Issuer")
			.field("common_name", &self.common_name)
			.field("not_after", &self.not_after)
			.finish_non_exhaustive()
	}
}

/// Issuers keyed by common name. Read-only once built.
#[derive(Debug)]
pub struct IssuerRegistry {
	issuers: Vec<Issuer>,
}

impl IssuerRegistry {
	/// Validates and registers `issuers`.
	///
	/// Fails on an empty list, on any entry missing a certificate or signer,
	/// and on two entries sharing a common name. The first entry becomes the
	/// default issuer.
	pub fn new(issuers: Vec<IssuerParams>) -> Result<Self> {
		if issuers.is_empty() {
			return Err(Error::Config("must have at least one issuer".into()));
		}
		let issuers = issuers
			.into_iter()
			.enumerate()
			.map(|(index, params)| Issuer::from_params(index, params))
			.collect::<Result<Vec<_>>>()?;

		let mut names = HashSet::new();
		for issuer in &issuers {
			if !names.insert(issuer.common_name.as_str()) {
				return Err(Error::Config(format!(
					"multiple issuer certs with the same CommonName {:?} are not supported",
					issuer.common_name
				)));
			}
		}

		Ok(Self { issuers })
	}

	/// Looks an issuer up by common name.
	pub fn resolve_by_identity(&self, common_name: &str) -> Option<&Issuer> {
		self.issuers
			.iter()
			.find(|issuer| issuer.common_name == common_name)
	}

	/// The issuer that signs end-entity certificates.
	pub fn default_issuer(&self) -> &Issuer {
		// `new` guarantees at least one entry
		&self.issuers[0]
	}

	/// Every registered issuer, default first.
	pub fn iter(&self) -> impl Iterator<Item = &Issuer> {
		self.issuers.iter()
	}
}
