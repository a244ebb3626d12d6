/*!
Certificate authority core with short-term automatic renewal

This crate issues end-entity certificates from PKCS#10 requests, signs OCSP
responses for the certificates it issued and keeps short-lived certificates
fresh through STAR renewal flows.

The entry point is [`CertificateAuthority`]. It is assembled from a
[`CaConfig`], an [`IssuerRegistry`] whose issuers carry their signing
backends, a [`CertificateStore`] and a [`PolicyAuthority`]. Signing itself is
delegated to [`CertificateSigner`] and [`OcspSigner`] implementations; the
[`local`] module provides in-memory ones.

## Example

```
use std::sync::Arc;
use star_ca::local::{self_signed_issuer, LocalOcspSigner, LocalSigner, SigningKey};
use star_ca::{
	CaConfig, CertificateAuthority, DnsPolicy, IssuerParams, IssuerRegistry,
	MemoryCertificateStore, SystemClock,
};
use time::{Duration, OffsetDateTime};

# fn main() -> star_ca::Result<()> {
let clock = Arc::new(SystemClock);
let now = OffsetDateTime::now_utc();
let key = Arc::new(SigningKey::generate_ecdsa_p256()?);
let issuer = self_signed_issuer("Example Issuer", now, now + Duration::days(365), &key)?;

let registry = IssuerRegistry::new(vec![IssuerParams {
	certificate: Some(issuer.clone()),
	signer: Some(Arc::new(LocalSigner::new(&issuer, key.clone(), clock.clone())?)),
	ocsp_signer: Some(Arc::new(LocalOcspSigner::new(
		&issuer,
		key,
		clock.clone(),
		Duration::hours(96),
	)?)),
}])?;

let config = CaConfig::from_toml_str(
	r#"
	serial_prefix = 42
	expiry = "90days"
	lifespan_ocsp = "96h"
	max_names = 100
	rsa_profile = "rsaEE"
	ecdsa_profile = "ecdsaEE"
	"#,
)?;
let ca = CertificateAuthority::new(
	&config,
	Arc::new(registry),
	Arc::new(MemoryCertificateStore::new()),
	Arc::new(DnsPolicy::new()),
	clock,
)?;
assert_eq!(ca.metrics().cert_signatures, 0);
# Ok(())
# }
```
*/
#![forbid(unsafe_code)]
#![forbid(non_ascii_idents)]
#![deny(missing_docs)]
#![allow(clippy::complexity, clippy::style, clippy::pedantic)]

pub use crate::authority::{CertificateAuthority, IssuanceStage, IssueRequest, IssuedCertificate};
pub use crate::clock::{Clock, FakeClock, SystemClock};
pub use crate::config::{CaConfig, StarConfig};
pub use crate::csr::{KeyAlgorithm, ParsedCsr, PublicKeyInfo, RequestedExtension};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::extensions::{
	must_staple_extension, ExtensionCategory, ExtensionDecision, ExtensionPolicy,
	MUST_STAPLE_FEATURE_VALUE,
};
pub use crate::issuer::{Issuer, IssuerParams, IssuerRegistry};
pub use crate::metrics::{CaMetrics, MetricsSnapshot, SignaturePurpose};
pub use crate::ocsp::{OcspResponder, OcspSigningRequest};
pub use crate::policy::{verify_csr, DnsPolicy, KeyPolicy, PolicyAuthority, VerifiedNames};
pub use crate::serial::{EntropySource, SerialGenerator, SerialNumber};
pub use crate::signer::{
	CertStatus, CertificateSigner, Extension, OcspSignRequest, OcspSigner, RevocationReason,
	SignRequest, SignerError, SignerErrorKind, Subject,
};
pub use crate::storage::{CertificateStore, MemoryCertificateStore, StoreError, StoredCertificate};

mod authority;
mod clock;
mod config;
mod csr;
mod error;
mod extensions;
mod issuer;
pub mod local;
mod metrics;
mod ocsp;
pub mod oid;
mod policy;
mod serial;
mod signer;
pub mod star;
mod storage;

const ENCODE_CONFIG: pem::EncodeConfig = {
	let line_ending = match cfg!(target_family = "windows") {
		true => pem::LineEnding::CRLF,
		false => pem::LineEnding::LF,
	};
	pem::EncodeConfig::new().set_line_ending(line_ending)
};
