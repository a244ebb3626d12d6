//! An in-process signing backend.
//!
//! Deployments normally sign through a hardware module; this backend keeps
//! the issuer key in memory so the authority can be run and tested without
//! one. Keys are handled by `ring`, structures are written with `yasna`.

mod cert;
mod der;
mod key;
mod ocsp;

pub use cert::{self_signed_issuer, ExtendedKeyUsage, KeyUsage, LocalSigner, Profile};
pub use key::SigningKey;
pub use ocsp::LocalOcspSigner;

/// Engine error code: the certificate could not be assembled.
pub const CERTIFICATE_ERROR: u32 = 1000;
/// Engine error code: the private key failed to sign.
pub const PRIVATE_KEY_ERROR: u32 = 2000;
/// Engine error code: the request violates the signing profile.
pub const POLICY_ERROR: u32 = 5000;
/// Engine error code: the OCSP response could not be produced.
pub const OCSP_ERROR: u32 = 8000;
/// Engine error code: the embedded request could not be parsed.
pub const CSR_ERROR: u32 = 9000;
