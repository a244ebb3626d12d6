//! Object identifiers the authority reads and writes, as arc lists.

use x509_parser::der_parser::oid::Oid;

/// pkcs-9-at-extensionRequest in [RFC 2985](https://www.rfc-editor.org/rfc/rfc2985#appendix-A)
pub const PKCS_9_AT_EXTENSION_REQUEST: &[u64] = &[1, 2, 840, 113549, 1, 9, 14];

/// id-at-commonName in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const COMMON_NAME: &[u64] = &[2, 5, 4, 3];
/// id-at-serialNumber in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const SERIAL_NUMBER: &[u64] = &[2, 5, 4, 5];

/// id-ecPublicKey in [RFC 5480](https://datatracker.ietf.org/doc/html/rfc5480#appendix-A)
pub const EC_PUBLIC_KEY: &[u64] = &[1, 2, 840, 10045, 2, 1];
/// secp256r1 in [RFC 5480](https://datatracker.ietf.org/doc/html/rfc5480#appendix-A)
pub const EC_SECP_256_R1: &[u64] = &[1, 2, 840, 10045, 3, 1, 7];
/// secp384r1 in [RFC 5480](https://datatracker.ietf.org/doc/html/rfc5480#appendix-A)
pub const EC_SECP_384_R1: &[u64] = &[1, 3, 132, 0, 34];
/// rsaEncryption in [RFC 4055](https://www.rfc-editor.org/rfc/rfc4055#section-6)
pub const RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113549, 1, 1, 1];

/// sha256WithRSAEncryption in [RFC 4055](https://www.rfc-editor.org/rfc/rfc4055#section-5)
pub const SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];
/// sha384WithRSAEncryption in [RFC 4055](https://www.rfc-editor.org/rfc/rfc4055#section-5)
pub const SHA384_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 12];
/// sha512WithRSAEncryption in [RFC 4055](https://www.rfc-editor.org/rfc/rfc4055#section-5)
pub const SHA512_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 13];
/// ecdsa-with-SHA256 in [RFC 5758](https://www.rfc-editor.org/rfc/rfc5758#section-3.2)
pub const ECDSA_WITH_SHA256: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];
/// ecdsa-with-SHA384 in [RFC 5758](https://www.rfc-editor.org/rfc/rfc5758#section-3.2)
pub const ECDSA_WITH_SHA384: &[u64] = &[1, 2, 840, 10045, 4, 3, 3];
/// ecdsa-with-SHA512 in [RFC 5758](https://www.rfc-editor.org/rfc/rfc5758#section-3.2)
pub const ECDSA_WITH_SHA512: &[u64] = &[1, 2, 840, 10045, 4, 3, 4];

/// id-pe-authorityInfoAccess in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const AUTHORITY_INFO_ACCESS: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 1];
/// id-ce-authorityKeyIdentifier in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const AUTHORITY_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 35];
/// id-ce-basicConstraints in [RFC 5280](https://tools.ietf.org/html/rfc5280#appendix-A.2)
pub const BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];
/// id-ce-certificatePolicies in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const CERTIFICATE_POLICIES: &[u64] = &[2, 5, 29, 32];
/// id-ce-cRLDistributionPoints in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const CRL_DISTRIBUTION_POINTS: &[u64] = &[2, 5, 29, 31];
/// id-ce-extKeyUsage in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const EXT_KEY_USAGE: &[u64] = &[2, 5, 29, 37];
/// id-ce-keyUsage in [RFC 5280](https://tools.ietf.org/html/rfc5280#appendix-A.2)
pub const KEY_USAGE: &[u64] = &[2, 5, 29, 15];
/// id-ce-subjectAltName in [RFC 5280](https://tools.ietf.org/html/rfc5280#appendix-A.2)
pub const SUBJECT_ALT_NAME: &[u64] = &[2, 5, 29, 17];
/// id-ce-subjectKeyIdentifier in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#appendix-A)
pub const SUBJECT_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 14];
/// id-pe-tlsfeature in [RFC 7633](https://www.rfc-editor.org/rfc/rfc7633#section-6)
pub const TLS_FEATURE: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 24];

/// id-kp-serverAuth in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#section-4.2.1.12)
pub const KP_SERVER_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 1];
/// id-kp-clientAuth in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#section-4.2.1.12)
pub const KP_CLIENT_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 2];
/// id-kp-OCSPSigning in [RFC 5280](https://www.rfc-editor.org/rfc/rfc5280#section-4.2.1.12)
pub const KP_OCSP_SIGNING: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 9];

/// id-pkix-ocsp-basic in [RFC 6960](https://www.rfc-editor.org/rfc/rfc6960#section-4.2.1)
pub const OCSP_BASIC: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 1];
/// id-sha1 in [RFC 3279](https://www.rfc-editor.org/rfc/rfc3279#section-2.1)
pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];

/// Compares a parsed object identifier against one of the arc lists above.
pub fn matches(oid: &Oid<'_>, expected: &[u64]) -> bool {
	oid.iter()
		.map_or(false, |arcs| arcs.eq(expected.iter().copied()))
}

/// Collects the arcs of a parsed object identifier, if they all fit in a `u64`.
pub fn arcs(oid: &Oid<'_>) -> Option<Vec<u64>> {
	oid.iter().map(|arcs| arcs.collect())
}
