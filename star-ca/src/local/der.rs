use time::{Duration, OffsetDateTime};
use yasna::models::{GeneralizedTime, ObjectIdentifier, UTCTime};
use yasna::{DERWriter, Tag};

use super::SigningKey;
use crate::signer::SignerError;

fn dt_strip_nanos(dt: OffsetDateTime) -> OffsetDateTime {
	// Neither UTCTime nor RFC 5280 GeneralizedTime may carry fractional seconds.
	dt - Duration::nanoseconds(i64::from(dt.nanosecond()))
}

pub(crate) fn write_generalized_time(writer: DERWriter, dt: OffsetDateTime) {
	writer.write_generalized_time(&GeneralizedTime::from_datetime(dt_strip_nanos(dt)));
}

/// Validity dates before 2050 are UTCTime, everything else GeneralizedTime.
///
/// See [RFC 5280 §4.1.2.5](https://tools.ietf.org/html/rfc5280#section-4.1.2.5)
pub(crate) fn write_dt_utc_or_generalized(writer: DERWriter, dt: OffsetDateTime) {
	if (1950..2050).contains(&dt.year()) {
		writer.write_utctime(&UTCTime::from_datetime(dt_strip_nanos(dt)));
	} else {
		write_generalized_time(writer, dt);
	}
}

pub(crate) fn write_x509_extension(
	writer: DERWriter,
	extension_oid: &[u64],
	is_critical: bool,
	value_serializer: impl FnOnce(DERWriter),
) {
	//    Extension  ::=  SEQUENCE  {
	//         extnID      OBJECT IDENTIFIER,
	//         critical    BOOLEAN DEFAULT FALSE,
	//         extnValue   OCTET STRING }
	writer.write_sequence(|writer| {
		writer
			.next()
			.write_oid(&ObjectIdentifier::from_slice(extension_oid));
		if is_critical {
			writer.next().write_bool(true);
		}
		let bytes = yasna::construct_der(value_serializer);
		writer.next().write_bytes(&bytes);
	})
}

pub(crate) fn write_oid(writer: DERWriter, oid: &[u64]) {
	writer.write_oid(&ObjectIdentifier::from_slice(oid));
}

/// Writes `[tag] IMPLICIT OCTET STRING`.
pub(crate) fn write_implicit_bytes(writer: DERWriter, tag: u64, bytes: &[u8]) {
	writer.write_tagged_implicit(Tag::context(tag), |writer| writer.write_bytes(bytes));
}

/// SHA-256 of the public key, truncated to 20 bytes.
pub(crate) fn key_identifier(public_key_raw: &[u8]) -> Vec<u8> {
	let digest = ring::digest::digest(&ring::digest::SHA256, public_key_raw);
	digest.as_ref()[..20].to_vec()
}

/// Wraps a to-be-signed structure into `SEQUENCE { tbs, algorithm, signature }`.
pub(crate) fn sign_der(
	key: &SigningKey,
	tbs: impl FnOnce(DERWriter),
) -> Result<Vec<u8>, SignerError> {
	let tbs = yasna::construct_der(tbs);
	let signature = key.sign(&tbs)?;
	Ok(yasna::construct_der(|writer| {
		writer.write_sequence(|writer| {
			writer.next().write_der(&tbs);
			key.write_alg_ident(writer.next());
			writer
				.next()
				.write_bitvec_bytes(&signature, signature.len() * 8);
		})
	}))
}
