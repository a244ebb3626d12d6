//! Serial number and expiry generation.

use std::fmt;

use ring::rand::{SecureRandom, SystemRandom};
use time::{Duration, OffsetDateTime};

use crate::{Error, Result};

/// Bits of randomness in every serial number.
pub const RANDOM_SERIAL_BITS: usize = 136;

/// Length in bytes of every serial number: one prefix byte plus the random part.
pub const SERIAL_LEN: usize = 1 + RANDOM_SERIAL_BITS / 8;

/// A certificate serial number.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SerialNumber {
	inner: Vec<u8>,
}

impl SerialNumber {
	/// Create a serial number from the given byte slice.
	pub fn from_slice(bytes: &[u8]) -> SerialNumber {
		SerialNumber {
			inner: bytes.to_vec(),
		}
	}

	/// Return the byte representation of the serial number.
	pub fn to_bytes(&self) -> Vec<u8> {
		self.inner.clone()
	}

	/// The instance prefix, i.e. the most significant byte.
	pub fn prefix(&self) -> Option<u8> {
		self.inner.first().copied()
	}
}

/// Lowercase hex, zero-padded to the full width.
impl fmt::Display for SerialNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&hex::encode(&self.inner))
	}
}

impl From<Vec<u8>> for SerialNumber {
	fn from(inner: Vec<u8>) -> SerialNumber {
		SerialNumber { inner }
	}
}

impl AsRef<[u8]> for SerialNumber {
	fn as_ref(&self) -> &[u8] {
		&self.inner
	}
}

/// A cryptographically secure random source.
pub trait EntropySource: Send + Sync {
	/// Fills `dest` with random bytes.
	fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), String>;
}

impl EntropySource for SystemRandom {
	fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), String> {
		SecureRandom::fill(self, dest).map_err(|_| "system random source failed".to_string())
	}
}

/// Produces serial numbers and expiry times for one authority instance.
pub struct SerialGenerator {
	prefix: u8,
	entropy: Box<dyn EntropySource>,
}

impl SerialGenerator {
	/// A generator drawing from the operating system's random source.
	pub fn new(prefix: u8) -> Self {
		Self::with_entropy(prefix, Box::new(SystemRandom::new()))
	}

	/// A generator drawing from `entropy`.
	pub fn with_entropy(prefix: u8, entropy: Box<dyn EntropySource>) -> Self {
		Self { prefix, entropy }
	}

	/// The configured instance prefix.
	pub fn prefix(&self) -> u8 {
		self.prefix
	}

	/// Returns `now + validity` and a fresh serial.
	pub fn generate(
		&self,
		validity: Duration,
		now: OffsetDateTime,
	) -> Result<(OffsetDateTime, SerialNumber)> {
		let not_after = now
			.checked_add(validity)
			.ok_or_else(|| Error::internal("certificate expiry overflows"))?;

		let mut serial = [0u8; SERIAL_LEN];
		serial[0] = self.prefix;
		if let Err(err) = self.entropy.fill(&mut serial[1..]) {
			tracing::error!(target: "audit", error = %err, "failed to generate serial");
			return Err(Error::Entropy(err));
		}
		Ok((not_after, SerialNumber::from_slice(&serial)))
	}
}

impl fmt::Debug for SerialGenerator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SerialGenerator")
			.field("prefix", &self.prefix)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	struct BrokenEntropy;

	impl EntropySource for BrokenEntropy {
		fn fill(&self, _dest: &mut [u8]) -> std::result::Result<(), String> {
			Err("exhausted".into())
		}
	}

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
	}

	#[test]
	fn serials_are_unique_and_prefixed() {
		let generator = SerialGenerator::new(17);
		let mut seen = HashSet::new();
		for _ in 0..10_000 {
			let (_, serial) = generator.generate(Duration::hours(1), now()).unwrap();
			assert_eq!(serial.as_ref().len(), SERIAL_LEN);
			assert_eq!(serial.prefix(), Some(17));
			assert!(seen.insert(serial));
		}
	}

	#[test]
	fn not_after_is_now_plus_validity() {
		let generator = SerialGenerator::new(1);
		let (not_after, _) = generator.generate(Duration::days(90), now()).unwrap();
		assert_eq!(not_after, now() + Duration::days(90));
	}

	#[test]
	fn display_is_full_width_hex() {
		let mut bytes = vec![0u8; SERIAL_LEN];
		bytes[0] = 0x2a;
		let serial = SerialNumber::from(bytes);
		let shown = serial.to_string();
		assert_eq!(shown.len(), 36);
		assert!(shown.starts_with("2a00"));
	}

	#[test]
	fn entropy_failure_is_reported() {
		let generator = SerialGenerator::with_entropy(5, Box::new(BrokenEntropy));
		let err = generator.generate(Duration::hours(1), now()).unwrap_err();
		assert!(matches!(err, Error::Entropy(_)));
	}
}
