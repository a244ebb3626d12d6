use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

/// Where renewal artifacts are published for the public endpoints to serve.
///
/// Every write replaces the previous artifact as a whole: a concurrent
/// reader observes either the old or the new content, never a mix.
pub trait ArtifactStore: Send + Sync {
	/// Replaces the current certificate of a renewal flow.
	fn publish_certificate(&self, renewal_id: Uuid, certificate_pem: &str) -> io::Result<()>;

	/// The current certificate of a renewal flow, if one is published.
	fn certificate(&self, renewal_id: Uuid) -> io::Result<Option<String>>;

	/// Publishes the renewal pointer for a certificate serial.
	fn publish_pointer(&self, serial_hex: &str, renewal_id: Uuid, renewal_uri: &str)
		-> io::Result<()>;

	/// The renewal pointer published for a certificate serial.
	fn pointer(&self, serial_hex: &str) -> io::Result<Option<String>>;

	/// Removes the current certificate of a renewal flow.
	fn withdraw(&self, renewal_id: Uuid) -> io::Result<()>;
}

/// An in-process [`ArtifactStore`].
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
	certificates: RwLock<HashMap<Uuid, Arc<str>>>,
	pointers: RwLock<HashMap<String, Arc<str>>>,
}

impl MemoryArtifactStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}
}

impl ArtifactStore for MemoryArtifactStore {
	fn publish_certificate(&self, renewal_id: Uuid, certificate_pem: &str) -> io::Result<()> {
		self.certificates
			.write()
			.insert(renewal_id, Arc::from(certificate_pem));
		Ok(())
	}

	fn certificate(&self, renewal_id: Uuid) -> io::Result<Option<String>> {
		Ok(self
			.certificates
			.read()
			.get(&renewal_id)
			.map(|pem| pem.to_string()))
	}

	fn publish_pointer(
		&self,
		serial_hex: &str,
		_renewal_id: Uuid,
		renewal_uri: &str,
	) -> io::Result<()> {
		self.pointers
			.write()
			.insert(serial_hex.to_ascii_lowercase(), Arc::from(renewal_uri));
		Ok(())
	}

	fn pointer(&self, serial_hex: &str) -> io::Result<Option<String>> {
		Ok(self
			.pointers
			.read()
			.get(&serial_hex.to_ascii_lowercase())
			.map(|uri| uri.to_string()))
	}

	fn withdraw(&self, renewal_id: Uuid) -> io::Result<()> {
		self.certificates.write().remove(&renewal_id);
		Ok(())
	}
}

const CERTIFICATE_FILE: &str = "certificate.pem";
const RENEWAL_URI_FILE: &str = "renewalURI.txt";
const BY_SERIAL_DIR: &str = "by-serial";

/// An [`ArtifactStore`] keeping one directory per renewal flow.
///
/// ```text
/// <root>/<renewal-id>/certificate.pem
/// <root>/<renewal-id>/renewalURI.txt
/// <root>/by-serial/<serial-hex>
/// ```
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
	root: PathBuf,
}

impl FsArtifactStore {
	/// Opens (and creates, if needed) a store rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
		let root = root.into();
		fs::create_dir_all(root.join(BY_SERIAL_DIR))?;
		Ok(Self { root })
	}

	/// The directory holding a renewal flow's files.
	pub fn flow_dir(&self, renewal_id: Uuid) -> PathBuf {
		self.root.join(renewal_id.hyphenated().to_string())
	}

	fn pointer_path(&self, serial_hex: &str) -> io::Result<PathBuf> {
		if serial_hex.is_empty() || !serial_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
			return Err(io::Error::new(
				io::ErrorKind::InvalidInput,
				format!("invalid serial {serial_hex:?}"),
			));
		}
		Ok(self
			.root
			.join(BY_SERIAL_DIR)
			.join(serial_hex.to_ascii_lowercase()))
	}
}

/// Writes `contents` next to `path` and renames it into place.
fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
	let parent = path.parent().unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(parent)?;
	let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
	temp_file.write_all(contents.as_bytes())?;
	temp_file.as_file().sync_all()?;
	temp_file.persist(path).map_err(|e| e.error)?;
	Ok(())
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
	match fs::read_to_string(path) {
		Ok(contents) => Ok(Some(contents)),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e),
	}
}

impl ArtifactStore for FsArtifactStore {
	fn publish_certificate(&self, renewal_id: Uuid, certificate_pem: &str) -> io::Result<()> {
		write_atomic(
			&self.flow_dir(renewal_id).join(CERTIFICATE_FILE),
			certificate_pem,
		)
	}

	fn certificate(&self, renewal_id: Uuid) -> io::Result<Option<String>> {
		read_optional(&self.flow_dir(renewal_id).join(CERTIFICATE_FILE))
	}

	fn publish_pointer(
		&self,
		serial_hex: &str,
		renewal_id: Uuid,
		renewal_uri: &str,
	) -> io::Result<()> {
		write_atomic(&self.pointer_path(serial_hex)?, renewal_uri)?;
		write_atomic(
			&self.flow_dir(renewal_id).join(RENEWAL_URI_FILE),
			renewal_uri,
		)
	}

	fn pointer(&self, serial_hex: &str) -> io::Result<Option<String>> {
		match self.pointer_path(serial_hex) {
			Ok(path) => read_optional(&path),
			Err(_) => Ok(None),
		}
	}

	fn withdraw(&self, renewal_id: Uuid) -> io::Result<()> {
		match fs::remove_dir_all(self.flow_dir(renewal_id)) {
			Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
			_ => Ok(()),
		}
	}
}
