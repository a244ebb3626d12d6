#![warn(missing_docs)]
//! This library wraps [star_ca] for the `star-ca` command-line tool. It
//! bootstraps an issuer on disk and drives the authority from files: issuing
//! from a CSR, answering OCSP, running a STAR cycle into a publication
//! directory and rendering what the publication endpoint serves.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use star_ca::local::{LocalOcspSigner, LocalSigner, Profile};
use star_ca::star::{FsArtifactStore, InMemoryScheduler, PublicationResponse, StarCoordinator};
use star_ca::{
	CaConfig, CertificateAuthority, DnsPolicy, IssueRequest, IssuedCertificate, IssuerParams,
	IssuerRegistry, MemoryCertificateStore, OcspSigningRequest, RevocationReason, SystemClock,
};
use time::OffsetDateTime;
use uuid::Uuid;

mod files;
pub use files::{read_der, PemIssuer, ISSUER_FILE_NAME};

/// A specialized `Result` type.
pub type Result<T> = anyhow::Result<T>;

/// Creates an issuer valid from now for `days` days and writes it to `output`.
pub fn init(output: &Path, common_name: &str, days: i64) -> Result<PemIssuer> {
	anyhow::ensure!(days > 0, "issuer validity must be at least one day");
	let now = OffsetDateTime::now_utc();
	let issuer = PemIssuer::generate(common_name, now, now + time::Duration::days(days))?;
	issuer
		.write(output, ISSUER_FILE_NAME)
		.with_context(|| format!("writing issuer to {}", output.display()))?;
	tracing::info!(dir = %output.display(), common_name, "issuer created");
	Ok(issuer)
}

/// Builds an authority over the issuer stored in `issuer_dir`, signing with
/// in-memory keys and keeping certificates in memory.
pub fn authority(config: &CaConfig, issuer_dir: &Path) -> Result<CertificateAuthority> {
	let issuer = PemIssuer::read(issuer_dir, ISSUER_FILE_NAME)?;
	let cert = issuer.certificate()?;
	let key = Arc::new(issuer.key()?);
	let clock = Arc::new(SystemClock);

	let signer = LocalSigner::new(&cert, key.clone(), clock.clone())?
		.with_profile(config.rsa_profile.as_str(), Profile::rsa_end_entity())
		.with_profile(config.ecdsa_profile.as_str(), Profile::ecdsa_end_entity());
	let ocsp_signer = LocalOcspSigner::new(&cert, key, clock.clone(), config.ocsp_lifespan()?)?;
	let registry = IssuerRegistry::new(vec![IssuerParams {
		certificate: Some(cert),
		signer: Some(Arc::new(signer)),
		ocsp_signer: Some(Arc::new(ocsp_signer)),
	}])?;

	Ok(CertificateAuthority::new(
		config,
		Arc::new(registry),
		Arc::new(MemoryCertificateStore::new()),
		Arc::new(DnsPolicy::new()),
		clock,
	)?)
}

/// Issues a certificate for the CSR at `csr`.
pub fn issue(
	ca: &CertificateAuthority,
	csr: &Path,
	registration_id: i64,
) -> Result<IssuedCertificate> {
	let csr = read_der(csr)?;
	Ok(ca.issue_certificate(&IssueRequest::new(registration_id, csr))?)
}

/// Produces an OCSP response for the certificate at `cert`.
pub fn ocsp(
	ca: &CertificateAuthority,
	cert: &Path,
	revoked: bool,
	reason: Option<u8>,
) -> Result<Vec<u8>> {
	let cert = read_der(cert)?;
	let request = if revoked {
		let reason = reason
			.map(|code| {
				RevocationReason::from_code(code)
					.with_context(|| format!("unknown revocation reason {code}"))
			})
			.transpose()?;
		OcspSigningRequest::revoked(cert, reason, OffsetDateTime::now_utc())
	} else {
		anyhow::ensure!(reason.is_none(), "a reason requires --revoked");
		OcspSigningRequest::good(cert)
	};
	Ok(ca.generate_ocsp(&request)?)
}

/// A coordinator publishing into `publish_dir`.
pub fn coordinator(config: &CaConfig, publish_dir: &Path) -> Result<StarCoordinator> {
	let artifacts = FsArtifactStore::new(publish_dir)
		.with_context(|| format!("opening {}", publish_dir.display()))?;
	Ok(StarCoordinator::new(
		Arc::new(artifacts),
		Arc::new(InMemoryScheduler::new()),
		Arc::new(SystemClock),
		config.star.renewal_base_uri.clone(),
	))
}

/// Starts a renewal flow for `domain` and runs its first issuance.
pub fn star_cycle(
	ca: CertificateAuthority,
	star: Arc<StarCoordinator>,
	csr: &Path,
	domain: &str,
	lifetime_hours: u32,
) -> Result<(Uuid, IssuedCertificate)> {
	let ca = ca.with_star(star.clone());
	let renewal = star.begin(domain, lifetime_hours)?;
	let csr = read_der(csr)?;
	let issued =
		ca.issue_certificate(&IssueRequest::new(1, csr).with_renewal(renewal.renewal_id))?;
	Ok((renewal.renewal_id, issued))
}

/// Renders a publication response the way an HTTP client would print it.
pub fn render(response: &PublicationResponse) -> String {
	let mut out = format!("{}\n", response.status);
	for (name, value) in &response.headers {
		out.push_str(&format!("{name}: {value}\n"));
	}
	out.push('\n');
	out.push_str(&response.body);
	out
}

/// Answers `GET /{path}` from the artifacts in `publish_dir`.
pub fn serve(publish_dir: &Path, path: &str) -> Result<String> {
	anyhow::ensure!(
		publish_dir.is_dir(),
		"{} is not a publication directory",
		publish_dir.display()
	);
	// Serving reads published files only; no flow state is involved.
	let artifacts = FsArtifactStore::new(publish_dir)?;
	let star = StarCoordinator::new(
		Arc::new(artifacts),
		Arc::new(InMemoryScheduler::new()),
		Arc::new(SystemClock),
		String::new(),
	);
	Ok(render(&star.serve(path)?))
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
