mod util;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use star_ca::local::SigningKey;
use star_ca::star::{ArtifactStore, FsArtifactStore, InMemoryScheduler, StarCoordinator};
use star_ca::{
	CertificateAuthority, CertificateSigner, DnsPolicy, Error, FakeClock, IssueRequest,
	IssuerRegistry, MemoryCertificateStore, SignRequest, SignerError,
};
use time::Duration;
use util::{config, CsrBuilder, TestCa, TestIssuer, ISSUER_CN};
use uuid::Uuid;

fn star_csr(domain: &str) -> Vec<u8> {
	let key = SigningKey::generate_ecdsa_p256().unwrap();
	CsrBuilder::new().dns_names(&[domain]).sign(&key)
}

#[test]
fn renewal_round_trip() {
	let t = TestCa::new(&config(""));
	let pending = t.star.begin("star.example.com", 24).unwrap();
	let id = pending.renewal_id;
	let csr = star_csr("star.example.com");

	let first = t
		.ca
		.issue_certificate(&IssueRequest::new(1, csr.clone()).with_renewal(id))
		.unwrap();
	assert_eq!(first.not_after, t.now() + Duration::hours(24));

	let state = t.star.state(id).unwrap();
	assert!(!state.pending);
	assert!(!state.in_flight);
	assert_eq!(state.current_serial, Some(first.serial.to_string()));
	assert_eq!(state.next_renewal_due, Some(t.now() + Duration::hours(24)));
	let scheduled = t.scheduler.scheduled(id).unwrap();
	assert_eq!(scheduled.due, t.now() + Duration::hours(24));
	assert_eq!(scheduled.renewal, pending);

	let served = t.star.serve(&format!("/{id}")).unwrap();
	assert_eq!(served.status, 200);
	assert_eq!(served.body, first.to_pem());
	assert_eq!(
		served.header("content-type"),
		Some("application/pem-certificate-chain")
	);
	assert_eq!(served.header("Not-Before"), Some("May  2 09:55:00 2025 GMT"));
	assert_eq!(served.header("Not-After"), Some("May  3 10:00:00 2025 GMT"));

	let pointer = t.star.serve(&format!("/{}", first.serial)).unwrap();
	assert_eq!(pointer.status, 200);
	assert_eq!(pointer.body, format!("https://localhost:9898/{id}"));

	// Nothing is armed until the renewal falls due.
	let err = t
		.ca
		.issue_certificate(&IssueRequest::new(1, csr.clone()).with_renewal(id))
		.unwrap_err();
	assert!(matches!(err, Error::NoPendingRenewal(_)), "{err}");
	assert!(t.star.due_renewals(t.now()).is_empty());

	t.clock.advance(Duration::hours(24));
	assert_eq!(t.star.due_renewals(t.now()), [pending.clone()]);
	assert_eq!(t.scheduler.due(t.now()).len(), 1);
	t.star.rearm(id).unwrap();
	assert!(t.star.due_renewals(t.now()).is_empty());

	let second = t
		.ca
		.issue_certificate(&IssueRequest::new(1, csr).with_renewal(id))
		.unwrap();
	assert_ne!(second.serial, first.serial);
	let served = t.star.serve(&format!("/{id}")).unwrap();
	assert_eq!(served.body, second.to_pem());
	assert_eq!(served.header("Not-After"), Some("May  4 10:00:00 2025 GMT"));
	// Pointers of earlier certificates stay published.
	assert_eq!(t.star.serve(&format!("/{}", first.serial)).unwrap().status, 200);

	t.star.withdraw(id).unwrap();
	let canceled = t.star.serve(&format!("/{id}")).unwrap();
	assert_eq!(canceled.status, 404);
	assert_eq!(canceled.body, "Order status: canceled");
	assert!(t.scheduler.scheduled(id).is_none());
	assert!(matches!(t.star.rearm(id), Err(Error::NotFound(_))));
}

#[test]
fn unknown_renewal() {
	let t = TestCa::new(&config(""));
	let err = t
		.ca
		.issue_certificate(&IssueRequest::new(1, star_csr("example.com")).with_renewal(Uuid::new_v4()))
		.unwrap_err();
	assert!(matches!(err, Error::NotFound(_)), "{err}");
	assert_eq!(t.ca.metrics().cert_signatures, 0);
}

#[test]
fn renewal_needs_a_coordinator() {
	let clock = Arc::new(FakeClock::new(util::start()));
	let issuer = TestIssuer::new(ISSUER_CN, util::start() + Duration::days(365));
	let ca = CertificateAuthority::new(
		&config(""),
		Arc::new(IssuerRegistry::new(vec![issuer.params(&clock)]).unwrap()),
		Arc::new(MemoryCertificateStore::new()),
		Arc::new(DnsPolicy::new()),
		clock,
	)
	.unwrap();
	let err = ca
		.issue_certificate(&IssueRequest::new(1, star_csr("example.com")).with_renewal(Uuid::new_v4()))
		.unwrap_err();
	assert!(matches!(err, Error::Internal(_)), "{err}");
}

/// Blocks the first signature until the test lets it through.
struct GatedSigner {
	inner: Arc<dyn CertificateSigner>,
	gated: AtomicBool,
	entered: Barrier,
	release: Barrier,
}

impl CertificateSigner for GatedSigner {
	fn sign(&self, request: &SignRequest) -> Result<String, SignerError> {
		if !self.gated.swap(true, Ordering::SeqCst) {
			self.entered.wait();
			self.release.wait();
		}
		self.inner.sign(request)
	}
}

#[test]
fn concurrent_claims_are_refused() {
	let mut gate = None;
	let t = TestCa::with_signer(&config(""), |inner| {
		let signer = Arc::new(GatedSigner {
			inner,
			gated: AtomicBool::new(false),
			entered: Barrier::new(2),
			release: Barrier::new(2),
		});
		gate = Some(signer.clone());
		signer as Arc<dyn CertificateSigner>
	});
	let gate = gate.unwrap();
	let id = t.star.begin("star.example.com", 1).unwrap().renewal_id;
	let csr = star_csr("star.example.com");

	std::thread::scope(|s| {
		let first = s.spawn(|| {
			t.ca
				.issue_certificate(&IssueRequest::new(1, csr.clone()).with_renewal(id))
		});
		gate.entered.wait();

		let state = t.star.state(id).unwrap();
		assert!(state.pending);
		assert!(state.in_flight);
		let err = t
			.ca
			.issue_certificate(&IssueRequest::new(1, csr.clone()).with_renewal(id))
			.unwrap_err();
		assert!(matches!(err, Error::RenewalInFlight(_)), "{err}");
		assert!(matches!(t.star.withdraw(id), Err(Error::RenewalInFlight(_))));

		gate.release.wait();
		let issued = first.join().unwrap().unwrap();
		assert_eq!(
			t.star.state(id).unwrap().current_serial,
			Some(issued.serial.to_string())
		);
	});
	assert_eq!(t.ca.metrics().cert_signatures, 1);
}

/// Accepts everything but certificates.
#[derive(Default)]
struct BrokenArtifacts;

impl ArtifactStore for BrokenArtifacts {
	fn publish_certificate(&self, _renewal_id: Uuid, _certificate_pem: &str) -> io::Result<()> {
		Err(io::Error::new(io::ErrorKind::Other, "disk full"))
	}

	fn certificate(&self, _renewal_id: Uuid) -> io::Result<Option<String>> {
		Ok(None)
	}

	fn publish_pointer(
		&self,
		_serial_hex: &str,
		_renewal_id: Uuid,
		_renewal_uri: &str,
	) -> io::Result<()> {
		Ok(())
	}

	fn pointer(&self, _serial_hex: &str) -> io::Result<Option<String>> {
		Ok(None)
	}

	fn withdraw(&self, _renewal_id: Uuid) -> io::Result<()> {
		Ok(())
	}
}

fn ca_with_artifacts(
	artifacts: Arc<dyn ArtifactStore>,
) -> (CertificateAuthority, Arc<StarCoordinator>, Arc<MemoryCertificateStore>) {
	let clock = Arc::new(FakeClock::new(util::start()));
	let issuer = TestIssuer::new(ISSUER_CN, util::start() + Duration::days(365));
	let store = Arc::new(MemoryCertificateStore::new());
	let star = Arc::new(StarCoordinator::new(
		artifacts,
		Arc::new(InMemoryScheduler::new()),
		clock.clone(),
		"https://ca.example",
	));
	let ca = CertificateAuthority::new(
		&config(""),
		Arc::new(IssuerRegistry::new(vec![issuer.params(&clock)]).unwrap()),
		store.clone(),
		Arc::new(DnsPolicy::new()),
		clock,
	)
	.unwrap()
	.with_star(star.clone());
	(ca, star, store)
}

#[test]
fn failed_publication_keeps_the_renewal_armed() {
	let (ca, star, store) = ca_with_artifacts(Arc::new(BrokenArtifacts));
	let id = star.begin("star.example.com", 24).unwrap().renewal_id;

	let err = ca
		.issue_certificate(&IssueRequest::new(1, star_csr("star.example.com")).with_renewal(id))
		.unwrap_err();
	assert!(matches!(err, Error::Publication(_)), "{err}");

	let state = star.state(id).unwrap();
	assert!(state.pending);
	assert!(!state.in_flight);
	assert_eq!(state.current_serial, None);
	// Signed and stored, just not published.
	assert_eq!(store.certificates().len(), 1);
}

#[test]
fn filesystem_publication() {
	let dir = tempfile::tempdir().unwrap();
	let fs = FsArtifactStore::new(dir.path()).unwrap();
	let (ca, star, _) = ca_with_artifacts(Arc::new(fs.clone()));
	let id = star.begin("star.example.com", 24).unwrap().renewal_id;

	let issued = ca
		.issue_certificate(&IssueRequest::new(1, star_csr("star.example.com")).with_renewal(id))
		.unwrap();

	let flow = fs.flow_dir(id);
	assert_eq!(
		std::fs::read_to_string(flow.join("certificate.pem")).unwrap(),
		issued.to_pem()
	);
	let uri = format!("https://ca.example/{id}");
	assert_eq!(
		std::fs::read_to_string(flow.join("renewalURI.txt")).unwrap(),
		uri
	);
	let by_serial = dir.path().join("by-serial").join(issued.serial.to_string());
	assert_eq!(std::fs::read_to_string(by_serial).unwrap(), uri);

	star.withdraw(id).unwrap();
	assert!(!flow.exists());
	assert_eq!(star.serve(&format!("/{id}")).unwrap().status, 404);
}
