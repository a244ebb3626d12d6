//! Command Line argument parsing
#![allow(missing_docs)]

use std::path::PathBuf;

use bpaf::Bpaf;

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version)]
/// star-ca certificate authority with short-term automatic renewal
pub enum Command {
	#[bpaf(command)]
	/// Create a self-signed issuer certificate and key
	Init {
		/// Directory receiving issuer.pem and issuer.key.pem
		#[bpaf(short, long, argument("DIR"))]
		output: PathBuf,
		/// Common name of the issuer
		#[bpaf(long, argument("CN"))]
		common_name: String,
		/// Validity of the issuer certificate in days
		#[bpaf(long, argument("N"), fallback(365), display_fallback)]
		days: i64,
	},
	#[bpaf(command)]
	/// Issue a certificate for a CSR
	Issue {
		#[bpaf(external)]
		authority: Authority,
		/// Certificate signing request, PEM or DER
		#[bpaf(long, argument("FILE"))]
		csr: PathBuf,
		/// Where the issued certificate is written, as PEM
		#[bpaf(short, long, argument("FILE"))]
		output: PathBuf,
		/// Registration the certificate is issued to
		#[bpaf(long, argument("N"), fallback(1), display_fallback)]
		registration_id: i64,
	},
	#[bpaf(command)]
	/// Produce a signed OCSP response for a certificate
	Ocsp {
		#[bpaf(external)]
		authority: Authority,
		/// Certificate to answer for, PEM or DER
		#[bpaf(long, argument("FILE"))]
		cert: PathBuf,
		/// Attest `revoked` instead of `good`
		#[bpaf(long)]
		revoked: bool,
		/// CRLReason code of a revoked certificate
		#[bpaf(long, argument("CODE"))]
		reason: Option<u8>,
		/// Where the DER response is written
		#[bpaf(short, long, argument("FILE"))]
		output: PathBuf,
	},
	#[bpaf(command)]
	/// Run one STAR issuance cycle into a publication directory
	Star {
		#[bpaf(external)]
		authority: Authority,
		/// Certificate signing request, PEM or DER
		#[bpaf(long, argument("FILE"))]
		csr: PathBuf,
		/// Domain the renewal flow certifies
		#[bpaf(long, argument("DOMAIN"))]
		domain: String,
		/// Validity of each renewed certificate in hours
		#[bpaf(long, argument("HOURS"), fallback(24), display_fallback)]
		lifetime_hours: u32,
		/// Root of the published renewal artifacts
		#[bpaf(long, argument("DIR"))]
		publish_dir: PathBuf,
	},
	#[bpaf(command)]
	/// Print what the publication endpoint answers for a path
	Serve {
		/// Root of the published renewal artifacts
		#[bpaf(long, argument("DIR"))]
		publish_dir: PathBuf,
		/// Renewal identifier or certificate serial
		#[bpaf(positional("PATH"))]
		path: String,
	},
}

#[derive(Clone, Debug, Bpaf)]
pub struct Authority {
	/// Authority configuration, TOML
	#[bpaf(long, argument("FILE"))]
	pub config: PathBuf,
	/// Directory holding issuer.pem and issuer.key.pem
	#[bpaf(long, argument("DIR"))]
	pub issuer_dir: PathBuf,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_init_defaults() {
		let parsed = command()
			.run_inner(&["init", "--output", "out", "--common-name", "Test CA"])
			.unwrap();
		match parsed {
			Command::Init {
				output,
				common_name,
				days,
			} => {
				assert_eq!(output, PathBuf::from("out"));
				assert_eq!(common_name, "Test CA");
				assert_eq!(days, 365);
			},
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn parse_ocsp() {
		let parsed = command()
			.run_inner(&[
				"ocsp",
				"--config",
				"ca.toml",
				"--issuer-dir",
				"issuer",
				"--cert",
				"cert.pem",
				"--revoked",
				"--reason",
				"1",
				"-o",
				"resp.der",
			])
			.unwrap();
		match parsed {
			Command::Ocsp {
				authority,
				revoked,
				reason,
				..
			} => {
				assert_eq!(authority.issuer_dir, PathBuf::from("issuer"));
				assert!(revoked);
				assert_eq!(reason, Some(1));
			},
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn serve_needs_a_path() {
		assert!(command()
			.run_inner(&["serve", "--publish-dir", "pub"])
			.is_err());
	}
}
