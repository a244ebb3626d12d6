use std::sync::Arc;

use star_ca::CaConfig;
use star_ca_cli::Result;
use tracing_subscriber::EnvFilter;

mod args;

use args::{Authority, Command};

fn load(authority: &Authority) -> Result<(CaConfig, star_ca::CertificateAuthority)> {
	let config = CaConfig::from_file(&authority.config)?;
	let ca = star_ca_cli::authority(&config, &authority.issuer_dir)?;
	Ok((config, ca))
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();

	match args::command().run() {
		Command::Init {
			output,
			common_name,
			days,
		} => {
			star_ca_cli::init(&output, &common_name, days)?;
		},
		Command::Issue {
			authority,
			csr,
			output,
			registration_id,
		} => {
			let (_, ca) = load(&authority)?;
			let issued = star_ca_cli::issue(&ca, &csr, registration_id)?;
			star_ca_cli::write_output(&output, issued.to_pem())?;
			println!("{}", issued.serial);
		},
		Command::Ocsp {
			authority,
			cert,
			revoked,
			reason,
			output,
		} => {
			let (_, ca) = load(&authority)?;
			let response = star_ca_cli::ocsp(&ca, &cert, revoked, reason)?;
			star_ca_cli::write_output(&output, response)?;
		},
		Command::Star {
			authority,
			csr,
			domain,
			lifetime_hours,
			publish_dir,
		} => {
			let (config, ca) = load(&authority)?;
			let star = Arc::new(star_ca_cli::coordinator(&config, &publish_dir)?);
			let (renewal_id, issued) =
				star_ca_cli::star_cycle(ca, star.clone(), &csr, &domain, lifetime_hours)?;
			println!("renewal {renewal_id}");
			println!("serial {}", issued.serial);
			println!("uri {}", star.renewal_uri(renewal_id));
		},
		Command::Serve { publish_dir, path } => {
			print!("{}", star_ca_cli::serve(&publish_dir, &path)?);
		},
	}

	Ok(())
}
