//! certmint CLI.
//!
//! Reads a TOML request, issues the certificate and writes `<name>.pem` and
//! `<name>.key` into the current directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use certmint::config::IssuanceRequest;
use certmint::engine::{self, IssuedCertificate};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "certmint")]
#[command(about = "Issue an X.509 certificate and key from a TOML request", long_about = None)]
struct Cli {
    /// Path to the TOML request
    config: PathBuf,

    /// Output name; writes <name>.pem and <name>.key
    name: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("certmint=info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures.
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let request = match IssuanceRequest::load(&cli.config) {
        Ok(request) => request,
        Err(e) => {
            error!("Cannot load cert config from '{}': {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let issued = match engine::issue(&request) {
        Ok(issued) => issued,
        Err(e) => {
            error!("Cannot create cert: {e}");
            return ExitCode::FAILURE;
        }
    };

    if save_artifacts(&issued, Path::new("."), &cli.name) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Writes `<name>.pem` and `<name>.key` into `dir`.
///
/// Both files are attempted even when the first write fails. Returns whether
/// both were saved.
fn save_artifacts(issued: &IssuedCertificate, dir: &Path, name: &str) -> bool {
    let cert_path = dir.join(format!("{name}.pem"));
    let key_path = dir.join(format!("{name}.key"));
    let mut saved = true;

    match std::fs::write(&cert_path, issued.certificate_pem.as_bytes()) {
        Ok(()) => info!("Cert saved to '{}'", cert_path.display()),
        Err(e) => {
            error!("Cannot save cert to '{}': {e}", cert_path.display());
            saved = false;
        }
    }

    match write_private(&key_path, issued.private_key_pem.as_bytes()) {
        Ok(()) => info!("Key saved to '{}'", key_path.display()),
        Err(e) => {
            error!("Cannot save key to '{}': {e}", key_path.display());
            saved = false;
        }
    }

    saved
}

/// Writes `contents` readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(contents)
}
