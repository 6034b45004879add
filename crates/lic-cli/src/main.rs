//! # licctl entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lic_cli::issue::{run_issue, IssueArgs};
use lic_cli::keygen::{run_keygen, KeygenArgs};
use lic_cli::sign::{run_sign, SignArgs};

/// License issuance toolchain: key generation, payload signing, and
/// offline issuance.
#[derive(Parser, Debug)]
#[command(name = "licctl", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 keypair as PKCS#8/SPKI PEM files.
    Keygen(KeygenArgs),

    /// Sign a license payload JSON document.
    Sign(SignArgs),

    /// Issue a license from a YAML catalog without the HTTP service.
    Issue(IssueArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so that stdout stays a clean license document.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Keygen(args) => run_keygen(args),
        Commands::Sign(args) => run_sign(args),
        Commands::Issue(args) => run_issue(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_keygen_defaults() {
        let cli = Cli::try_parse_from(["licctl", "keygen", "--key-id", "main-v1"]).unwrap();
        match cli.command {
            Commands::Keygen(args) => {
                assert_eq!(args.key_id, "main-v1");
                assert_eq!(args.output_dir, std::path::PathBuf::from("keys"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_sign_with_overrides() {
        let cli = Cli::try_parse_from([
            "licctl", "-vv", "sign", "--key", "k.pem", "--catalog", "c.yaml", "--key-id", "main-v2",
            "--meta-version", "2", "payload.json", "--out", "license.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Sign(args) => {
                assert_eq!(args.key_id.as_deref(), Some("main-v2"));
                assert_eq!(args.meta_version, Some(2));
                assert_eq!(args.catalog, std::path::PathBuf::from("c.yaml"));
                assert_eq!(args.file, std::path::PathBuf::from("payload.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_issue_requires_issuer() {
        let base = [
            "licctl", "issue", "--catalog", "c.yaml", "--key", "k.pem", "--customer", "cust-1001",
            "--product", "prod-data-pipeline", "--edition", "ed-enterprise", "--license-type",
            "trial", "--valid-from", "2025-01-01T00:00:00Z", "--valid-until",
            "2025-02-01T00:00:00Z",
        ];
        assert!(Cli::try_parse_from(base).is_err());

        let mut full: Vec<&str> = base.to_vec();
        full.extend(["--issuer-id", "42", "--issuer-username", "alice"]);
        let cli = Cli::try_parse_from(full).unwrap();
        assert!(matches!(cli.command, Commands::Issue(_)));
    }

    #[test]
    fn sign_requires_file() {
        assert!(Cli::try_parse_from(["licctl", "sign", "--key", "k.pem", "--catalog", "c.yaml"]).is_err());
    }

    #[test]
    fn sign_requires_catalog() {
        assert!(Cli::try_parse_from(["licctl", "sign", "--key", "k.pem", "payload.json"]).is_err());
    }
}
