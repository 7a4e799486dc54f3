//! # CLI Interface
//!
//! Defines the command-line argument structure for `keyward-node` using
//! `clap` derive. Every option can also be supplied through a `KEYWARD_*`
//! environment variable, which is how the container image configures it.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use keyward_protocol::config::{DEFAULT_KEY_BITS, DEFAULT_VERIFY_WINDOW};

use crate::logging::LogFormat;
use crate::seed_client::MAX_ATTEMPTS;

/// Keyward authenticator service.
///
/// Receives an RSA-sealed secret, persists it, and serves TOTP codes for it
/// over HTTP. Also ships the one-shot tools around that flow: requesting a
/// sealed seed, decrypting it offline, and producing a signed commit proof.
#[derive(Parser, Debug)]
#[command(
    name = "keyward-node",
    about = "Keyward authenticator service",
    version,
    propagate_version = true
)]
pub struct KeywardCli {
    /// Log output format.
    #[arg(long, global = true, env = "KEYWARD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API and run the periodic code logger.
    Serve(ServeArgs),
    /// Decrypt a sealed seed file and persist the secret.
    DecryptSeed(DecryptSeedArgs),
    /// Sign the latest commit id and seal the signature for a recipient.
    Proof(ProofArgs),
    /// Ask the provisioning endpoint for a sealed seed.
    RequestSeed(RequestSeedArgs),
    /// Generate an RSA key pair in PEM form.
    GenerateKeys(GenerateKeysArgs),
    /// Print the current code for the persisted secret.
    Code(CodeArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address the HTTP API listens on.
    #[arg(long, env = "KEYWARD_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Where the decrypted secret is persisted.
    #[arg(long, env = "KEYWARD_SEED_PATH", default_value = "data/seed.txt")]
    pub seed_path: PathBuf,

    /// PEM private key used to unseal delivered secrets.
    #[arg(long, env = "KEYWARD_PRIVATE_KEY", default_value = "student_private.pem")]
    pub private_key: PathBuf,

    /// File the periodic logger appends codes to.
    #[arg(long, env = "KEYWARD_CODE_LOG", default_value = "cron/last_code.txt")]
    pub code_log: PathBuf,

    /// Seconds between logger runs. Runs are aligned to multiples of this.
    #[arg(long, env = "KEYWARD_LOG_INTERVAL", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub log_interval: u64,

    /// Accepted clock drift, in 30-second steps either side.
    #[arg(long, env = "KEYWARD_VERIFY_WINDOW", default_value_t = DEFAULT_VERIFY_WINDOW,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    pub verify_window: u32,

    /// Do not start the periodic logger.
    #[arg(long, env = "KEYWARD_NO_LOGGER")]
    pub no_logger: bool,
}

/// Arguments for the `decrypt-seed` subcommand.
#[derive(Parser, Debug)]
pub struct DecryptSeedArgs {
    /// File holding the base64 sealed seed.
    #[arg(long, short = 'i', env = "KEYWARD_ENCRYPTED_SEED", default_value = "encrypted_seed.txt")]
    pub input: PathBuf,

    /// PEM private key to unseal with.
    #[arg(long, env = "KEYWARD_PRIVATE_KEY", default_value = "student_private.pem")]
    pub private_key: PathBuf,

    /// Where to persist the secret.
    #[arg(long, env = "KEYWARD_SEED_PATH", default_value = "data/seed.txt")]
    pub seed_path: PathBuf,
}

/// Arguments for the `proof` subcommand.
#[derive(Parser, Debug)]
pub struct ProofArgs {
    /// Commit id to attest. Defaults to `git log -1 --format=%H`.
    #[arg(long, env = "KEYWARD_COMMIT")]
    pub commit: Option<String>,

    /// Repository to read the commit from when `--commit` is omitted.
    #[arg(long, env = "KEYWARD_REPO", default_value = ".")]
    pub repo: PathBuf,

    /// PEM private key that signs the commit id.
    #[arg(long, env = "KEYWARD_PRIVATE_KEY", default_value = "student_private.pem")]
    pub private_key: PathBuf,

    /// PEM public key of the party the signature is sealed for.
    #[arg(long, env = "KEYWARD_RECIPIENT_KEY", default_value = "instructor_public.pem")]
    pub recipient_key: PathBuf,
}

/// Arguments for the `request-seed` subcommand.
#[derive(Parser, Debug)]
pub struct RequestSeedArgs {
    /// Provisioning endpoint URL.
    #[arg(long, env = "KEYWARD_SEED_ENDPOINT")]
    pub endpoint: String,

    /// Identifier the provisioning service knows us by.
    #[arg(long, env = "KEYWARD_STUDENT_ID")]
    pub student_id: String,

    /// Repository URL registered with the provisioning service.
    #[arg(long, env = "KEYWARD_REPO_URL")]
    pub repo_url: String,

    /// PEM public key the seed will be sealed to.
    #[arg(long, env = "KEYWARD_PUBLIC_KEY", default_value = "student_public.pem")]
    pub public_key: PathBuf,

    /// Where to write the sealed seed.
    #[arg(long, short = 'o', env = "KEYWARD_ENCRYPTED_SEED", default_value = "encrypted_seed.txt")]
    pub output: PathBuf,

    /// Total attempts before giving up on transient failures.
    #[arg(long, env = "KEYWARD_SEED_ATTEMPTS", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_ATTEMPTS)))]
    pub attempts: u32,

    /// First retry delay in milliseconds; doubles on each retry.
    #[arg(long, env = "KEYWARD_SEED_BACKOFF_MS", default_value_t = 1000)]
    pub backoff_ms: u64,
}

/// Arguments for the `generate-keys` subcommand.
#[derive(Parser, Debug)]
pub struct GenerateKeysArgs {
    /// Modulus size in bits.
    #[arg(long, env = "KEYWARD_KEY_BITS", default_value_t = DEFAULT_KEY_BITS)]
    pub bits: usize,

    /// Output path for the private key (PKCS#8 PEM, mode 0600).
    #[arg(long, env = "KEYWARD_PRIVATE_KEY_OUT", default_value = "student_private.pem")]
    pub private_out: PathBuf,

    /// Output path for the public key (SPKI PEM).
    #[arg(long, env = "KEYWARD_PUBLIC_KEY_OUT", default_value = "student_public.pem")]
    pub public_out: PathBuf,

    /// Overwrite existing files.
    #[arg(long, env = "KEYWARD_FORCE")]
    pub force: bool,
}

/// Arguments for the `code` subcommand.
#[derive(Parser, Debug)]
pub struct CodeArgs {
    /// Where the secret is persisted.
    #[arg(long, env = "KEYWARD_SEED_PATH", default_value = "data/seed.txt")]
    pub seed_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        KeywardCli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = KeywardCli::try_parse_from(["keyward-node", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.log_interval, 60);
        assert_eq!(args.verify_window, DEFAULT_VERIFY_WINDOW);
        assert_eq!(args.bind.port(), 8080);
        assert!(!args.no_logger);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = KeywardCli::try_parse_from(["keyward-node", "serve", "--log-interval", "0"]);
        assert!(err.is_err());
    }

    #[test]
    fn request_seed_requires_endpoint() {
        let parsed = KeywardCli::try_parse_from([
            "keyward-node",
            "request-seed",
            "--student-id",
            "s1",
            "--repo-url",
            "https://example.com/repo",
        ]);
        // The environment may supply the endpoint on a developer machine.
        if std::env::var_os("KEYWARD_SEED_ENDPOINT").is_none() {
            assert!(parsed.is_err());
        }
    }

    #[test]
    fn every_option_has_env_override() {
        let cli = KeywardCli::command();
        for sub in cli.get_subcommands() {
            for arg in sub.get_arguments() {
                let id = arg.get_id().as_str();
                if id == "help" || id == "version" {
                    continue;
                }
                let env = arg
                    .get_env()
                    .unwrap_or_else(|| panic!("{} --{id} has no env override", sub.get_name()));
                assert!(
                    env.to_string_lossy().starts_with("KEYWARD_"),
                    "{} --{id}: {env:?}",
                    sub.get_name()
                );
            }
        }
    }

    #[test]
    fn log_format_is_global() {
        let cli = KeywardCli::try_parse_from(["keyward-node", "version", "--log-format", "json"])
            .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
