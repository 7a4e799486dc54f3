// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Keyward Node
//!
//! Entry point for the `keyward-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and dispatches to a subcommand:
//!
//! - `serve`         — HTTP API plus the periodic code logger
//! - `decrypt-seed`  — unseal a sealed seed file and persist it
//! - `proof`         — sign a commit id and seal it for a recipient
//! - `request-seed`  — fetch a sealed seed from the provisioning service
//! - `generate-keys` — create an RSA key pair
//! - `code`          — print the current code once
//! - `version`       — print build version information

mod api;
mod cli;
mod code_logger;
mod config;
mod logging;
mod metrics;
mod seed_client;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use keyward_protocol::authenticator::{Authenticator, Provisioner, SystemClock};
use keyward_protocol::config::TotpPolicy;
use keyward_protocol::crypto::{PrivateKey, PublicKey};
use keyward_protocol::proof::{CommitId, Proof};
use keyward_protocol::store::FileSecretStore;

use cli::{Commands, KeywardCli};
use code_logger::CodeLogger;
use config::ServiceConfig;
use metrics::NodeMetrics;
use seed_client::{SeedClient, SeedRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KeywardCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    match cli.command {
        Commands::Serve(args) => serve(ServiceConfig::from(args)).await,
        Commands::DecryptSeed(args) => decrypt_seed(args),
        Commands::Proof(args) => proof(args),
        Commands::RequestSeed(args) => request_seed(args).await,
        Commands::GenerateKeys(args) => generate_keys(args),
        Commands::Code(args) => print_code(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Serves the API and runs the code logger until a shutdown signal.
async fn serve(config: ServiceConfig) -> Result<()> {
    tracing::info!(
        bind = %config.bind,
        seed_path = %config.seed_path.display(),
        window = config.policy.window,
        "starting keyward-node"
    );

    let private_key = PrivateKey::from_pem_file(&config.private_key_path).with_context(|| {
        format!(
            "failed to load private key from {}",
            config.private_key_path.display()
        )
    })?;
    tracing::info!(bits = private_key.bits(), "private key loaded");

    let node_metrics = Arc::new(NodeMetrics::new());
    let store: api::SharedStore = Arc::new(FileSecretStore::new(&config.seed_path));
    let clock: api::SharedClock = Arc::new(SystemClock);

    let app_state = api::AppState::new(
        store,
        clock,
        private_key,
        config.policy,
        Arc::clone(&node_metrics),
    );

    // --- Code logger ---
    let logger_task = config.log_interval.map(|interval| {
        let logger = Arc::new(CodeLogger::new(
            Arc::clone(&app_state.authenticator),
            &config.code_log_path,
            interval,
            Arc::clone(&node_metrics),
        ));
        tokio::spawn(logger.run())
    });

    // --- API server ---
    let router = api::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind API listener on {}", config.bind))?;
    tracing::info!("API server listening on {}", config.bind);

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Some(task) = logger_task {
        task.abort();
    }
    tracing::info!("keyward-node stopped");
    Ok(())
}

/// Unseals a sealed seed file and persists the secret.
fn decrypt_seed(args: cli::DecryptSeedArgs) -> Result<()> {
    let sealed = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read sealed seed from {}", args.input.display()))?;
    let key = PrivateKey::from_pem_file(&args.private_key)
        .with_context(|| format!("failed to load private key from {}", args.private_key.display()))?;

    Provisioner::new(FileSecretStore::new(&args.seed_path))
        .provision(&sealed, &key)
        .context("failed to provision secret")?;

    println!("Seed decrypted and saved to {}", args.seed_path.display());
    Ok(())
}

/// Prints the two-line commit proof to stdout.
fn proof(args: cli::ProofArgs) -> Result<()> {
    let raw_commit = match args.commit {
        Some(commit) => commit,
        None => latest_commit(&args.repo)?,
    };
    let commit = CommitId::parse(&raw_commit).context("invalid commit id")?;

    let signer = PrivateKey::from_pem_file(&args.private_key)
        .with_context(|| format!("failed to load private key from {}", args.private_key.display()))?;
    let recipient = PublicKey::from_pem_file(&args.recipient_key).with_context(|| {
        format!(
            "failed to load recipient key from {}",
            args.recipient_key.display()
        )
    })?;

    let proof = Proof::generate(commit, &signer, &recipient).context("failed to generate proof")?;
    print!("{}", proof.render());
    Ok(())
}

/// `git log -1 --format=%H` in `repo`.
fn latest_commit(repo: &Path) -> Result<String> {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["log", "-1", "--format=%H"])
        .output()
        .context("failed to run git")?;
    if !output.status.success() {
        bail!(
            "git log failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8(output.stdout)
        .context("git output is not UTF-8")?
        .trim()
        .to_string())
}

/// Requests a sealed seed and writes it to the output file.
async fn request_seed(args: cli::RequestSeedArgs) -> Result<()> {
    let public_key = std::fs::read_to_string(&args.public_key)
        .with_context(|| format!("failed to read public key from {}", args.public_key.display()))?;
    // Fail here rather than after a round trip.
    PublicKey::from_pem(&public_key).context("public key is not a usable RSA key")?;

    let request = SeedRequest {
        student_id: args.student_id,
        github_repo_url: args.repo_url,
        public_key,
    };
    let seed = SeedClient::new(args.endpoint)?
        .max_attempts(args.attempts)
        .base_delay(std::time::Duration::from_millis(args.backoff_ms))
        .request(&request)
        .await?;

    std::fs::write(&args.output, &seed)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(bytes = seed.len(), "sealed seed received");
    println!("Encrypted seed saved to {}", args.output.display());
    Ok(())
}

/// Generates a key pair. The private key file is owner-only on Unix.
fn generate_keys(args: cli::GenerateKeysArgs) -> Result<()> {
    if !args.force {
        for path in [&args.private_out, &args.public_out] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    tracing::info!(bits = args.bits, "generating RSA key pair");
    let private_key = PrivateKey::generate(args.bits).context("key generation failed")?;
    let private_pem = private_key.to_pem().context("failed to encode private key")?;
    let public_pem = private_key
        .public_key()
        .to_pem()
        .context("failed to encode public key")?;

    write_owner_only(&args.private_out, private_pem.as_bytes())
        .with_context(|| format!("failed to write {}", args.private_out.display()))?;
    std::fs::write(&args.public_out, public_pem)
        .with_context(|| format!("failed to write {}", args.public_out.display()))?;

    println!("Private key : {}", args.private_out.display());
    println!("Public key  : {}", args.public_out.display());
    Ok(())
}

/// Writes `bytes` to a file that is created 0600 on Unix, so the key is
/// never readable by others, even briefly.
fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)
}

/// Prints the current code for the persisted secret.
fn print_code(args: cli::CodeArgs) -> Result<()> {
    let auth = Authenticator::new(FileSecretStore::new(&args.seed_path), TotpPolicy::default());
    let generated = auth.current_code().with_context(|| {
        format!("no usable secret at {}", args.seed_path.display())
    })?;
    println!("{} (valid for {}s)", generated.code, generated.valid_for);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("keyward-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
