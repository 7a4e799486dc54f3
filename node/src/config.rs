//! Service configuration assembled from CLI flags and `KEYWARD_*` variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use keyward_protocol::config::TotpPolicy;

use crate::cli::ServeArgs;

/// Everything `serve` needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub seed_path: PathBuf,
    pub private_key_path: PathBuf,
    pub code_log_path: PathBuf,
    /// `None` disables the periodic logger.
    pub log_interval: Option<Duration>,
    pub policy: TotpPolicy,
}

impl From<ServeArgs> for ServiceConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            bind: args.bind,
            seed_path: args.seed_path,
            private_key_path: args.private_key,
            code_log_path: args.code_log,
            log_interval: (!args.no_logger).then(|| Duration::from_secs(args.log_interval)),
            policy: TotpPolicy::with_window(args.verify_window),
        }
    }
}
