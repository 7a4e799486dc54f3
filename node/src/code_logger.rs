//! # Periodic Code Logger
//!
//! Appends one line per run to a log file, on boundaries aligned to the
//! configured interval (every whole minute by default):
//!
//! ```text
//! 2023-11-14 22:13:20 - 2FA Code: 627910
//! 2023-11-14 22:14:00 - Seed file not found
//! 2023-11-14 22:15:00 - Error: storage error: permission denied
//! ```
//!
//! Timestamps are UTC. A failed run is logged as a line and the loop keeps
//! going; the only thing that stops it is the task being aborted.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use keyward_protocol::authenticator::{Clock, GeneratedCode};
use keyward_protocol::error::KeywardError;

use crate::api::ServiceAuthenticator;
use crate::metrics::SharedMetrics;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The log line for one run, newline included.
pub fn render_line(at: DateTime<Utc>, outcome: &Result<GeneratedCode, KeywardError>) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT);
    match outcome {
        Ok(generated) => format!("{stamp} - 2FA Code: {}\n", generated.code),
        Err(KeywardError::NotProvisioned) => format!("{stamp} - Seed file not found\n"),
        Err(e) => format!("{stamp} - Error: {e}\n"),
    }
}

/// Append `line` to `path`, creating the parent directory on demand.
pub fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

/// Time from `now_millis` to the next multiple of `interval`. Zero when
/// already on a boundary.
pub fn delay_until_boundary(now_millis: u64, interval: Duration) -> Duration {
    let period = (interval.as_millis() as u64).max(1);
    match now_millis % period {
        0 => Duration::ZERO,
        rem => Duration::from_millis(period - rem),
    }
}

pub struct CodeLogger {
    authenticator: Arc<ServiceAuthenticator>,
    path: PathBuf,
    interval: Duration,
    metrics: SharedMetrics,
}

impl CodeLogger {
    pub fn new(
        authenticator: Arc<ServiceAuthenticator>,
        path: impl Into<PathBuf>,
        interval: Duration,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            authenticator,
            path: path.into(),
            interval,
            metrics,
        }
    }

    /// One run. Returns the line that was appended.
    pub fn run_once(&self) -> std::io::Result<String> {
        let now = self.authenticator.clock().now_unix();
        let outcome = self.authenticator.code_at(now);

        let label = match &outcome {
            Ok(_) => "code",
            Err(KeywardError::NotProvisioned) => "not_provisioned",
            Err(_) => "error",
        };
        self.metrics.logger_runs_total.with_label_values(&[label]).inc();

        let at = i64::try_from(now)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);
        let line = render_line(at, &outcome);
        append_line(&self.path, &line)?;
        Ok(line)
    }

    /// Run forever on aligned boundaries.
    pub async fn run(self: Arc<Self>) {
        let now_millis = Utc::now().timestamp_millis().max(0) as u64;
        let first = delay_until_boundary(now_millis, self.interval);
        tracing::info!(
            path = %self.path.display(),
            interval_secs = self.interval.as_secs(),
            first_run_in_ms = first.as_millis() as u64,
            "code logger scheduled"
        );
        tokio::time::sleep(first).await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let logger = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || logger.run_once()).await {
                Ok(Ok(_)) => tracing::debug!("code logger run complete"),
                Ok(Err(e)) => {
                    tracing::error!(path = %self.path.display(), error = %e, "cannot append to code log")
                }
                Err(e) => tracing::error!(error = %e, "code logger task failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_protocol::authenticator::{Authenticator, FixedClock};
    use keyward_protocol::config::TotpPolicy;
    use keyward_protocol::secret::Secret;
    use keyward_protocol::store::{FileSecretStore, MemorySecretStore};

    use crate::api::{SharedClock, SharedStore};
    use crate::metrics::NodeMetrics;

    const T0: u64 = 1_700_000_000;
    const SEQUENTIAL: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn logger(store: SharedStore, path: &Path) -> CodeLogger {
        let clock: SharedClock = Arc::new(FixedClock(T0));
        CodeLogger::new(
            Arc::new(Authenticator::with_clock(store, TotpPolicy::default(), clock)),
            path,
            Duration::from_secs(60),
            Arc::new(NodeMetrics::new()),
        )
    }

    #[test]
    fn logs_code_with_utc_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cron/last_code.txt");
        let store = Arc::new(MemorySecretStore::with_secret(Secret::parse(SEQUENTIAL).unwrap()));

        let line = logger(store, &path).run_once().unwrap();
        assert_eq!(line, "2023-11-14 22:13:20 - 2FA Code: 627910\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), line);
    }

    #[test]
    fn logs_missing_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_code.txt");
        let line = logger(Arc::new(MemorySecretStore::new()), &path)
            .run_once()
            .unwrap();
        assert_eq!(line, "2023-11-14 22:13:20 - Seed file not found\n");
    }

    #[test]
    fn logs_other_failures_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.txt");
        fs::write(&seed, "zz").unwrap();
        let path = dir.path().join("last_code.txt");

        let line = logger(Arc::new(FileSecretStore::new(&seed)), &path)
            .run_once()
            .unwrap();
        assert!(line.starts_with("2023-11-14 22:13:20 - Error: "), "{line}");
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_code.txt");
        let store = Arc::new(MemorySecretStore::with_secret(Secret::parse(SEQUENTIAL).unwrap()));
        let logger = logger(store, &path);

        logger.run_once().unwrap();
        logger.run_once().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn boundary_alignment() {
        let minute = Duration::from_secs(60);
        assert_eq!(delay_until_boundary(60_000, minute), Duration::ZERO);
        assert_eq!(delay_until_boundary(60_001, minute), Duration::from_millis(59_999));
        assert_eq!(delay_until_boundary(119_500, minute), Duration::from_millis(500));
        assert_eq!(
            delay_until_boundary(7_000, Duration::from_secs(15)),
            Duration::from_secs(8)
        );
    }
}
