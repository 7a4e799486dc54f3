//! # Authenticator Facade
//!
//! Wires the pure engines to a [`SecretStore`] and a [`Clock`], which is the
//! shape every caller (HTTP handlers, the periodic logger, the CLI) actually
//! wants:
//!
//! - [`Provisioner`]: unseal a delivered secret and persist it.
//! - [`Authenticator`]: generate / verify codes against whatever secret is
//!   persisted *right now*. The store is re-read on every call, so a fresh
//!   provisioning takes effect without restarting anything.
//!
//! Both are cheap to share behind an `Arc`; the engines are stateless and
//! the store handles its own synchronisation.

use serde::{Deserialize, Serialize};

use crate::config::TotpPolicy;
use crate::crypto::PrivateKey;
use crate::error::{KeywardError, Result};
use crate::store::SecretStore;
use crate::totp::{OtpCode, TimeStep, TotpEngine, UnixTime};
use crate::unseal::unseal;

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of "now" for the OTP engine.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> UnixTime;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> UnixTime {
        // Pre-1970 clocks get clamped to the epoch instead of wrapping.
        chrono::Utc::now().timestamp().max(0) as UnixTime
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_unix(&self) -> UnixTime {
        (**self).now_unix()
    }
}

/// A clock that always says the same thing. For tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub UnixTime);

impl Clock for FixedClock {
    fn now_unix(&self) -> UnixTime {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// Unseal-and-persist.
pub struct Provisioner<S> {
    store: S,
}

impl<S: SecretStore> Provisioner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Decrypt `sealed` with `key`, validate it, and replace the stored
    /// secret. Nothing is written unless every check passes.
    pub fn provision(&self, sealed: &str, key: &PrivateKey) -> Result<()> {
        if sealed.trim().is_empty() {
            return Err(KeywardError::MissingInput("encrypted_seed"));
        }
        let secret = unseal(sealed, key)?;
        self.store.store(&secret)?;
        tracing::info!("secret provisioned");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Code Generation & Verification
// ---------------------------------------------------------------------------

/// The current code and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: OtpCode,
    /// Whole seconds left in the current 30-second bucket, `0..30`.
    pub valid_for: u64,
}

/// OTP operations against the persisted secret.
pub struct Authenticator<S, C = SystemClock> {
    store: S,
    clock: C,
    engine: TotpEngine,
}

impl<S: SecretStore> Authenticator<S, SystemClock> {
    pub fn new(store: S, policy: TotpPolicy) -> Self {
        Self::with_clock(store, policy, SystemClock)
    }
}

impl<S: SecretStore, C: Clock> Authenticator<S, C> {
    pub fn with_clock(store: S, policy: TotpPolicy, clock: C) -> Self {
        Self {
            store,
            clock,
            engine: TotpEngine::new(policy),
        }
    }

    pub fn policy(&self) -> TotpPolicy {
        self.engine.policy()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Code for the current bucket.
    ///
    /// # Errors
    ///
    /// `NotProvisioned` if the store is empty; `Format` / `Storage` if it
    /// can't be read back.
    pub fn current_code(&self) -> Result<GeneratedCode> {
        self.code_at(self.clock.now_unix())
    }

    /// Code for the bucket containing `now`. Lets a caller stamp a log line
    /// and generate the code from the same instant.
    pub fn code_at(&self, now: UnixTime) -> Result<GeneratedCode> {
        let secret = self.store.load()?.ok_or(KeywardError::NotProvisioned)?;
        Ok(GeneratedCode {
            code: self.engine.generate(&secret, now),
            valid_for: TimeStep::remaining_seconds(now),
        })
    }

    /// Check a submitted code against the configured window.
    ///
    /// An empty code is `MissingInput`; anything else that isn't a valid
    /// code is just `Ok(false)`.
    pub fn verify(&self, submitted: &str) -> Result<bool> {
        if submitted.is_empty() {
            return Err(KeywardError::MissingInput("code"));
        }
        let secret = self.store.load()?.ok_or(KeywardError::NotProvisioned)?;
        let valid = self.engine.verify(&secret, submitted, self.clock.now_unix());
        tracing::debug!(valid, window = self.engine.policy().window, "code verified");
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;
    use crate::store::MemorySecretStore;
    use crate::unseal::seal_secret;
    use std::sync::Arc;

    const SEQUENTIAL: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const T0: UnixTime = 1_700_000_000;

    fn prover() -> PrivateKey {
        PrivateKey::from_pem(include_str!("../tests/fixtures/prover_private.pem")).unwrap()
    }

    fn authenticator(store: Arc<MemorySecretStore>) -> Authenticator<Arc<MemorySecretStore>, FixedClock> {
        Authenticator::with_clock(store, TotpPolicy::default(), FixedClock(T0))
    }

    #[test]
    fn test_not_provisioned() {
        let auth = authenticator(Arc::new(MemorySecretStore::new()));
        assert!(matches!(auth.current_code(), Err(KeywardError::NotProvisioned)));
        assert!(matches!(auth.verify("123456"), Err(KeywardError::NotProvisioned)));
    }

    #[test]
    fn test_missing_code_checked_first() {
        let auth = authenticator(Arc::new(MemorySecretStore::new()));
        assert!(matches!(auth.verify(""), Err(KeywardError::MissingInput("code"))));
    }

    #[test]
    fn test_generate_and_verify() {
        let store = Arc::new(MemorySecretStore::with_secret(Secret::parse(SEQUENTIAL).unwrap()));
        let auth = authenticator(store);

        let generated = auth.current_code().unwrap();
        assert_eq!(generated.code.as_str(), "627910");
        assert_eq!(generated.valid_for, 9);

        assert!(auth.verify("627910").unwrap());
        assert!(auth.verify("084624").unwrap()); // previous bucket
        assert!(!auth.verify("000000").unwrap());
        assert!(!auth.verify("abc").unwrap());
    }

    #[test]
    fn test_provision_then_generate() {
        let key = prover();
        let store = Arc::new(MemorySecretStore::new());
        let provisioner = Provisioner::new(Arc::clone(&store));
        let auth = authenticator(Arc::clone(&store));

        let secret = Secret::parse(SEQUENTIAL).unwrap();
        let sealed = seal_secret(&secret, &key.public_key()).unwrap();
        provisioner.provision(&sealed.to_base64(), &key).unwrap();

        assert_eq!(auth.current_code().unwrap().code.as_str(), "627910");
    }

    #[test]
    fn test_failed_provision_keeps_previous_secret() {
        let key = prover();
        let original = Secret::random();
        let store = Arc::new(MemorySecretStore::with_secret(original.clone()));
        let provisioner = Provisioner::new(Arc::clone(&store));

        assert!(provisioner.provision("AAAA", &key).is_err());
        assert!(matches!(
            provisioner.provision("  ", &key),
            Err(KeywardError::MissingInput("encrypted_seed"))
        ));
        assert_eq!(store.load().unwrap(), Some(original));
    }

    #[test]
    fn test_code_at_ignores_clock() {
        let store = Arc::new(MemorySecretStore::with_secret(Secret::parse(SEQUENTIAL).unwrap()));
        let auth = authenticator(store);
        let earlier = auth.code_at(T0 - 30).unwrap();
        assert_eq!(earlier.code.as_str(), "084624");
        assert_eq!(earlier.valid_for, 9);
    }

    #[test]
    fn test_shared_clock() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(T0));
        assert_eq!(clock.now_unix(), T0);
    }

    #[test]
    fn test_system_clock_is_after_2023() {
        assert!(SystemClock.now_unix() > T0);
    }
}
