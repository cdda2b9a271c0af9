//! Reconnection with exponential backoff
//!
//! A dead transport cascades to the channel and every session on it; the
//! only way back is a fresh connect. [`Reconnector`] retries the full
//! stack (transport + channel + session + activation) with exponentially
//! growing, jittered delays.

use crate::config::{ClientConfig, IdentityToken};
use crate::crypto::AppIdentity;
use crate::error::Result;
use crate::session::Session;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Random fraction (0..=1) added on top of each delay.
    pub jitter: f64,
    /// None retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based), jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let jittered = if self.jitter > 0.0 {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..=self.jitter))
        } else {
            capped
        };
        Duration::from_millis(jittered.min(self.max_delay_ms as f64 * (1.0 + self.jitter)) as u64)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt >= max,
            None => false,
        }
    }
}

/// Rebuilds the full client stack after a connection loss.
pub struct Reconnector {
    config: ClientConfig,
    backoff: BackoffPolicy,
    app_identity: Option<AppIdentity>,
    server_certificate: Option<Vec<u8>>,
    user_identity_factory: Box<dyn Fn() -> IdentityToken + Send + Sync>,
}

impl Reconnector {
    /// A reconnector for anonymous sessions.
    pub fn new(config: ClientConfig, backoff: BackoffPolicy) -> Self {
        Self::with_identity(config, backoff, None, None, || IdentityToken::Anonymous)
    }

    /// Full control over certificates and the identity supplied per
    /// attempt (a factory, because tokens carry one-shot secrets).
    pub fn with_identity(
        config: ClientConfig,
        backoff: BackoffPolicy,
        app_identity: Option<AppIdentity>,
        server_certificate: Option<Vec<u8>>,
        user_identity_factory: impl Fn() -> IdentityToken + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            backoff,
            app_identity,
            server_certificate,
            user_identity_factory: Box::new(user_identity_factory),
        }
    }

    /// One connect attempt, no retries.
    pub async fn connect_once(&self) -> Result<Arc<Session>> {
        Session::connect(
            self.config.clone(),
            self.app_identity.clone(),
            self.server_certificate.clone(),
            (self.user_identity_factory)(),
        )
        .await
    }

    /// Retry until a session is up or the attempt budget is spent.
    pub async fn run(&self) -> Result<Arc<Session>> {
        let mut attempt = 0u32;
        loop {
            match self.connect_once().await {
                Ok(session) => {
                    debug!(attempt, "reconnected");
                    return Ok(session);
                }
                Err(err) => {
                    if self.backoff.exhausted(attempt + 1) {
                        warn!(attempt, error = %err, "reconnect attempts exhausted");
                        return Err(err);
                    }
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "connect failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

/// Retry an arbitrary async operation under a backoff schedule.
pub async fn retry_with_backoff<T, F, Fut>(backoff: &BackoffPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if backoff.exhausted(attempt + 1) {
                    return Err(err);
                }
                tokio::time::sleep(backoff.delay(attempt)).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
