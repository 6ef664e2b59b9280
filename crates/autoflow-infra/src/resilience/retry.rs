//! Retry policies
//!
//! Exponential backoff with jitter. Only failures the caller classifies as
//! retryable are attempted again; everything else is returned on first sight.

use autoflow_core::{AutomationError, RetrySettings};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 means no retries)
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add random jitter
    pub jitter: bool,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: settings.initial_delay(),
            max_delay: settings.max_delay(),
            multiplier: 2.0,
            jitter: true,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a config with no retries (for non-idempotent operations)
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier; values below 1.0 (or NaN) become 1.0
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set jitter factor, clamped to [0, 1]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }
}

/// Retry policy implementation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Build from the `retry` section of the automation configuration
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(RetryConfig::from(settings))
    }

    /// Single attempt, used for non-idempotent commands
    pub fn no_retry() -> Self {
        Self::new(RetryConfig::no_retry())
    }

    /// Fixed delay, no backoff and no jitter
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self::new(RetryConfig {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: false,
            jitter_factor: 0.0,
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calculate the delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        // Capped in float seconds; the product overflows `Duration` long
        // before the exponent runs out.
        let max_delay = self.config.max_delay;
        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let secs = self.config.initial_delay.as_secs_f64()
            * self.config.multiplier.max(1.0).powi(exponent);
        let delay = Duration::try_from_secs_f64(secs.min(max_delay.as_secs_f64()))
            .map_or(max_delay, |delay| delay.min(max_delay));

        if self.config.jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let factor = self.config.jitter_factor;
        if factor.is_nan() || factor <= 0.0 {
            return delay;
        }
        let jitter_range = delay.mul_f64(factor.min(1.0));
        if jitter_range.is_zero() {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(Duration::ZERO..jitter_range);
        if rng.gen_bool(0.5) {
            delay.saturating_add(jitter)
        } else {
            delay.saturating_sub(jitter)
        }
    }

    /// Check if we should retry for a given attempt
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }
}

/// Retry with a custom predicate
pub async fn retry_with<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= policy.config.max_retries || !should_retry(&e) {
                    return Err(e);
                }

                attempt += 1;
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    max_retries = policy.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Retry an automation call, re-attempting only transient failures
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AutomationError>>,
{
    retry_with(policy, operation, AutomationError::is_retryable).await
}
