//! Retry utilities for HTTP requests.

// crates.io
use http::StatusCode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time;
// self
use crate::_prelude::*;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
/// Default per-attempt timeout when the caller supplies no abort signal.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [408, 500, 502, 503, 504];

/// Retry configuration for outbound HTTP requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
	/// Total attempts permitted, including the initial request.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Base delay multiplied by `2^(attempt - 1)` before jitter is applied.
	#[serde(default = "default_base_delay")]
	pub base_delay: Duration,
	/// Response statuses that trigger another attempt.
	#[serde(default = "default_retryable_status_codes")]
	pub retryable_status_codes: Vec<u16>,
	/// Timeout applied to each attempt when no abort signal is supplied.
	#[serde(default = "default_attempt_timeout")]
	pub timeout: Duration,
}
impl RetryConfig {
	/// Validate invariants for retry configuration.
	pub fn validate(&self) -> Result<()> {
		if self.max_attempts == 0 {
			return Err(Error::Validation {
				field: "retry.max_attempts",
				reason: "Must be at least 1.".into(),
			});
		}
		if self.timeout < Duration::from_millis(100) {
			return Err(Error::Validation {
				field: "retry.timeout",
				reason: "Must be at least 100 ms.".into(),
			});
		}
		if let Some(code) =
			self.retryable_status_codes.iter().find(|code| StatusCode::from_u16(**code).is_err())
		{
			return Err(Error::Validation {
				field: "retry.retryable_status_codes",
				reason: format!("{code} is not a valid HTTP status code."),
			});
		}

		Ok(())
	}

	/// Override the retryable status set.
	pub fn with_retryable_status_codes<I>(mut self, codes: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.retryable_status_codes = codes.into_iter().collect();

		self
	}

	/// Override the base backoff delay.
	pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
		self.base_delay = base_delay;

		self
	}

	/// Override the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Whether the status should be retried.
	pub fn is_retryable(&self, status: StatusCode) -> bool {
		self.retryable_status_codes.contains(&status.as_u16())
	}

	/// Upper bound of the delay after the given 1-based attempt: `base * 2^(attempt - 1)`.
	pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(32);
		let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);

		Duration::from_millis(base.saturating_mul(1_u64 << exponent))
	}

	/// Full-jitter backoff: a whole number of milliseconds drawn from `[0, ceiling)`.
	pub fn compute_backoff(&self, attempt: u32) -> Duration {
		let ceiling = self.backoff_ceiling(attempt).as_millis() as f64;
		let factor: f64 = rand::rng().random();

		Duration::from_millis((factor * ceiling).floor() as u64)
	}
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			base_delay: DEFAULT_BASE_DELAY,
			retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
			timeout: DEFAULT_ATTEMPT_TIMEOUT,
		}
	}
}

/// Tracks attempts and backoff progression for a single request.
#[derive(Debug)]
pub struct RetryExecutor<'a> {
	config: &'a RetryConfig,
	attempts_used: u32,
}
impl<'a> RetryExecutor<'a> {
	/// Create a new executor respecting the supplied configuration.
	pub fn new(config: &'a RetryConfig) -> Self {
		Self { config, attempts_used: 0 }
	}

	/// Record the start of an attempt, returning its 1-based number.
	pub fn begin_attempt(&mut self) -> u32 {
		self.attempts_used = self.attempts_used.saturating_add(1);

		self.attempts_used
	}

	/// Number of attempts started so far.
	pub fn attempts_used(&self) -> u32 {
		self.attempts_used
	}

	/// Whether another attempt is permitted.
	pub fn can_retry(&self) -> bool {
		self.attempts_used < self.config.max_attempts
	}

	/// Compute the delay before the next attempt, or `None` once attempts are exhausted.
	pub fn next_backoff(&self) -> Option<Duration> {
		if !self.can_retry() {
			tracing::debug!(attempt = self.attempts_used, "retry budget exhausted");

			return None;
		}

		let delay = self.config.compute_backoff(self.attempts_used);

		tracing::debug!(attempt = self.attempts_used, ?delay, "retry backoff computed");

		Some(delay)
	}

	/// Sleep for the computed backoff window if retrying is permitted.
	pub async fn sleep_backoff(&self) {
		if let Some(delay) = self.next_backoff()
			&& !delay.is_zero()
		{
			time::sleep(delay).await;
		}
	}
}

fn default_max_attempts() -> u32 {
	DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay() -> Duration {
	DEFAULT_BASE_DELAY
}

fn default_retryable_status_codes() -> Vec<u16> {
	DEFAULT_RETRYABLE_STATUS_CODES.to_vec()
}

fn default_attempt_timeout() -> Duration {
	DEFAULT_ATTEMPT_TIMEOUT
}
