//! Outbound HTTP client with bounded retries and per-attempt cancellation.

// std
use std::future::Future;
// crates.io
use http::{HeaderMap, Method};
use reqwest::{Client, Response, redirect::Policy};
use tokio::time;
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use crate::{
	_prelude::*,
	http::retry::{RetryConfig, RetryExecutor},
	metrics,
};

/// Request shape replayed on every attempt.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	/// HTTP method.
	pub method: Method,
	/// Headers sent with each attempt.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl RequestOptions {
	/// Plain `GET` request.
	pub fn get() -> Self {
		Self { method: Method::GET, headers: HeaderMap::new(), body: None }
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self::get()
	}
}

/// Caller-supplied signal bounding every attempt of a request.
///
/// Without a signal each attempt receives a fresh timeout from [`RetryConfig::timeout`]. The
/// attempt's bound also covers reading the response body; under a cancellation token the body
/// read falls back to [`RetryConfig::timeout`].
#[derive(Clone, Debug)]
pub enum AbortSignal {
	/// Abort when the token is cancelled.
	Cancellation(CancellationToken),
	/// Abort once the instant passes; shared across attempts.
	Deadline(Instant),
}
impl AbortSignal {
	/// Deadline signal expiring `timeout` from now.
	pub fn timeout(timeout: Duration) -> Self {
		Self::Deadline(Instant::now() + timeout)
	}
}

/// HTTP client that retries transient failures with full-jitter exponential backoff.
#[derive(Clone, Debug)]
pub struct RetryingClient {
	client: Client,
	defaults: RetryConfig,
}
impl RetryingClient {
	/// Build a client with the default reqwest configuration.
	pub fn new(defaults: RetryConfig) -> Result<Self> {
		defaults.validate()?;

		let client = Client::builder()
			.redirect(Policy::limited(3))
			.user_agent(format!("shared-signal-receiver/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Ok(Self { client, defaults })
	}

	/// Build a client around an existing reqwest client (primarily for tests).
	pub fn with_client(client: Client, defaults: RetryConfig) -> Self {
		Self { client, defaults }
	}

	/// Retry configuration applied when `send` receives none.
	pub fn defaults(&self) -> &RetryConfig {
		&self.defaults
	}

	/// Send a request, retrying retryable statuses and transport errors.
	///
	/// Non-retryable statuses are returned as-is for the caller to interpret. Timeouts and
	/// aborts are returned immediately without further attempts.
	pub async fn send(
		&self,
		url: &Url,
		options: RequestOptions,
		retry: Option<&RetryConfig>,
		signal: Option<AbortSignal>,
	) -> Result<Response> {
		let config = retry.unwrap_or(&self.defaults);
		let mut executor = RetryExecutor::new(config);

		loop {
			let attempt = executor.begin_attempt();
			let outcome = self.attempt(url, &options, config, signal.as_ref()).await;

			match outcome {
				Ok(response) if config.is_retryable(response.status()) && executor.can_retry() => {
					tracing::debug!(%url, attempt, status = %response.status(), "retrying status");

					metrics::record_http_retry("status");
				},
				Ok(response) => return Ok(response),
				Err(err) if err.is_timeout() => {
					tracing::warn!(%url, attempt, error = %err, "request timed out");

					return Err(err);
				},
				Err(err) if executor.can_retry() => {
					tracing::warn!(%url, attempt, error = %err, "request failed; retrying");

					metrics::record_http_retry("transport");
				},
				Err(err) => return Err(err),
			}

			executor.sleep_backoff().await;
		}
	}

	async fn attempt(
		&self,
		url: &Url,
		options: &RequestOptions,
		config: &RetryConfig,
		signal: Option<&AbortSignal>,
	) -> Result<Response> {
		let mut builder = self.client.request(options.method.clone(), url.clone());

		for (name, value) in options.headers.iter() {
			builder = builder.header(name, value);
		}
		if let Some(body) = &options.body {
			builder = builder.body(body.clone());
		}

		// reqwest's request timeout also bounds the body read that follows `send`.
		let attempt_timeout = match signal {
			Some(AbortSignal::Deadline(deadline)) =>
				deadline.saturating_duration_since(Instant::now()),
			_ => config.timeout,
		};
		let request = builder.timeout(attempt_timeout).send();

		match signal {
			Some(AbortSignal::Cancellation(token)) => tokio::select! {
				biased;
				_ = token.cancelled() => Err(Error::Aborted { url: url.clone() }),
				response = request => response.map_err(|err| Error::transport(err, url)),
			},
			Some(AbortSignal::Deadline(deadline)) =>
				bounded(url, time::timeout_at(*deadline, request)).await,
			None => bounded(url, time::timeout(config.timeout, request)).await,
		}
	}
}

async fn bounded<F>(url: &Url, request: F) -> Result<Response>
where
	F: Future<Output = std::result::Result<reqwest::Result<Response>, time::error::Elapsed>>,
{
	match request.await {
		Ok(response) => response.map_err(|err| Error::transport(err, url)),
		Err(_) => Err(Error::Timeout { url: url.clone() }),
	}
}
