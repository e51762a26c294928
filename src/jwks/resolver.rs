//! JWKS resolver resolving signing keys through a time-bounded cache.

// std
use std::collections::HashMap;
// crates.io
use http::{HeaderValue, header::ACCEPT};
use jsonwebtoken::{Algorithm, DecodingKey, jwk::JwkSet};
use tokio::sync::RwLock;
use url::Url;
// self
use crate::{
	_prelude::*,
	http::{
		client::{RequestOptions, RetryingClient},
		retry::RetryConfig,
	},
	jwks::entry::{self, CacheEntry},
	metrics,
};

/// Size guard for JWKS documents (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1_048_576;

/// Resolves signing keys by `kid`, caching each endpoint's key set for the requested duration.
///
/// Constructed once per process and shared by every verification. Concurrent misses may fetch
/// the same document twice; key material for a `kid` does not change within its validity
/// window, so the last writer wins without harm.
#[derive(Debug)]
pub struct JwksResolver {
	client: RetryingClient,
	retry: Option<RetryConfig>,
	entries: RwLock<HashMap<Url, CacheEntry>>,
	max_response_bytes: usize,
}
impl JwksResolver {
	/// Create a resolver bound to the given transport.
	pub fn new(client: RetryingClient) -> Self {
		Self {
			client,
			retry: None,
			entries: RwLock::new(HashMap::new()),
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
		}
	}

	/// Use a dedicated retry configuration for JWKS fetches.
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = Some(retry);

		self
	}

	/// Override the JWKS size guard.
	pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
		self.max_response_bytes = max_response_bytes;

		self
	}

	/// Resolve the key for `kid` usable with `algorithm`.
	///
	/// A cached key set is served while younger than `cache_duration`; otherwise the endpoint is
	/// fetched again. A missing `kid` does not trigger a refetch.
	#[tracing::instrument(skip(self, jwks_uri, cache_duration, algorithm), fields(jwks_uri = %jwks_uri))]
	pub async fn resolve(
		&self,
		jwks_uri: &Url,
		kid: &str,
		cache_duration: Duration,
		algorithm: Algorithm,
	) -> Result<DecodingKey> {
		let now = Instant::now();
		let cached = {
			let entries = self.entries.read().await;

			entries.get(jwks_uri).filter(|entry| entry.is_fresh(now)).map(CacheEntry::jwks)
		};
		let jwks = match cached {
			Some(jwks) => {
				tracing::debug!("jwks cache hit");

				metrics::record_jwks_cache(true);

				jwks
			},
			None => {
				tracing::debug!("jwks cache miss; fetching");

				metrics::record_jwks_cache(false);

				self.refresh(jwks_uri, cache_duration).await?
			},
		};
		let jwk = entry::select_key(&jwks, kid, algorithm)
			.ok_or_else(|| Error::KeyNotFound { kid: kid.to_owned(), algorithm })?;

		Ok(DecodingKey::from_jwk(jwk)?)
	}

	/// Number of endpoints currently holding a fresh key set.
	pub async fn fresh_entries(&self) -> usize {
		let now = Instant::now();

		self.entries.read().await.values().filter(|entry| entry.is_fresh(now)).count()
	}

	async fn refresh(&self, jwks_uri: &Url, cache_duration: Duration) -> Result<Arc<JwkSet>> {
		let mut options = RequestOptions::get();

		options.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		let started = Instant::now();
		let response = match self.client.send(jwks_uri, options, self.retry.as_ref(), None).await {
			Ok(response) => response,
			Err(err) => {
				metrics::record_jwks_fetch("error", started.elapsed());

				return Err(err);
			},
		};
		let status = response.status();

		if !status.is_success() {
			metrics::record_jwks_fetch("error", started.elapsed());

			return Err(Error::JwksFetch {
				url: jwks_uri.clone(),
				reason: format!("Upstream returned status {status}."),
			});
		}

		let body = match response.bytes().await {
			Ok(body) => body,
			Err(err) => {
				metrics::record_jwks_fetch("error", started.elapsed());

				return Err(Error::transport(err, jwks_uri));
			},
		};

		if body.len() > self.max_response_bytes {
			metrics::record_jwks_fetch("error", started.elapsed());

			return Err(Error::JwksFetch {
				url: jwks_uri.clone(),
				reason: format!(
					"Response size {size} bytes exceeds the guard of {limit} bytes.",
					size = body.len(),
					limit = self.max_response_bytes
				),
			});
		}

		let jwks = match entry::parse_key_set(&body) {
			Ok(jwks) => Arc::new(jwks),
			Err(reason) => {
				metrics::record_jwks_fetch("error", started.elapsed());

				return Err(Error::JwksFetch { url: jwks_uri.clone(), reason });
			},
		};

		metrics::record_jwks_fetch("success", started.elapsed());

		tracing::debug!(
			status = %status,
			keys = jwks.keys.len(),
			elapsed = ?started.elapsed(),
			"jwks fetch complete"
		);

		{
			let mut entries = self.entries.write().await;

			entries
				.insert(jwks_uri.clone(), CacheEntry::new(jwks.clone(), cache_duration, Instant::now()));
		}

		Ok(jwks)
	}
}
