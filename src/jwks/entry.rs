//! Cached JWKS documents and key selection.

// crates.io
use jsonwebtoken::{
	Algorithm,
	jwk::{AlgorithmParameters, Jwk, JwkSet, PublicKeyUse},
};
use serde::Deserialize;
// self
use crate::_prelude::*;

/// JWKS document cached for one endpoint.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	jwks: Arc<JwkSet>,
	fetched_at: DateTime<Utc>,
	expires_at: Instant,
}
impl CacheEntry {
	/// Cache `jwks` for `ttl` starting at `now`.
	pub fn new(jwks: Arc<JwkSet>, ttl: Duration, now: Instant) -> Self {
		Self { jwks, fetched_at: Utc::now(), expires_at: now + ttl }
	}

	/// Whether the entry may still be served; valid strictly before `expires_at`.
	pub fn is_fresh(&self, now: Instant) -> bool {
		now < self.expires_at
	}

	/// Cached key set.
	pub fn jwks(&self) -> Arc<JwkSet> {
		self.jwks.clone()
	}

	/// Wall-clock time of the fetch that produced this entry.
	pub fn fetched_at(&self) -> DateTime<Utc> {
		self.fetched_at
	}

	/// Monotonic expiry instant.
	pub fn expires_at(&self) -> Instant {
		self.expires_at
	}
}

/// Pick the signing key for `kid` that can verify `algorithm`.
pub fn select_key<'a>(jwks: &'a JwkSet, kid: &str, algorithm: Algorithm) -> Option<&'a Jwk> {
	jwks.keys.iter().find(|jwk| {
		jwk.common.key_id.as_deref() == Some(kid)
			&& matches!(jwk.common.public_key_use, None | Some(PublicKeyUse::Signature))
			&& declared_algorithm_matches(jwk, algorithm)
			&& family_matches(&jwk.algorithm, algorithm)
	})
}

/// Parse a JWKS body, skipping entries this crate cannot represent.
///
/// Fails only when the document itself is malformed, e.g. `keys` is missing or not an array.
pub fn parse_key_set(body: &[u8]) -> std::result::Result<JwkSet, String> {
	#[derive(Deserialize)]
	struct RawKeySet {
		keys: Vec<serde_json::Value>,
	}

	let raw: RawKeySet =
		serde_json::from_slice(body).map_err(|err| format!("Malformed JWKS document: {err}."))?;
	let keys = raw
		.keys
		.into_iter()
		.filter_map(|value| match serde_json::from_value::<Jwk>(value) {
			Ok(jwk) => Some(jwk),
			Err(err) => {
				tracing::debug!(error = %err, "skipping unsupported jwk entry");

				None
			},
		})
		.collect();

	Ok(JwkSet { keys })
}

fn declared_algorithm_matches(jwk: &Jwk, algorithm: Algorithm) -> bool {
	match &jwk.common.key_algorithm {
		Some(declared) => format!("{declared:?}") == format!("{algorithm:?}"),
		None => true,
	}
}

fn family_matches(parameters: &AlgorithmParameters, algorithm: Algorithm) -> bool {
	match parameters {
		AlgorithmParameters::RSA(_) => matches!(
			algorithm,
			Algorithm::RS256
				| Algorithm::RS384
				| Algorithm::RS512
				| Algorithm::PS256
				| Algorithm::PS384
				| Algorithm::PS512
		),
		AlgorithmParameters::EllipticCurve(_) =>
			matches!(algorithm, Algorithm::ES256 | Algorithm::ES384),
		AlgorithmParameters::OctetKeyPair(_) => matches!(algorithm, Algorithm::EdDSA),
		// Shared secrets are never accepted from a published key set.
		_ => false,
	}
}
