//! Security Event Token signature and claim verification.

// crates.io
use jsonwebtoken::{Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	config::SharedSignalsConfig,
	jwks::resolver::JwksResolver,
	taxonomy::SetTokenError,
};

/// Required `typ` header value for SETs; an `application/` prefix is optional.
pub const SET_TYPE: &str = "secevent+jwt";
/// Clock skew tolerated for `iat` and `exp`, in seconds.
pub const DEFAULT_LEEWAY_SECS: u64 = 60;
/// Largest accepted clock skew, in seconds.
pub const MAX_LEEWAY_SECS: u64 = 86_400;

const MEDIA_TYPE_PREFIX: &str = "application/";

/// `aud` claim: a single audience or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	#[allow(missing_docs)]
	Single(String),
	#[allow(missing_docs)]
	Many(Vec<String>),
}
impl Audience {
	/// Whether `audience` is named by the claim.
	pub fn contains(&self, audience: &str) -> bool {
		match self {
			Self::Single(value) => value == audience,
			Self::Many(values) => values.iter().any(|value| value == audience),
		}
	}
}

/// Claims of a SET whose signature and claims were verified.
///
/// Exists for the duration of one request and is never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayload {
	/// Issuer.
	pub iss: String,
	/// Audience.
	pub aud: Audience,
	/// Issued-at, seconds since the epoch.
	pub iat: i64,
	/// Token identifier; the correlation id of every log line for this request.
	pub jti: String,
	/// Optional expiry, seconds since the epoch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<i64>,
	/// Events keyed by event-type URI.
	pub events: Map<String, Value>,
}
impl VerifiedPayload {
	/// `iat` as a timestamp.
	pub fn issued_at(&self) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp(self.iat, 0)
	}
}

/// Verifies compact SETs against keys from an injected [`JwksResolver`].
///
/// Header problems are reported precisely (`invalid_request`, `invalid_key`); every key
/// resolution, signature, and claim failure is reported as `authentication_failed` so callers
/// cannot tell which check rejected the token.
#[derive(Clone, Debug)]
pub struct SetVerifier {
	resolver: Arc<JwksResolver>,
	leeway: u64,
}
impl SetVerifier {
	/// Create a verifier resolving keys through `resolver`.
	pub fn new(resolver: Arc<JwksResolver>) -> Self {
		Self { resolver, leeway: DEFAULT_LEEWAY_SECS }
	}

	/// Override the tolerated clock skew, capped at [`MAX_LEEWAY_SECS`].
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway.as_secs().min(MAX_LEEWAY_SECS);

		self
	}

	/// Resolver shared with other verifiers.
	pub fn resolver(&self) -> &Arc<JwksResolver> {
		&self.resolver
	}

	/// Verify `token` and return its claims.
	#[tracing::instrument(skip_all, fields(kid = tracing::field::Empty))]
	pub async fn verify(
		&self,
		token: &[u8],
		config: &SharedSignalsConfig,
	) -> Result<VerifiedPayload, SetTokenError> {
		let token = std::str::from_utf8(token)
			.map(str::trim)
			.map_err(|_| SetTokenError::invalid_request("Token is not valid UTF-8."))?;

		if token.is_empty() {
			return Err(SetTokenError::invalid_request("Token is empty."));
		}

		let header = jsonwebtoken::decode_header(token)
			.map_err(|err| SetTokenError::authentication_failed(err.into()))?;
		let Some(kid) = header.kid.as_deref().filter(|kid| !kid.is_empty()) else {
			return Err(SetTokenError::invalid_key("Token header has no kid."));
		};

		tracing::Span::current().record("kid", kid);

		if header.alg != config.event_algorithm {
			return Err(SetTokenError::authentication_failed(Error::Validation {
				field: "alg",
				reason: format!("Algorithm {:?} is not accepted.", header.alg),
			}));
		}
		if !header.typ.as_deref().is_some_and(is_set_type) {
			return Err(SetTokenError::authentication_failed(Error::Validation {
				field: "typ",
				reason: format!("Expected typ {SET_TYPE}, got {:?}.", header.typ),
			}));
		}

		let key = self
			.resolver
			.resolve(&config.jwks_uri, kid, config.cache_duration, config.event_algorithm)
			.await
			.map_err(SetTokenError::authentication_failed)?;
		let mut validation = Validation::new(config.event_algorithm);

		validation.leeway = self.leeway;
		validation.set_audience(&[config.audience.as_str()]);
		validation.set_issuer(&[config.issuer.as_str()]);
		validation.set_required_spec_claims(&["iss", "aud"]);

		let payload = match jsonwebtoken::decode::<VerifiedPayload>(token, &key, &validation) {
			Ok(data) => data.claims,
			// Only reachable once the signature checked out.
			Err(err) if matches!(err.kind(), ErrorKind::Json(_)) =>
				return Err(SetTokenError::invalid_request("Token payload is malformed.")
					.with_cause(err.into())),
			Err(err) => return Err(SetTokenError::authentication_failed(err.into())),
		};

		self.check_issued_at(&payload)?;

		tracing::info!(correlation_id = %payload.jti, "security event token verified");

		Ok(payload)
	}

	fn check_issued_at(&self, payload: &VerifiedPayload) -> Result<(), SetTokenError> {
		let latest = i64::try_from(self.leeway)
			.ok()
			.and_then(TimeDelta::try_seconds)
			.and_then(|leeway| Utc::now().checked_add_signed(leeway));

		match (payload.issued_at(), latest) {
			(Some(issued_at), Some(latest)) if issued_at <= latest => Ok(()),
			_ => Err(SetTokenError::authentication_failed(Error::Validation {
				field: "iat",
				reason: format!("Issued-at {} is in the future or out of range.", payload.iat),
			})),
		}
	}
}

/// Media type comparison per RFC 7515 §4.1.9: case-insensitive, `application/` optional.
fn is_set_type(typ: &str) -> bool {
	let media_type = match typ.get(..MEDIA_TYPE_PREFIX.len()) {
		Some(prefix) if prefix.eq_ignore_ascii_case(MEDIA_TYPE_PREFIX) =>
			&typ[MEDIA_TYPE_PREFIX.len()..],
		_ => typ,
	};

	media_type.eq_ignore_ascii_case(SET_TYPE)
}
