//! Receiver configuration and validation.
//!
//! Settings are read from `SHARED_SIGNALS_*` environment variables:
//!
//! | Variable | Default |
//! | --- | --- |
//! | `SHARED_SIGNALS_ENABLED` | `false` |
//! | `SHARED_SIGNALS_AUDIENCE` | required |
//! | `SHARED_SIGNALS_ISSUER` | required |
//! | `SHARED_SIGNALS_JWKS_URI` | required |
//! | `SHARED_SIGNALS_CACHE_DURATION_MS` | `600000` |
//! | `SHARED_SIGNALS_EVENT_ALGORITHM` | `RS256` |
//! | `SHARED_SIGNALS_TIMEOUT_MS` | `5000` |
//! | `SHARED_SIGNALS_REQUIRE_HTTPS` | `true` |

// std
use std::{collections::HashMap, str::FromStr};
// crates.io
use config::{Config, Environment};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use url::Url;
// self
use crate::_prelude::*;

/// Environment prefix for every setting.
pub const ENV_PREFIX: &str = "SHARED_SIGNALS";
/// Default JWKS cache duration.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10 * 60);
/// Default JWKS fetch timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Default signing algorithm for SETs.
pub const DEFAULT_EVENT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verification parameters for incoming SETs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedSignalsConfig {
	/// Expected `aud` claim.
	pub audience: String,
	/// Expected `iss` claim.
	pub issuer: String,
	/// Transmitter JWKS endpoint.
	pub jwks_uri: Url,
	/// How long a fetched key set is trusted.
	pub cache_duration: Duration,
	/// The only algorithm accepted in SET headers.
	pub event_algorithm: Algorithm,
}
impl SharedSignalsConfig {
	/// Construct a config with default cache duration and algorithm.
	pub fn new(
		audience: impl Into<String>,
		issuer: impl Into<String>,
		jwks_uri: impl AsRef<str>,
	) -> Result<Self> {
		Ok(Self {
			audience: audience.into(),
			issuer: issuer.into(),
			jwks_uri: Url::parse(jwks_uri.as_ref())?,
			cache_duration: DEFAULT_CACHE_DURATION,
			event_algorithm: DEFAULT_EVENT_ALGORITHM,
		})
	}

	/// Override the key set cache duration.
	pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
		self.cache_duration = cache_duration;

		self
	}

	/// Validate the config against the documented constraints.
	pub fn validate(&self, require_https: bool) -> Result<()> {
		if self.audience.trim().is_empty() {
			return Err(Error::Validation { field: "audience", reason: "Must not be empty.".into() });
		}
		if self.issuer.trim().is_empty() {
			return Err(Error::Validation { field: "issuer", reason: "Must not be empty.".into() });
		}
		if self.cache_duration.is_zero() {
			return Err(Error::Validation {
				field: "cache_duration_ms",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.jwks_uri.host_str().is_none() {
			return Err(Error::Validation {
				field: "jwks_uri",
				reason: "Must include a host component.".into(),
			});
		}
		if require_https {
			enforce_https(&self.jwks_uri)?;
		}
		if matches!(
			self.event_algorithm,
			Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
		) {
			return Err(Error::Validation {
				field: "event_algorithm",
				reason: "Symmetric algorithms cannot be verified against a JWKS.".into(),
			});
		}

		Ok(())
	}
}

/// Complete receiver settings, immutable for the lifetime of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverSettings {
	/// Feature gate; when false every request is answered with 503.
	pub enabled: bool,
	/// SET verification parameters.
	pub signals: SharedSignalsConfig,
	/// Per-attempt timeout for JWKS fetches.
	pub jwks_timeout: Duration,
	/// Whether the JWKS endpoint must use HTTPS.
	pub require_https: bool,
}
impl ReceiverSettings {
	/// Enabled settings wrapping the given verification config.
	pub fn new(signals: SharedSignalsConfig) -> Self {
		Self { enabled: true, signals, jwks_timeout: DEFAULT_TIMEOUT, require_https: true }
	}

	/// Load settings from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::load(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").try_parsing(true))
	}

	/// Load settings from an explicit variable map, as if it were the environment.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let vars: HashMap<String, String> =
			vars.into_iter().map(|(key, value)| (key.into(), value.into())).collect();

		Self::load(
			Environment::with_prefix(ENV_PREFIX)
				.prefix_separator("_")
				.try_parsing(true)
				.source(Some(vars)),
		)
	}

	/// Set the feature gate.
	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Set the HTTPS requirement.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Validate every setting.
	pub fn validate(&self) -> Result<()> {
		if self.jwks_timeout < Duration::from_millis(100) {
			return Err(Error::Validation {
				field: "timeout_ms",
				reason: "Must be at least 100 ms.".into(),
			});
		}

		self.signals.validate(self.require_https)
	}

	fn load(environment: Environment) -> Result<Self> {
		let raw: RawSettings = Config::builder().add_source(environment).build()?.try_deserialize()?;
		let event_algorithm =
			Algorithm::from_str(raw.event_algorithm.trim()).map_err(|err| Error::Validation {
				field: "event_algorithm",
				reason: format!("Unsupported algorithm '{}': {err}.", raw.event_algorithm),
			})?;
		let jwks_uri = Url::parse(raw.jwks_uri.trim()).map_err(|err| Error::Validation {
			field: "jwks_uri",
			reason: format!("Invalid URL: {err}."),
		})?;
		let settings = Self {
			enabled: raw.enabled,
			signals: SharedSignalsConfig {
				audience: raw.audience,
				issuer: raw.issuer,
				jwks_uri,
				cache_duration: Duration::from_millis(raw.cache_duration_ms),
				event_algorithm,
			},
			jwks_timeout: Duration::from_millis(raw.timeout_ms),
			require_https: raw.require_https,
		};

		settings.validate()?;

		tracing::debug!(
			enabled = settings.enabled,
			issuer = %settings.signals.issuer,
			jwks_uri = %settings.signals.jwks_uri,
			"loaded receiver settings"
		);

		Ok(settings)
	}
}

#[derive(Debug, Deserialize)]
struct RawSettings {
	#[serde(default)]
	enabled: bool,
	audience: String,
	issuer: String,
	jwks_uri: String,
	#[serde(default = "default_cache_duration_ms")]
	cache_duration_ms: u64,
	#[serde(default = "default_event_algorithm")]
	event_algorithm: String,
	#[serde(default = "default_timeout_ms")]
	timeout_ms: u64,
	#[serde(default = "default_true")]
	require_https: bool,
}

/// Ensure the provided URL uses HTTPS.
pub fn enforce_https(url: &Url) -> Result<()> {
	if url.scheme() == "https" {
		Ok(())
	} else {
		Err(Error::Validation {
			field: "jwks_uri",
			reason: format!("Upstream URL {url} must use HTTPS."),
		})
	}
}

fn default_cache_duration_ms() -> u64 {
	DEFAULT_CACHE_DURATION.as_millis() as u64
}

fn default_event_algorithm() -> String {
	"RS256".into()
}

fn default_timeout_ms() -> u64 {
	DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_true() -> bool {
	true
}
