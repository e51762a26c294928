//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for the receiver crate.
///
/// These errors never reach a caller verbatim; the receiver maps them onto the public
/// [`SetErrorCode`](crate::SetErrorCode) taxonomy and only logs the text.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] config::ConfigError),
	#[error(transparent)]
	Jsonwebtoken(#[from] jsonwebtoken::errors::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Request to {url} was aborted.")]
	Aborted { url: url::Url },
	#[error("Identity provider call '{operation}' failed: {reason}")]
	IdentityProvider { operation: &'static str, reason: String },
	#[error("Failed to fetch JWKS from {url}: {reason}")]
	JwksFetch { url: url::Url, reason: String },
	#[error("No JWKS entry matches kid '{kid}' for algorithm {algorithm:?}.")]
	KeyNotFound { kid: String, algorithm: jsonwebtoken::Algorithm },
	#[error("Metrics exporter error: {0}")]
	Metrics(String),
	#[error("Request to {url} timed out.")]
	Timeout { url: url::Url },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Whether the error was produced by an elapsed deadline or an abort signal.
	///
	/// Such errors are final for the request and are never retried.
	pub fn is_timeout(&self) -> bool {
		match self {
			Self::Timeout { .. } | Self::Aborted { .. } => true,
			Self::Reqwest(err) => err.is_timeout(),
			_ => false,
		}
	}

	/// Classify a reqwest failure for `url`, folding its elapsed timeouts into [`Error::Timeout`].
	pub fn transport(err: reqwest::Error, url: &url::Url) -> Self {
		if err.is_timeout() { Self::Timeout { url: url.clone() } } else { Self::Reqwest(err) }
	}

	/// Build an identity-provider failure for the named operation.
	pub fn identity_provider(operation: &'static str, reason: impl Into<String>) -> Self {
		Self::IdentityProvider { operation, reason: reason.into() }
	}
}
