//! Public-safe error taxonomy for Security Event Token processing.
//!
//! Every failure that reaches a transmitter is expressed as one of the fixed [`SetErrorCode`]s.
//! The code decides the status and the public description; the internal cause travels alongside
//! for server-side logging only and is never serialized.

// std
use std::fmt::{Display, Formatter, Result as FmtResult};
// crates.io
use http::StatusCode;
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Error codes a receiver may report for a rejected SET.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetErrorCode {
	/// The request is malformed or missing the token.
	InvalidRequest,
	/// The signing key could not be identified.
	InvalidKey,
	/// Reserved: the issuer is not trusted.
	InvalidIssuer,
	/// Reserved: the audience does not name this receiver.
	InvalidAudience,
	/// Signature or claim verification failed.
	AuthenticationFailed,
	/// The caller is not authorized.
	AccessDenied,
	/// Processing failed inside the receiver or one of its collaborators.
	InternalServerError,
}
impl SetErrorCode {
	/// Wire representation of the code.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InvalidRequest => "invalid_request",
			Self::InvalidKey => "invalid_key",
			Self::InvalidIssuer => "invalid_issuer",
			Self::InvalidAudience => "invalid_audience",
			Self::AuthenticationFailed => "authentication_failed",
			Self::AccessDenied => "access_denied",
			Self::InternalServerError => "internal_server_error",
		}
	}

	/// HTTP status paired with the code.
	pub const fn status(self) -> StatusCode {
		match self {
			Self::InvalidRequest
			| Self::InvalidKey
			| Self::InvalidIssuer
			| Self::InvalidAudience
			| Self::AuthenticationFailed => StatusCode::BAD_REQUEST,
			Self::AccessDenied => StatusCode::UNAUTHORIZED,
			Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Fixed description returned to the transmitter.
	pub const fn public_message(self) -> &'static str {
		match self {
			Self::InvalidRequest =>
				"The request is missing a required parameter, includes an invalid parameter value, or is otherwise malformed",
			Self::InvalidKey => "The key used to sign the token is invalid or has been revoked",
			Self::InvalidIssuer => "The token was issued by an unauthorized party",
			Self::InvalidAudience => "The token is not intended for this service",
			Self::AuthenticationFailed => "The token signature verification failed",
			Self::AccessDenied => "The request is not authorized to access this resource",
			Self::InternalServerError =>
				"An internal server error occurred while processing the request",
		}
	}
}
impl Display for SetErrorCode {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Classified SET processing failure.
///
/// `message` and `cause` are internal; only [`SetErrorCode::public_message`] is exposed.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SetTokenError {
	code: SetErrorCode,
	message: String,
	#[source]
	cause: Option<Box<Error>>,
}
impl SetTokenError {
	/// Create a classified error without an underlying cause.
	pub fn new(code: SetErrorCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), cause: None }
	}

	/// Attach the internal cause.
	pub fn with_cause(mut self, cause: Error) -> Self {
		self.cause = Some(Box::new(cause));

		self
	}

	/// The token was not usable as a compact JWS string.
	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::new(SetErrorCode::InvalidRequest, message)
	}

	/// The token header does not identify a signing key.
	pub fn invalid_key(message: impl Into<String>) -> Self {
		Self::new(SetErrorCode::InvalidKey, message)
	}

	/// Any key resolution, signature, or claim failure.
	pub fn authentication_failed(cause: Error) -> Self {
		Self::new(SetErrorCode::AuthenticationFailed, cause.to_string()).with_cause(cause)
	}

	/// Failure inside an identity-provider collaborator.
	pub fn internal(cause: Error) -> Self {
		Self::new(SetErrorCode::InternalServerError, cause.to_string()).with_cause(cause)
	}

	/// Classified code.
	pub fn code(&self) -> SetErrorCode {
		self.code
	}

	/// HTTP status derived from the code.
	pub fn status(&self) -> StatusCode {
		self.code.status()
	}

	/// Description safe to return to the transmitter.
	pub fn public_message(&self) -> &'static str {
		self.code.public_message()
	}

	/// Internal message; log only.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Internal cause; log only.
	pub fn cause(&self) -> Option<&Error> {
		self.cause.as_deref()
	}
}
