//! Response shapes returned to the transmitter.

// crates.io
use http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE};
use serde::Serialize;
// self
use crate::taxonomy::SetTokenError;

/// JSON body of a receiver response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
	/// Plain status message, e.g. `{"message":"Accepted"}`.
	Message {
		/// Human-readable status text.
		message: String,
	},
	/// Classified error, e.g. `{"err":"invalid_key","description":"..."}`.
	Error {
		/// Public error code.
		err: String,
		/// Public description for the code.
		description: String,
	},
}

/// Status plus body, ready to be written by whatever transport carries the SET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
	/// HTTP status.
	pub status: StatusCode,
	/// JSON body.
	pub body: ResponseBody,
}
impl Response {
	/// `202 {"message":"Accepted"}`.
	pub fn accepted() -> Self {
		Self::message(StatusCode::ACCEPTED)
	}

	/// `400 {"message":"Bad Request"}`.
	pub fn bad_request() -> Self {
		Self::message(StatusCode::BAD_REQUEST)
	}

	/// `503 {"message":"Service Unavailable"}`.
	pub fn service_unavailable() -> Self {
		Self::message(StatusCode::SERVICE_UNAVAILABLE)
	}

	/// `500 {"message":"Internal Server Error"}`.
	pub fn internal_server_error() -> Self {
		Self::message(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// Status with its canonical reason as the message.
	pub fn message(status: StatusCode) -> Self {
		let message = status.canonical_reason().unwrap_or("Unknown Status").to_owned();

		Self { status, body: ResponseBody::Message { message } }
	}

	/// Map a classified error onto its public code and description.
	pub fn from_set_error(error: &SetTokenError) -> Self {
		Self {
			status: error.status(),
			body: ResponseBody::Error {
				err: error.code().as_str().to_owned(),
				description: error.public_message().to_owned(),
			},
		}
	}

	/// Headers to send with the body; every body is JSON.
	pub fn headers(&self) -> HeaderMap {
		let mut headers = HeaderMap::with_capacity(1);

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		headers
	}

	/// Serialized body.
	pub fn body_json(&self) -> String {
		// Both variants are maps of strings; serialization cannot fail.
		serde_json::to_string(&self.body).unwrap_or_else(|_| String::from("{}"))
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}
}
