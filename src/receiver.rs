//! Receiver entrypoint: the single place where failures become responses.

// self
use crate::{
	_prelude::*,
	config::ReceiverSettings,
	dispatch::{Dispatcher, Failure},
	http::{client::RetryingClient, retry::RetryConfig},
	identity::IdentityProvider,
	jwks::resolver::JwksResolver,
	metrics,
	response::Response,
	taxonomy::SetTokenError,
	verify::SetVerifier,
};

/// Security Event Token receiver.
///
/// Runs `feature gate → verify → dispatch` strictly in sequence and maps the terminal result to
/// exactly one [`Response`].
#[derive(Clone, Debug)]
pub struct Receiver {
	settings: ReceiverSettings,
	verifier: SetVerifier,
	dispatcher: Dispatcher,
}
impl Receiver {
	/// Build a receiver with the default registry, a fresh key cache, and a retrying transport
	/// bounded by the configured JWKS timeout.
	pub fn new(settings: ReceiverSettings, provider: Arc<dyn IdentityProvider>) -> Result<Self> {
		settings.validate()?;

		let client = RetryingClient::new(RetryConfig::default().with_timeout(settings.jwks_timeout))?;
		let verifier = SetVerifier::new(Arc::new(JwksResolver::new(client)));
		let dispatcher = Dispatcher::with_default_registry(provider);

		Ok(Self { settings, verifier, dispatcher })
	}

	/// Assemble a receiver from pre-built stages, e.g. to share one key cache between receivers.
	pub fn from_parts(
		settings: ReceiverSettings,
		verifier: SetVerifier,
		dispatcher: Dispatcher,
	) -> Self {
		Self { settings, verifier, dispatcher }
	}

	/// Active settings.
	pub fn settings(&self) -> &ReceiverSettings {
		&self.settings
	}

	/// Process one raw request body.
	#[tracing::instrument(skip_all, fields(correlation_id = tracing::field::Empty))]
	pub async fn handle(&self, body: Option<&[u8]>) -> Response {
		if !self.settings.enabled {
			tracing::error!("shared signal processing is disabled");
			metrics::record_received("disabled");

			return Response::service_unavailable();
		}

		let Some(token) = body.filter(|body| !body.iter().all(u8::is_ascii_whitespace)) else {
			tracing::error!("request body is empty");
			metrics::record_received("rejected");

			return Response::bad_request();
		};
		let payload = match self.verifier.verify(token, &self.settings.signals).await {
			Ok(payload) => payload,
			Err(err) => {
				metrics::record_verification_failure(err.code().as_str());

				return reject(&err, None);
			},
		};
		let correlation_id = payload.jti.as_str();

		tracing::Span::current().record("correlation_id", correlation_id);

		match self.dispatcher.dispatch(&payload).await {
			Ok(response) => {
				metrics::record_received(if response.is_success() { "accepted" } else { "rejected" });

				response
			},
			Err(failure @ (Failure::UnknownEvent | Failure::ChangeTypeRejected { .. })) => {
				tracing::error!(correlation_id, error = %failure, "signal rejected");
				metrics::record_received("rejected");

				Response::bad_request()
			},
			Err(Failure::Handler { event_type, source }) => {
				tracing::error!(correlation_id, event_type = event_type.name(), "handler failed");

				reject(&SetTokenError::internal(*source), Some(correlation_id))
			},
		}
	}
}

fn reject(error: &SetTokenError, correlation_id: Option<&str>) -> Response {
	tracing::error!(
		correlation_id,
		code = error.code().as_str(),
		reason = error.message(),
		cause = error.cause().map(tracing::field::display),
		"security event token rejected"
	);
	metrics::record_received("rejected");

	Response::from_set_error(error)
}
