//! Event registry and dispatch.
//!
//! The registry is an ordered list built once at start-up. For each verified payload the first
//! registration whose event type parses from the `events` claim wins; later registrations are not
//! consulted.

// self
use crate::{
	_prelude::*,
	event::{ChangeType, EventType, SecurityEvent},
	handlers::{AccountPurgedHandler, CredentialChangeHandler, EventHandler, VerificationHandler},
	identity::IdentityProvider,
	metrics,
	response::Response,
	validation::UserValidationGate,
	verify::VerifiedPayload,
};

/// Registry entry routing one event type to its handler.
#[derive(Clone)]
pub struct EventRegistration {
	event_type: EventType,
	handler: Arc<dyn EventHandler>,
	requires_user_validation: bool,
	allowed_change_type: Option<ChangeType>,
}
impl EventRegistration {
	/// Register `handler` for `event_type`; user validation is on by default.
	pub fn new(event_type: EventType, handler: Arc<dyn EventHandler>) -> Self {
		Self { event_type, handler, requires_user_validation: true, allowed_change_type: None }
	}

	/// Toggle the user-existence gate for this registration.
	pub fn with_user_validation(mut self, requires_user_validation: bool) -> Self {
		self.requires_user_validation = requires_user_validation;

		self
	}

	/// Admit only events carrying `change_type`.
	pub fn with_allowed_change_type(mut self, change_type: ChangeType) -> Self {
		self.allowed_change_type = Some(change_type);

		self
	}

	/// Event type served by this registration.
	pub fn event_type(&self) -> EventType {
		self.event_type
	}

	/// Whether the subject must exist before the handler runs.
	pub fn requires_user_validation(&self) -> bool {
		self.requires_user_validation
	}

	fn admits(&self, event: &SecurityEvent) -> bool {
		match (self.allowed_change_type, event.change_type()) {
			(Some(allowed), Some(actual)) => allowed == actual,
			(Some(_), None) => false,
			(None, _) => true,
		}
	}
}
impl std::fmt::Debug for EventRegistration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventRegistration")
			.field("event_type", &self.event_type)
			.field("requires_user_validation", &self.requires_user_validation)
			.field("allowed_change_type", &self.allowed_change_type)
			.finish_non_exhaustive()
	}
}

/// Why a verified payload produced no handler response.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
	/// No registration recognised any event in the payload.
	#[error("No registered event type matches the payload.")]
	UnknownEvent,
	/// The event's change type is not admitted by its registration.
	#[error("Change type {change_type:?} is not admitted for {}.", event_type.name())]
	ChangeTypeRejected {
		/// Matched event type.
		event_type: EventType,
		/// Change type carried by the event, if any.
		change_type: Option<ChangeType>,
	},
	/// The user gate or the handler failed.
	#[error("Handler for {} failed.", event_type.name())]
	Handler {
		/// Matched event type.
		event_type: EventType,
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
}

/// Routes verified payloads through the registry and the user gate.
#[derive(Clone, Debug)]
pub struct Dispatcher {
	registrations: Vec<EventRegistration>,
	gate: UserValidationGate,
}
impl Dispatcher {
	/// Create a dispatcher over an explicit registry.
	pub fn new(registrations: Vec<EventRegistration>, gate: UserValidationGate) -> Self {
		Self { registrations, gate }
	}

	/// Default registry: credential change (update only), account purged, then stream
	/// verification without user validation.
	pub fn with_default_registry(provider: Arc<dyn IdentityProvider>) -> Self {
		let registrations = vec![
			EventRegistration::new(
				EventType::CredentialChange,
				Arc::new(CredentialChangeHandler::new(provider.clone())),
			)
			.with_allowed_change_type(ChangeType::Update),
			EventRegistration::new(
				EventType::AccountPurged,
				Arc::new(AccountPurgedHandler::new(provider.clone())),
			),
			EventRegistration::new(EventType::Verification, Arc::new(VerificationHandler))
				.with_user_validation(false),
		];

		Self::new(registrations, UserValidationGate::new(provider))
	}

	/// Registered entries in evaluation order.
	pub fn registrations(&self) -> &[EventRegistration] {
		&self.registrations
	}

	/// Match `payload` to a registration and run it.
	pub async fn dispatch(&self, payload: &VerifiedPayload) -> Result<Response, Failure> {
		let correlation_id = payload.jti.as_str();
		let Some((registration, event)) = self.registrations.iter().find_map(|registration| {
			SecurityEvent::parse(registration.event_type, &payload.events)
				.map(|event| (registration, event))
		}) else {
			tracing::error!(
				correlation_id,
				event_types = ?payload.events.keys().collect::<Vec<_>>(),
				"unknown signal"
			);

			return Err(Failure::UnknownEvent);
		};
		let event_type = registration.event_type;

		if !registration.admits(&event) {
			let change_type = event.change_type();

			tracing::error!(
				user_id = event.subject().map(|subject| subject.uri.as_str()),
				correlation_id,
				change_type = change_type.map(ChangeType::as_str),
				"unknown change type"
			);
			metrics::record_dispatched(event_type.name(), 400);

			return Err(Failure::ChangeTypeRejected { event_type, change_type });
		}

		if registration.requires_user_validation
			&& let Some(subject) = event.subject()
		{
			let exists = self
				.gate
				.check(&subject.uri, correlation_id)
				.await
				.map_err(|source| Failure::Handler { event_type, source: Box::new(source) })?;

			if !exists {
				metrics::record_dispatched(event_type.name(), 202);

				return Ok(Response::accepted());
			}
		}

		tracing::info!(correlation_id, event_type = event_type.name(), "dispatching event");

		let response = registration
			.handler
			.handle(&event, correlation_id)
			.await
			.map_err(|source| {
				metrics::record_dispatched(event_type.name(), 500);

				Failure::Handler { event_type, source: Box::new(source) }
			})?;

		metrics::record_dispatched(event_type.name(), response.status.as_u16());

		Ok(response)
	}
}
