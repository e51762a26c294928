//! Stream verification events.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	event::{SecurityEvent, Verification},
	handlers::EventHandler,
	response::Response,
};

/// Acknowledges transmitter verification events; no side effects.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerificationHandler;
#[async_trait]
impl EventHandler for VerificationHandler {
	async fn handle(&self, event: &SecurityEvent, correlation_id: &str) -> Result<Response> {
		let SecurityEvent::Verification(Verification { state }) = event else {
			return Ok(Response::bad_request());
		};

		tracing::info!(correlation_id, has_state = state.is_some(), "stream verification received");

		Ok(Response::accepted())
	}
}
