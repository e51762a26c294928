//! Account-purged events.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	event::{AccountPurged, SecurityEvent},
	handlers::EventHandler,
	identity::IdentityProvider,
	response::Response,
};

/// Signs the user out, then deletes the account.
#[derive(Clone)]
pub struct AccountPurgedHandler {
	provider: Arc<dyn IdentityProvider>,
}
impl AccountPurgedHandler {
	/// Create a handler backed by `provider`.
	pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
		Self { provider }
	}
}
#[async_trait]
impl EventHandler for AccountPurgedHandler {
	async fn handle(&self, event: &SecurityEvent, correlation_id: &str) -> Result<Response> {
		let SecurityEvent::AccountPurged(AccountPurged { subject }) = event else {
			return Ok(Response::bad_request());
		};
		let user_id = subject.uri.as_str();

		// Deletion decides the outcome; a refused sign-out is only logged.
		if !self.provider.global_sign_out(user_id).await? {
			tracing::warn!(user_id, correlation_id, "sign-out before purge was refused");
		}

		if self.provider.delete_user(user_id).await? {
			tracing::info!(user_id, correlation_id, "account purge processed");

			Ok(Response::accepted())
		} else {
			tracing::error!(user_id, correlation_id, "account purge failed");

			Ok(Response::internal_server_error())
		}
	}
}
impl std::fmt::Debug for AccountPurgedHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AccountPurgedHandler").finish_non_exhaustive()
	}
}
