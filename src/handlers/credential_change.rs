//! Credential-change events: password and email updates.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	event::{ChangeType, CredentialChange, CredentialType, SecurityEvent},
	handlers::EventHandler,
	identity::IdentityProvider,
	response::Response,
};

/// Signs the user out on a password update; signs out and replaces the address on an email update.
#[derive(Clone)]
pub struct CredentialChangeHandler {
	provider: Arc<dyn IdentityProvider>,
}
impl CredentialChangeHandler {
	/// Create a handler backed by `provider`.
	pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
		Self { provider }
	}

	async fn update_password(&self, user_id: &str, correlation_id: &str) -> Result<Response> {
		if self.provider.global_sign_out(user_id).await? {
			tracing::info!(user_id, correlation_id, "password update processed");

			Ok(Response::accepted())
		} else {
			tracing::error!(user_id, correlation_id, "password update failed: sign-out refused");

			Ok(Response::internal_server_error())
		}
	}

	// The address itself is never logged.
	async fn update_email(
		&self,
		user_id: &str,
		email: &str,
		correlation_id: &str,
	) -> Result<Response> {
		let signed_out = self.provider.global_sign_out(user_id).await?;
		let updated = self.provider.update_email(user_id, email).await?;

		if signed_out && updated {
			tracing::info!(user_id, correlation_id, "email update processed");

			Ok(Response::accepted())
		} else {
			tracing::error!(user_id, correlation_id, signed_out, updated, "email update failed");

			Ok(Response::internal_server_error())
		}
	}
}
#[async_trait]
impl EventHandler for CredentialChangeHandler {
	async fn handle(&self, event: &SecurityEvent, correlation_id: &str) -> Result<Response> {
		let SecurityEvent::CredentialChange(CredentialChange {
			change_type,
			credential_type,
			subject,
			email,
		}) = event
		else {
			return Ok(Response::bad_request());
		};
		let user_id = subject.uri.as_str();

		match (change_type, credential_type) {
			(ChangeType::Update, Some(CredentialType::Password)) =>
				self.update_password(user_id, correlation_id).await,
			(ChangeType::Update, Some(CredentialType::Email)) => match email {
				Some(email) => self.update_email(user_id, email, correlation_id).await,
				None => {
					tracing::error!(user_id, correlation_id, "email address missing for email update");

					Ok(Response::bad_request())
				},
			},
			_ => {
				tracing::error!(
					user_id,
					correlation_id,
					change_type = change_type.as_str(),
					"unsupported credential change"
				);

				Ok(Response::bad_request())
			},
		}
	}
}
impl std::fmt::Debug for CredentialChangeHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CredentialChangeHandler").finish_non_exhaustive()
	}
}
