//! User-existence gate run before any side effect.

// self
use crate::{_prelude::*, identity::IdentityProvider};

/// Checks that an event subject exists before its handler runs.
///
/// A missing user is a normal outcome: the caller answers 202 without invoking the handler, so a
/// transmitter cannot tell known accounts from unknown ones by the response.
#[derive(Clone)]
pub struct UserValidationGate {
	provider: Arc<dyn IdentityProvider>,
}
impl UserValidationGate {
	/// Create a gate backed by `provider`.
	pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
		Self { provider }
	}

	/// Whether `user_id` exists. Logs a warning when it does not.
	#[tracing::instrument(skip_all, fields(user_id = %user_id, correlation_id = %correlation_id))]
	pub async fn check(&self, user_id: &str, correlation_id: &str) -> Result<bool> {
		let exists = self.provider.user_exists(user_id).await?;

		if !exists {
			tracing::warn!(user_id, correlation_id, "user not found; skipping event");
		}

		Ok(exists)
	}
}
impl std::fmt::Debug for UserValidationGate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UserValidationGate").finish_non_exhaustive()
	}
}
