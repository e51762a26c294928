//! Identity-provider collaborator.

// crates.io
use async_trait::async_trait;
// self
use crate::_prelude::*;

/// Admin operations the receiver performs against the user directory.
///
/// `Ok(false)` reports an operation the provider refused or could not complete; `Err` is reserved
/// for infrastructure failures and maps to a 500 `internal_server_error`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	/// Invalidate every session of `user_id`.
	async fn global_sign_out(&self, user_id: &str) -> Result<bool>;

	/// Delete `user_id`.
	async fn delete_user(&self, user_id: &str) -> Result<bool>;

	/// Replace the sign-in email of `user_id`.
	async fn update_email(&self, user_id: &str, email: &str) -> Result<bool>;

	/// Whether `user_id` exists. A missing user is `Ok(false)`, never an error.
	async fn user_exists(&self, user_id: &str) -> Result<bool>;
}

