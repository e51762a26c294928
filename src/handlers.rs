//! Event handlers performing identity-provider side effects.

pub mod account_purged;
pub mod credential_change;
pub mod verification;

pub use account_purged::AccountPurgedHandler;
pub use credential_change::CredentialChangeHandler;
pub use verification::VerificationHandler;

// crates.io
use async_trait::async_trait;
// self
use crate::{_prelude::*, event::SecurityEvent, response::Response};

/// Handles one recognised event after admission and user validation.
///
/// `Ok` responses are returned to the transmitter verbatim; `Err` is treated as an internal
/// failure by the receiver.
#[async_trait]
pub trait EventHandler: Send + Sync {
	/// Process `event` for the SET identified by `correlation_id`.
	async fn handle(&self, event: &SecurityEvent, correlation_id: &str) -> Result<Response>;
}
