//! Security Event Token receiver for shared signals: JWKS-backed signature verification, a
//! public-safe error taxonomy, and typed dispatch of CAEP/RISC events to identity-provider side
//! effects.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod dispatch;
pub mod event;
pub mod handlers;
pub mod http;
pub mod identity;
pub mod jwks;
pub mod metrics;
pub mod receiver;
pub mod response;
pub mod taxonomy;
pub mod validation;
pub mod verify;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")]
pub use crate::metrics::install_default_exporter;
pub use crate::{
	config::{ReceiverSettings, SharedSignalsConfig},
	dispatch::{Dispatcher, EventRegistration, Failure},
	error::{Error, Result},
	event::{EventType, SecurityEvent},
	handlers::EventHandler,
	identity::IdentityProvider,
	jwks::resolver::JwksResolver,
	receiver::Receiver,
	response::{Response, ResponseBody},
	taxonomy::{SetErrorCode, SetTokenError},
	validation::UserValidationGate,
	verify::{SetVerifier, VerifiedPayload},
};
