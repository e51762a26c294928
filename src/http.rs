//! Outbound HTTP helpers shared by the JWKS resolver.

pub mod client;
pub mod retry;
