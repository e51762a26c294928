//! JWKS caching and signing-key resolution.

pub mod entry;
pub mod resolver;
