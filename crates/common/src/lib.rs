//! Common utilities and types shared across Room Coordinator components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT and signed-payload utilities (size limits, leeway, digests)
pub mod jwt;
