//! # RC Test Utilities
//!
//! Shared test utilities for the Room Coordinator service.
//!
//! This crate provides:
//! - Server test harness (`TestRcServer` for E2E tests)
//! - ES256 bearer keys for authenticated routes (`TestBearerKey`)
//! - Media server webhook signatures (`sign_webhook`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestRcServer::spawn(Arc::new(MockMediaServerClient::empty())).await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/token?room=r1", server.url()))
//!         .bearer_auth(server.bearer_key().sign_user("alice")?)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod webhook_signer;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use webhook_signer::*;
