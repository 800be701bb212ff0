//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every credential the coordinator
//! handles: the media server API secret, the chat bot access token, and the
//! bearer credentials presented by callers.
//!
//! `SecretString` implements `Debug` with redaction, so a struct that derives
//! `Debug` while holding one is safe to log. The value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct MediaServerCredentials {
//!     api_key: String,
//!     api_secret: SecretString,
//! }
//!
//! let creds = MediaServerCredentials {
//!     api_key: "APIkey123".to_string(),
//!     api_secret: SecretString::from("very-secret"),
//! };
//!
//! // Debug output never contains the secret.
//! assert!(!format!("{creds:?}").contains("very-secret"));
//!
//! // Signing code opts in explicitly.
//! let raw: &str = creds.api_secret.expose_secret();
//! assert_eq!(raw, "very-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
