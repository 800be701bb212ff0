//! Authentication for the Room Coordinator.
//!
//! - `bearer`: validates caller credentials from the identity provider
//! - `grant`: signs and shapes media server tokens

pub mod bearer;
pub mod claims;
pub mod grant;

pub use bearer::BearerValidator;
pub use claims::UserClaims;
pub use grant::{GrantClaims, SigningCredentials, VideoGrant};
