//! Room Coordinator configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default validity window of minted access grants (24 hours).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: u64 = 86_400;

/// Default timeout for calls to the media server and chat service.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 5;

/// Default chat service API base URL.
pub const DEFAULT_TRAQ_API_URL: &str = "https://q.trap.jp/api/v3";

/// Chat notification settings. Present only when a bot token is configured.
#[derive(Clone)]
pub struct NotifierConfig {
    /// Chat service API base URL.
    pub api_url: String,

    /// Bot access token.
    pub access_token: SecretString,

    /// Channel that receives announcements.
    pub channel_id: String,
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("api_url", &self.api_url)
            .field("access_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

/// Room Coordinator configuration.
///
/// Loaded from environment variables with sensible defaults.
/// The media server API secret and bot token are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the media server management API.
    pub livekit_host: String,

    /// Media server API key (grant issuer, management auth, webhook issuer).
    pub livekit_api_key: Option<String>,

    /// Media server API secret.
    pub livekit_api_secret: Option<SecretString>,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// PEM-encoded ES256 public keys trusted for bearer credentials,
    /// primary first.
    pub auth_public_keys_pem: Vec<String>,

    /// JWT clock skew tolerance in seconds for bearer validation.
    pub jwt_clock_skew_seconds: u64,

    /// Validity window of minted access grants.
    pub access_token_ttl_seconds: u64,

    /// Timeout for outbound calls.
    pub upstream_timeout_seconds: u64,

    /// Interval of the recovery resync. 0 disables it.
    pub resync_interval_seconds: u64,

    /// Chat notifications; `None` disables them.
    pub notifier: Option<NotifierConfig>,

    /// Graceful shutdown drain period.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("livekit_host", &self.livekit_host)
            .field("livekit_api_key", &self.livekit_api_key)
            .field(
                "livekit_api_secret",
                &self.livekit_api_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bind_address", &self.bind_address)
            .field("auth_public_keys", &self.auth_public_keys_pem.len())
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field("resync_interval_seconds", &self.resync_interval_seconds)
            .field("notifier", &self.notifier)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid public key configuration: {0}")]
    InvalidPublicKeys(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let livekit_host = non_empty(vars, "LIVEKIT_HOST")
            .ok_or_else(|| ConfigError::MissingEnvVar("LIVEKIT_HOST".to_string()))?;

        let livekit_api_key = non_empty(vars, "LIVEKIT_API_KEY");
        let livekit_api_secret = non_empty(vars, "LIVEKIT_API_SECRET").map(SecretString::from);

        let bind_address =
            non_empty(vars, "BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let auth_public_keys_pem = match vars.get("AUTH_PUBLIC_KEYS_PEM") {
            Some(pem) => split_pem_blocks(pem)?,
            None => Vec::new(),
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value.unsigned_abs() > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value.unsigned_abs()
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let access_token_ttl_seconds = parse_seconds(
            vars,
            "ACCESS_TOKEN_TTL_SECONDS",
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            false,
        )?;
        let upstream_timeout_seconds = parse_seconds(
            vars,
            "UPSTREAM_TIMEOUT_SECONDS",
            DEFAULT_UPSTREAM_TIMEOUT_SECONDS,
            false,
        )?;
        let resync_interval_seconds = parse_seconds(vars, "RESYNC_INTERVAL_SECONDS", 0, true)?;
        let drain_seconds = parse_seconds(vars, "RC_DRAIN_SECONDS", 0, true)?;

        let notifier = match non_empty(vars, "TRAQ_ACCESS_TOKEN") {
            Some(token) => {
                let channel_id = non_empty(vars, "TRAQ_NOTIFICATION_CHANNEL_ID").ok_or_else(|| {
                    ConfigError::MissingEnvVar("TRAQ_NOTIFICATION_CHANNEL_ID".to_string())
                })?;
                let api_url = non_empty(vars, "TRAQ_API_URL")
                    .unwrap_or_else(|| DEFAULT_TRAQ_API_URL.to_string());
                Some(NotifierConfig {
                    api_url: api_url.trim_end_matches('/').to_string(),
                    access_token: SecretString::from(token),
                    channel_id,
                })
            }
            None => None,
        };

        Ok(Config {
            livekit_host: livekit_host.trim_end_matches('/').to_string(),
            livekit_api_key,
            livekit_api_secret,
            bind_address,
            auth_public_keys_pem,
            jwt_clock_skew_seconds,
            access_token_ttl_seconds,
            upstream_timeout_seconds,
            resync_interval_seconds,
            notifier,
            drain_seconds,
        })
    }
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
    allow_zero: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            key
        )));
    }

    Ok(value)
}

/// Split a concatenation of PEM public keys into individual blocks.
fn split_pem_blocks(raw: &str) -> Result<Vec<String>, ConfigError> {
    const BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
    const END: &str = "-----END PUBLIC KEY-----";

    let mut blocks = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find(BEGIN) {
        let after_start = rest.get(start..).unwrap_or_default();
        let Some(end) = after_start.find(END) else {
            return Err(ConfigError::InvalidPublicKeys(
                "AUTH_PUBLIC_KEYS_PEM contains an unterminated PEM block".to_string(),
            ));
        };
        let block_end = end + END.len();
        blocks.push(after_start.get(..block_end).unwrap_or_default().to_string());
        rest = after_start.get(block_end..).unwrap_or_default();
    }

    if blocks.is_empty() && !raw.trim().is_empty() {
        return Err(ConfigError::InvalidPublicKeys(
            "AUTH_PUBLIC_KEYS_PEM contains no PEM public key".to_string(),
        ));
    }

    Ok(blocks)
}
