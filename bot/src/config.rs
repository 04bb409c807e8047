//! Runtime configuration from environment variables.
//!
//! `.env` files are honoured through `dotenvy`. Parsing goes through a
//! lookup function so tests never touch the process environment.

use std::net::SocketAddr;
use std::time::Duration;

use anthrax_sheets::{CredentialSource, SpreadsheetRef};
use thiserror::Error;

pub const ENV_DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const ENV_APPLICATION_ID: &str = "DISCORD_APPLICATION_ID";
pub const ENV_PUBLIC_KEY: &str = "DISCORD_PUBLIC_KEY";
pub const ENV_GUILD_ID: &str = "DISCORD_GUILD_ID";
pub const ENV_STAFF_ROLE_ID: &str = "STAFF_ROLE_ID";
pub const ENV_SHEET_NAME: &str = "GSHEET_NAME";
pub const ENV_SHEET_ID: &str = "GSHEET_ID";
pub const ENV_SHEET_TAB: &str = "GSHEET_TAB";
pub const ENV_CREDENTIALS_JSON: &str = "GOOGLE_CREDENTIALS_JSON";
pub const ENV_CREDENTIALS_B64: &str = "GOOGLE_CREDENTIALS_B64";
pub const ENV_BIND_ADDR: &str = "ANTHRAX_BIND_ADDR";
pub const ENV_HTTP_TIMEOUT: &str = "ANTHRAX_HTTP_TIMEOUT_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("set {ENV_SHEET_NAME} or {ENV_SHEET_ID}")]
    MissingSpreadsheet,

    #[error("Google credentials not provided. Set {ENV_CREDENTIALS_JSON} or {ENV_CREDENTIALS_B64}.")]
    MissingCredentials,
}

#[derive(Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub application_id: String,
    /// Hex-encoded Ed25519 key from the developer portal.
    pub public_key: String,
    /// `None` registers commands globally.
    pub guild_id: Option<u64>,
    pub staff_role_id: String,
    pub spreadsheet: SpreadsheetRef,
    pub tab: String,
    pub credentials: CredentialSource,
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("public_key", &self.public_key)
            .field("guild_id", &self.guild_id)
            .field("staff_role_id", &self.staff_role_id)
            .field("spreadsheet", &self.spreadsheet)
            .field("tab", &self.tab)
            .field("credentials", &self.credentials)
            .field("bind_addr", &self.bind_addr)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl BotConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            tracing::warn!("ignoring unreadable .env file: {err}");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let discord_token = require(ENV_DISCORD_TOKEN)?;
        let application_id = parse_snowflake(ENV_APPLICATION_ID, &require(ENV_APPLICATION_ID)?)?;
        let public_key = require(ENV_PUBLIC_KEY)?;
        crate::verify::SignatureVerifier::from_hex(&public_key).map_err(|e| {
            ConfigError::Invalid {
                var: ENV_PUBLIC_KEY,
                reason: e.to_string(),
            }
        })?;

        let guild_id = match get(ENV_GUILD_ID) {
            None => None,
            Some(raw) => {
                let id: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    var: ENV_GUILD_ID,
                    reason: format!("expected a numeric id, got {raw:?}"),
                })?;
                (id != 0).then_some(id)
            }
        };

        let staff_role_id = parse_snowflake(ENV_STAFF_ROLE_ID, &require(ENV_STAFF_ROLE_ID)?)?;

        let spreadsheet = match (get(ENV_SHEET_ID), get(ENV_SHEET_NAME)) {
            (Some(id), _) => SpreadsheetRef::Id(id),
            (None, Some(name)) => SpreadsheetRef::Name(name),
            (None, None) => return Err(ConfigError::MissingSpreadsheet),
        };
        let tab = require(ENV_SHEET_TAB)?;

        // Raw JSON wins when both forms are present.
        let credentials = match (get(ENV_CREDENTIALS_JSON), get(ENV_CREDENTIALS_B64)) {
            (Some(json), _) => CredentialSource::Json(json),
            (None, Some(b64)) => CredentialSource::Base64(b64),
            (None, None) => return Err(ConfigError::MissingCredentials),
        };

        let bind_raw = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: ENV_BIND_ADDR,
            reason: format!("expected host:port, got {bind_raw:?}"),
        })?;

        let http_timeout = match get(ENV_HTTP_TIMEOUT) {
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_HTTP_TIMEOUT,
                        reason: format!("expected a positive number of seconds, got {raw:?}"),
                    });
                }
            },
        };

        Ok(Self {
            discord_token,
            application_id,
            public_key,
            guild_id,
            staff_role_id,
            spreadsheet,
            tab,
            credentials,
            bind_addr,
            http_timeout,
        })
    }
}

fn parse_snowflake(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Ok(id.to_string()),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a non-zero numeric id, got {raw:?}"),
        }),
    }
}
