//! Service-account credentials.
//!
//! Deployments hand the key over either as the raw JSON document Google
//! issues, or base64-encoded (easier to paste into a hosting dashboard).
//! Both decode into one [`ServiceAccountKey`].

use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credentials are not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("credentials are not valid service account JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service account key is missing `{0}`")]
    MissingField(&'static str),
}

/// The fields of a Google service-account key file this crate uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

// Keep the private key out of logs.
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("account_type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(text: &str) -> Result<Self, CredentialsError> {
        let key: Self = serde_json::from_str(text)?;
        key.validate()?;
        Ok(key)
    }

    /// Decode standard base64 (surrounding whitespace ignored), then parse JSON.
    pub fn from_base64(text: &str) -> Result<Self, CredentialsError> {
        let decoded = base64::engine::general_purpose::STANDARD.decode(text.trim())?;
        let key: Self = serde_json::from_slice(&decoded)?;
        key.validate()?;
        Ok(key)
    }

    fn validate(&self) -> Result<(), CredentialsError> {
        if self.client_email.trim().is_empty() {
            return Err(CredentialsError::MissingField("client_email"));
        }
        if self.private_key.trim().is_empty() {
            return Err(CredentialsError::MissingField("private_key"));
        }
        Ok(())
    }
}

/// How the key was delivered.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Json(String),
    Base64(String),
}

impl CredentialSource {
    pub fn load(&self) -> Result<ServiceAccountKey, CredentialsError> {
        match self {
            Self::Json(text) => ServiceAccountKey::from_json(text),
            Self::Base64(text) => ServiceAccountKey::from_base64(text),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Base64(_) => "base64",
        }
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialSource::{}(<redacted>)", self.kind())
    }
}
