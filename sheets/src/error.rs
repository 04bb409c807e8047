//! Error types for the Sheets transport.

use thiserror::Error;

use crate::credentials::CredentialsError;

#[derive(Debug, Error)]
pub enum SheetsError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Google answered with a non-success status.
    #[error("Google API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// OAuth token exchange was rejected.
    #[error("token exchange failed: {0}")]
    Auth(String),

    #[error("invalid service account credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    /// Response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}
