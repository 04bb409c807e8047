//! `anthrax-sheets`: Google Sheets transport for the infraction log.
//!
//! Implements [`anthrax_records::SheetBackend`] on top of the Sheets v4
//! values API, with spreadsheet lookup by title through Drive v3 and
//! service-account authentication (OAuth 2.0 JWT bearer grant).

pub mod auth;
pub mod client;
pub mod credentials;
mod error;

pub use auth::{AccessTokenSource, SHEETS_SCOPES, ServiceAccountAuth, StaticToken};
pub use client::{SheetsClient, SheetsEndpoints, SpreadsheetRef};
pub use credentials::{CredentialSource, CredentialsError, ServiceAccountKey};
pub use error::SheetsError;
