//! `anthrax-bot`: Discord front end for the infraction log.
//!
//! Receives slash-command interactions over HTTP, verifies Discord's
//! Ed25519 signature, and routes `infraction` / `callinfractions` to the
//! record handlers. Every reply is ephemeral.
//!
//! ## Modes
//!
//! - **serve** (default): register commands, open the sheet, listen.
//! - **register**: bulk-overwrite the command definitions and exit.

pub mod commands;
pub mod config;
pub mod interactions;
pub mod server;
pub mod verify;

/// Discord REST root used for command registration.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
