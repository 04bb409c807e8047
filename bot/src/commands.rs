//! Slash-command definitions and their registration with Discord.

use anthrax_records::{PlayerInformed, Verdict};
use serde::Serialize;
use thiserror::Error;

pub const INFRACTION_COMMAND: &str = "infraction";
pub const CALL_INFRACTIONS_COMMAND: &str = "callinfractions";

/// Option names shared by both commands.
pub mod option {
    pub const ALDERON_NAME: &str = "alderon_name";
    pub const ALDERON_ID: &str = "alderon_id";
    pub const RULES_BROKEN: &str = "rules_broken";
    pub const TICKET_ID: &str = "ticket_id";
    pub const VERDICT: &str = "verdict";
    pub const PLAYER_INFORMED: &str = "player_informed";
}

const CHAT_INPUT: u8 = 1;
const OPTION_STRING: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: u8,
    pub options: Vec<OptionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: u8,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionChoice {
    pub name: &'static str,
    pub value: &'static str,
}

fn string_option(name: &'static str, description: &'static str, required: bool) -> OptionDefinition {
    OptionDefinition {
        name,
        description,
        kind: OPTION_STRING,
        required,
        choices: Vec::new(),
    }
}

fn choices(values: impl IntoIterator<Item = &'static str>) -> Vec<OptionChoice> {
    values
        .into_iter()
        .map(|v| OptionChoice { name: v, value: v })
        .collect()
}

/// Both commands. `verdict` offers every [`Verdict`], `Ban` included,
/// even though submission only accepts the non-ban ones.
pub fn command_definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition {
            name: INFRACTION_COMMAND,
            description: "Add a player infraction to the sheet.",
            kind: CHAT_INPUT,
            options: vec![
                string_option(option::ALDERON_NAME, "Player's Alderon Name", true),
                string_option(
                    option::ALDERON_ID,
                    "Player's Alderon ID in 000-000-000 format.",
                    true,
                ),
                string_option(option::RULES_BROKEN, "Rule(s) broken", true),
                string_option(option::TICKET_ID, "Associated ticket ID", true),
                OptionDefinition {
                    choices: choices(Verdict::ALL.map(Verdict::as_str)),
                    ..string_option(
                        option::VERDICT,
                        "Outcome: Reminder, Strike, or Warning",
                        true,
                    )
                },
                OptionDefinition {
                    choices: choices(PlayerInformed::ALL.map(PlayerInformed::as_str)),
                    ..string_option(
                        option::PLAYER_INFORMED,
                        "Whether the player was informed: Yes or No",
                        true,
                    )
                },
            ],
        },
        CommandDefinition {
            name: CALL_INFRACTIONS_COMMAND,
            description: "Retrieve infractions by Alderon Name or Alderon ID.",
            kind: CHAT_INPUT,
            options: vec![
                string_option(option::ALDERON_NAME, "Player's Alderon Name", false),
                string_option(
                    option::ALDERON_ID,
                    "Player's Alderon ID in 000-000-000 format",
                    false,
                ),
            ],
        },
    ]
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("command registration request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Discord rejected command registration (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Where and as whom to register.
#[derive(Clone)]
pub struct RegistrationTarget<'a> {
    pub api_base: &'a str,
    pub application_id: &'a str,
    /// `None` targets the global command list.
    pub guild_id: Option<u64>,
    pub bot_token: &'a str,
}

impl RegistrationTarget<'_> {
    pub fn url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        match self.guild_id {
            Some(guild) => format!(
                "{base}/applications/{}/guilds/{guild}/commands",
                self.application_id
            ),
            None => format!("{base}/applications/{}/commands", self.application_id),
        }
    }
}

/// Bulk-overwrite the application's commands with [`command_definitions`].
/// Returns how many definitions Discord accepted.
pub async fn register_commands(
    http: &reqwest::Client,
    target: &RegistrationTarget<'_>,
) -> Result<usize, RegistrationError> {
    let definitions = command_definitions();
    let response = http
        .put(target.url())
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", target.bot_token),
        )
        .json(&definitions)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RegistrationError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let accepted: Vec<serde_json::Value> = response.json().await?;
    match target.guild_id {
        Some(guild_id) => tracing::info!(guild_id, count = accepted.len(), "guild commands synced"),
        None => tracing::info!(count = accepted.len(), "global commands synced"),
    }
    Ok(accepted.len())
}
