//! Interaction payloads and command dispatch.

pub use anthrax_records::handlers::MESSAGE_CHAR_LIMIT;
use anthrax_records::{
    Caller, CommandHandlers, CommandResponse, InfractionSubmission, SheetBackend, StaffPolicy,
    respond,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{CALL_INFRACTIONS_COMMAND, INFRACTION_COMMAND, option};

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

pub const RESPONSE_PONG: u8 = 1;
pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;

/// Message flag: visible only to the invoking user.
pub const FLAG_EPHEMERAL: u64 = 1 << 6;

pub const MSG_UNKNOWN_COMMAND: &str = "Unknown command.";
pub const MSG_UNSUPPORTED_INTERACTION: &str = "Unsupported interaction.";

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<CommandData>,
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Present for invocations inside a guild.
    #[serde(default)]
    pub member: Option<Member>,
    /// Present for invocations in DMs.
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

impl User {
    fn preferred_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

impl Interaction {
    /// The invoking user. Only guild members carry roles; a DM invocation
    /// yields `role_ids: None`.
    pub fn caller(&self) -> Caller {
        if let Some(member) = &self.member {
            let user = member.user.as_ref();
            let display_name = member
                .nick
                .clone()
                .or_else(|| user.map(|u| u.preferred_name().to_string()))
                .unwrap_or_default();
            return Caller {
                user_id: user.map(|u| u.id.clone()).unwrap_or_default(),
                display_name,
                role_ids: Some(member.roles.clone()),
            };
        }

        match &self.user {
            Some(user) => Caller {
                user_id: user.id.clone(),
                display_name: user.preferred_name().to_string(),
                role_ids: None,
            },
            None => Caller {
                user_id: String::new(),
                display_name: String::new(),
                role_ids: None,
            },
        }
    }
}

impl CommandData {
    /// String value of a top-level option, if supplied.
    pub fn string_option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
            .and_then(Value::as_str)
    }

    fn submission(&self) -> InfractionSubmission {
        let text = |name: &str| self.string_option(name).unwrap_or_default().to_string();
        InfractionSubmission {
            alderon_name: text(option::ALDERON_NAME),
            alderon_id: text(option::ALDERON_ID),
            rules_broken: text(option::RULES_BROKEN),
            ticket_id: text(option::TICKET_ID),
            verdict: text(option::VERDICT),
            player_informed: text(option::PLAYER_INFORMED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    pub allowed_mentions: AllowedMentions,
}

/// Mentions typed into command options must not ping anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn message(response: CommandResponse) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(MessageData {
                content: clamp_content(&response.content),
                flags: response.ephemeral.then_some(FLAG_EPHEMERAL),
                allowed_mentions: AllowedMentions::default(),
            }),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.content.as_str())
    }
}

/// Cut `content` to [`MESSAGE_CHAR_LIMIT`] characters.
pub fn clamp_content(content: &str) -> String {
    match content.char_indices().nth(MESSAGE_CHAR_LIMIT) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content.to_string(),
    }
}

/// Routes verified interactions to the record handlers.
pub struct Dispatcher<B, P> {
    handlers: CommandHandlers<B, P>,
}

impl<B: SheetBackend, P: StaffPolicy> Dispatcher<B, P> {
    pub fn new(handlers: CommandHandlers<B, P>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &CommandHandlers<B, P> {
        &self.handlers
    }

    pub async fn dispatch(&self, interaction: &Interaction) -> InteractionResponse {
        match interaction.kind {
            INTERACTION_PING => InteractionResponse::pong(),
            INTERACTION_APPLICATION_COMMAND => match &interaction.data {
                Some(data) => self.run_command(interaction, data).await,
                None => {
                    InteractionResponse::message(CommandResponse::private(MSG_UNKNOWN_COMMAND))
                }
            },
            other => {
                tracing::debug!(kind = other, "ignoring unsupported interaction type");
                InteractionResponse::message(CommandResponse::private(MSG_UNSUPPORTED_INTERACTION))
            }
        }
    }

    async fn run_command(&self, interaction: &Interaction, data: &CommandData) -> InteractionResponse {
        let caller = interaction.caller();
        tracing::debug!(command = %data.name, user_id = %caller.user_id, "dispatching command");

        let response = match data.name.as_str() {
            INFRACTION_COMMAND => respond(
                self.handlers
                    .submit_infraction(&caller, &data.submission())
                    .await,
            ),
            CALL_INFRACTIONS_COMMAND => respond(
                self.handlers
                    .query_infractions(
                        &caller,
                        data.string_option(option::ALDERON_NAME),
                        data.string_option(option::ALDERON_ID),
                    )
                    .await,
            ),
            unknown => {
                tracing::warn!(command = unknown, "received unknown command");
                CommandResponse::private(MSG_UNKNOWN_COMMAND)
            }
        };
        InteractionResponse::message(response)
    }
}
