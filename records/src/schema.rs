//! Infraction schema and field validation.
//!
//! The sheet has a fixed column order ([`SHEET_HEADERS`]). Validators are
//! pure and report failure as `false`; the command layer decides how to
//! surface it.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use regex_lite::Regex;

pub const HEADER_TIMESTAMP: &str = "Timestamp";
pub const HEADER_ALDERON_NAME: &str = "Alderon Name";
pub const HEADER_ALDERON_ID: &str = "Alderon ID";
pub const HEADER_RULES_BROKEN: &str = "Rule(s) Broken";
pub const HEADER_TICKET_ID: &str = "Ticket ID";
pub const HEADER_VERDICT: &str = "Verdict";
pub const HEADER_ADMIN: &str = "Admin";
pub const HEADER_PLAYER_INFORMED: &str = "Player Informed?";

/// Canonical header row, in column order.
pub const SHEET_HEADERS: [&str; 8] = [
    HEADER_TIMESTAMP,
    HEADER_ALDERON_NAME,
    HEADER_ALDERON_ID,
    HEADER_RULES_BROKEN,
    HEADER_TICKET_ID,
    HEADER_VERDICT,
    HEADER_ADMIN,
    HEADER_PLAYER_INFORMED,
];

/// Display format for the Timestamp column, rendered in US Eastern time.
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y : %I:%M %p";

static ALDERON_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}-[0-9]{3}-[0-9]{3}$").ok());

/// True iff `value` is exactly `DDD-DDD-DDD`. Surrounding whitespace fails.
pub fn validate_alderon_id(value: &str) -> bool {
    ALDERON_ID_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

/// True iff `value` may be submitted as a verdict.
///
/// `Ban` is offered by the command but is not part of the submission set.
pub fn validate_verdict(value: &str) -> bool {
    Verdict::parse(value).is_some_and(Verdict::is_submittable)
}

pub fn validate_player_informed(value: &str) -> bool {
    PlayerInformed::parse(value).is_some()
}

/// Trim leading and trailing whitespace. No case folding, no length limit.
pub fn normalize_text(value: &str) -> String {
    value.trim().to_string()
}

/// Render `now` for the Timestamp column, e.g. `03/09/2025 : 01:30 AM`.
pub fn generate_timestamp(now: DateTime<Utc>) -> String {
    now.with_timezone(&New_York)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Outcome recorded against a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Reminder,
    Strike,
    Warning,
    Ban,
}

impl Verdict {
    /// Every verdict the command offers, in display order.
    pub const ALL: [Verdict; 4] = [
        Verdict::Reminder,
        Verdict::Strike,
        Verdict::Warning,
        Verdict::Ban,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "Reminder",
            Self::Strike => "Strike",
            Self::Warning => "Warning",
            Self::Ban => "Ban",
        }
    }

    /// Whether the submission path accepts this verdict.
    pub fn is_submittable(self) -> bool {
        !matches!(self, Self::Ban)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerInformed {
    Yes,
    No,
}

impl PlayerInformed {
    pub const ALL: [PlayerInformed; 2] = [PlayerInformed::Yes, PlayerInformed::No];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Yes" => Some(Self::Yes),
            "No" => Some(Self::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

impl std::fmt::Display for PlayerInformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated infraction, ready to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfractionRecord {
    pub timestamp: String,
    pub alderon_name: String,
    pub alderon_id: String,
    pub rules_broken: String,
    pub ticket_id: String,
    pub verdict: Verdict,
    pub admin: String,
    pub player_informed: PlayerInformed,
}

impl InfractionRecord {
    /// Positional values matching [`SHEET_HEADERS`].
    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.alderon_name.clone(),
            self.alderon_id.clone(),
            self.rules_broken.clone(),
            self.ticket_id.clone(),
            self.verdict.as_str().to_string(),
            self.admin.clone(),
            self.player_informed.as_str().to_string(),
        ]
    }
}

/// Header name -> column index, built from a fetched header row.
///
/// When a header appears twice the last occurrence wins.
pub fn header_index(headers: &[String]) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.clone(), i))
        .collect()
}

/// A row read back from the sheet, resolved by header name.
///
/// Cells are kept as text: rows may have been edited by hand, so verdicts
/// outside the submission set (or anything else) are passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfractionRow {
    pub timestamp: String,
    pub alderon_name: String,
    pub alderon_id: String,
    pub rules_broken: String,
    pub ticket_id: String,
    pub verdict: String,
    pub admin: String,
    pub player_informed: String,
}

impl InfractionRow {
    /// Resolve `cells` through `index`. Missing columns and short rows
    /// (the Sheets API drops trailing empty cells) read as empty strings.
    pub fn from_cells(index: &HashMap<String, usize>, cells: &[String]) -> Self {
        let cell = |header: &str| {
            index
                .get(header)
                .and_then(|&i| cells.get(i))
                .cloned()
                .unwrap_or_default()
        };
        Self {
            timestamp: cell(HEADER_TIMESTAMP),
            alderon_name: cell(HEADER_ALDERON_NAME),
            alderon_id: cell(HEADER_ALDERON_ID),
            rules_broken: cell(HEADER_RULES_BROKEN),
            ticket_id: cell(HEADER_TICKET_ID),
            verdict: cell(HEADER_VERDICT),
            admin: cell(HEADER_ADMIN),
            player_informed: cell(HEADER_PLAYER_INFORMED),
        }
    }

    /// Values in canonical column order.
    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.alderon_name.clone(),
            self.alderon_id.clone(),
            self.rules_broken.clone(),
            self.ticket_id.clone(),
            self.verdict.clone(),
            self.admin.clone(),
            self.player_informed.clone(),
        ]
    }

    /// Single-line summary used by `callinfractions`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} | {} | {} | {} | {} | Ticket {} | {}",
            self.timestamp,
            self.alderon_name,
            self.alderon_id,
            self.verdict,
            self.player_informed,
            self.ticket_id,
            self.rules_broken
        )
    }
}

impl From<&InfractionRecord> for InfractionRow {
    fn from(record: &InfractionRecord) -> Self {
        Self {
            timestamp: record.timestamp.clone(),
            alderon_name: record.alderon_name.clone(),
            alderon_id: record.alderon_id.clone(),
            rules_broken: record.rules_broken.clone(),
            ticket_id: record.ticket_id.clone(),
            verdict: record.verdict.as_str().to_string(),
            admin: record.admin.clone(),
            player_informed: record.player_informed.as_str().to_string(),
        }
    }
}
