//! `infraction` and `callinfractions` command handlers.
//!
//! Each handler runs permission gate → validation gate → one store call →
//! response formatting. Every outcome, including errors, ends up as a
//! private [`CommandResponse`] via [`respond`]; nothing
//! here is allowed to take the process down.

use chrono::{DateTime, Utc};

use crate::schema::{
    InfractionRecord, PlayerInformed, Verdict, generate_timestamp, normalize_text,
    validate_alderon_id,
};
use crate::store::{RecordStore, SheetBackend, StoreError};

/// Output longer than this many characters is truncated.
pub const OUTPUT_CHAR_BUDGET: usize = 1800;

/// Lines kept when the output is truncated.
pub const TRUNCATED_LINE_COUNT: usize = 25;

/// Discord's message length cap. A truncated listing, summary included,
/// never exceeds it.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

pub const MSG_RECORDED: &str = "Infraction recorded.";
pub const MSG_NONE_FOUND: &str = "No infractions found.";
pub const MSG_PERMISSION_DENIED: &str = "You do not have permission to use this command.";

/// The member invoking a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    /// Name shown in the guild; recorded in the Admin column.
    pub display_name: String,
    /// Guild role ids, or `None` when the command was not invoked by a
    /// guild member (e.g. from a DM).
    pub role_ids: Option<Vec<String>>,
}

/// Decides whether a caller holds the staff capability.
pub trait StaffPolicy: Send + Sync {
    fn has_staff_capability(&self, caller: &Caller) -> bool;
}

impl<F> StaffPolicy for F
where
    F: Fn(&Caller) -> bool + Send + Sync,
{
    fn has_staff_capability(&self, caller: &Caller) -> bool {
        self(caller)
    }
}

/// Staff are guild members holding one configured role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffRole {
    role_id: String,
}

impl StaffRole {
    pub fn new(role_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
        }
    }
}

impl StaffPolicy for StaffRole {
    fn has_staff_capability(&self, caller: &Caller) -> bool {
        caller
            .role_ids
            .as_ref()
            .is_some_and(|roles| roles.iter().any(|r| *r == self.role_id))
    }
}

/// Raw `infraction` command options, exactly as the caller supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfractionSubmission {
    pub alderon_name: String,
    pub alderon_id: String,
    pub rules_broken: String,
    pub ticket_id: String,
    pub verdict: String,
    pub player_informed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Alderon ID must be exactly 000-000-000.")]
    InvalidAlderonId,

    #[error("Invalid verdict value. Accepted verdicts: Reminder, Strike, Warning.")]
    InvalidVerdict,

    #[error("Invalid player informed value. Use Yes or No.")]
    InvalidPlayerInformed,

    #[error("Provide an Alderon Name or Alderon ID.")]
    MissingLookupKey,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("caller lacks the staff capability")]
    PermissionDenied,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Text shown privately to the caller.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => MSG_PERMISSION_DENIED.to_string(),
            Self::Validation(e) => e.to_string(),
            Self::Store(StoreError::Append(m)) => format!("Failed to write to sheet: {m}"),
            Self::Store(StoreError::Query(m)) => format!("Failed to query sheet: {m}"),
            Self::Store(StoreError::HeaderSync(m)) => format!("Failed to prepare sheet: {m}"),
        }
    }
}

/// Successful `callinfractions` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Zero matching rows. Not an error.
    NoneFound,
    /// Formatted (possibly truncated) listing.
    Found { text: String, total: usize },
}

/// Reply for the dispatcher. Always private to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub content: String,
    pub ephemeral: bool,
}

impl CommandResponse {
    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Outcome of either command before it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Recorded,
    Queried(QueryOutcome),
}

pub struct CommandHandlers<B, P> {
    store: RecordStore<B>,
    policy: P,
}

impl<B: SheetBackend, P: StaffPolicy> CommandHandlers<B, P> {
    pub fn new(store: RecordStore<B>, policy: P) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &RecordStore<B> {
        &self.store
    }

    fn authorize(&self, caller: &Caller) -> Result<(), CommandError> {
        if self.policy.has_staff_capability(caller) {
            Ok(())
        } else {
            tracing::debug!(user_id = %caller.user_id, "Command rejected: not staff");
            Err(CommandError::PermissionDenied)
        }
    }

    pub async fn submit_infraction(
        &self,
        caller: &Caller,
        submission: &InfractionSubmission,
    ) -> Result<CommandOutcome, CommandError> {
        self.submit_infraction_at(caller, submission, Utc::now())
            .await
    }

    /// [`Self::submit_infraction`] with an explicit clock.
    pub async fn submit_infraction_at(
        &self,
        caller: &Caller,
        submission: &InfractionSubmission,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome, CommandError> {
        self.authorize(caller)?;

        let record = build_record(caller, submission, now)?;

        if let Err(e) = self.store.append_infraction(&record).await {
            tracing::warn!("Failed to append infraction: {e}");
            return Err(e.into());
        }

        tracing::info!(
            alderon_id = %record.alderon_id,
            verdict = %record.verdict,
            admin = %record.admin,
            "Infraction recorded"
        );
        Ok(CommandOutcome::Recorded)
    }

    pub async fn query_infractions(
        &self,
        caller: &Caller,
        alderon_name: Option<&str>,
        alderon_id: Option<&str>,
    ) -> Result<CommandOutcome, CommandError> {
        self.authorize(caller)?;

        let alderon_name = alderon_name.filter(|s| !s.is_empty());
        let alderon_id = alderon_id.filter(|s| !s.is_empty());

        if alderon_name.is_none() && alderon_id.is_none() {
            return Err(ValidationError::MissingLookupKey.into());
        }
        if let Some(id) = alderon_id
            && !validate_alderon_id(id)
        {
            return Err(ValidationError::InvalidAlderonId.into());
        }

        let rows = match self.store.query_by_alderon(alderon_name, alderon_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to query infractions: {e}");
                return Err(e.into());
            }
        };

        tracing::debug!(matches = rows.len(), "Infraction query finished");

        if rows.is_empty() {
            return Ok(CommandOutcome::Queried(QueryOutcome::NoneFound));
        }

        let lines: Vec<String> = rows.iter().map(|r| r.summary_line()).collect();
        Ok(CommandOutcome::Queried(QueryOutcome::Found {
            text: format_listing(&lines),
            total: lines.len(),
        }))
    }
}

/// Render any handler result as the private reply.
pub fn respond(result: Result<CommandOutcome, CommandError>) -> CommandResponse {
    match result {
        Ok(CommandOutcome::Recorded) => CommandResponse::private(MSG_RECORDED),
        Ok(CommandOutcome::Queried(QueryOutcome::NoneFound)) => {
            CommandResponse::private(MSG_NONE_FOUND)
        }
        Ok(CommandOutcome::Queried(QueryOutcome::Found { text, .. })) => {
            CommandResponse::private(text)
        }
        Err(e) => CommandResponse::private(e.user_message()),
    }
}

/// Validate `submission` and turn it into a record stamped at `now`.
///
/// The Alderon ID is checked as given, so surrounding whitespace fails.
pub fn build_record(
    caller: &Caller,
    submission: &InfractionSubmission,
    now: DateTime<Utc>,
) -> Result<InfractionRecord, ValidationError> {
    if !validate_alderon_id(&submission.alderon_id) {
        return Err(ValidationError::InvalidAlderonId);
    }
    let verdict = Verdict::parse(&submission.verdict)
        .filter(|v| v.is_submittable())
        .ok_or(ValidationError::InvalidVerdict)?;
    let player_informed = PlayerInformed::parse(&submission.player_informed)
        .ok_or(ValidationError::InvalidPlayerInformed)?;

    Ok(InfractionRecord {
        timestamp: generate_timestamp(now),
        alderon_name: normalize_text(&submission.alderon_name),
        alderon_id: submission.alderon_id.clone(),
        rules_broken: normalize_text(&submission.rules_broken),
        ticket_id: normalize_text(&submission.ticket_id),
        verdict,
        admin: caller.display_name.clone(),
        player_informed,
    })
}

/// Join `lines`; past [`OUTPUT_CHAR_BUDGET`] keep at most the first
/// [`TRUNCATED_LINE_COUNT`] lines and summarise the rest.
///
/// Kept lines are dropped from the end until the rows and the
/// `...and N more.` line fit in [`MESSAGE_CHAR_LIMIT`]; N counts every
/// row not shown.
pub fn format_listing(lines: &[String]) -> String {
    let output = lines.join("\n");
    if output.chars().count() <= OUTPUT_CHAR_BUDGET {
        return output;
    }

    let mut kept = lines.len().min(TRUNCATED_LINE_COUNT);
    loop {
        let omitted = lines.len() - kept;
        let mut truncated = lines[..kept].join("\n");
        if omitted > 0 {
            if !truncated.is_empty() {
                truncated.push('\n');
            }
            truncated.push_str(&format!("...and {omitted} more."));
        }
        if kept == 0 || truncated.chars().count() <= MESSAGE_CHAR_LIMIT {
            return truncated;
        }
        kept -= 1;
    }
}
