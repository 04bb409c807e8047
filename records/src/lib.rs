//! `anthrax-records`: infraction log core.
//!
//! Staff record player infractions as rows of a shared spreadsheet and
//! look them up again by Alderon name or ID. This crate owns everything
//! that does not depend on a particular transport:
//!
//! - [`schema`]: canonical column order, field validation, timestamps
//! - [`store`]: the [`store::SheetBackend`] seam and the [`store::RecordStore`]
//!   that keeps the header row healthy, appends and queries
//! - [`handlers`]: permission gate, validation gate and response formatting
//!   for the `infraction` and `callinfractions` commands
//! - [`memory`]: an in-process backend used by tests and dry runs

pub mod handlers;
pub mod memory;
pub mod schema;
pub mod store;

pub use handlers::{
    Caller, CommandError, CommandHandlers, CommandOutcome, CommandResponse, InfractionSubmission,
    QueryOutcome, StaffPolicy, StaffRole, ValidationError, respond,
};
pub use schema::{InfractionRecord, InfractionRow, PlayerInformed, SHEET_HEADERS, Verdict};
pub use store::{
    BackendError, DEFAULT_ROW_CAPACITY, GridSize, HeaderSync, RecordStore, SheetBackend, StoreError,
};
