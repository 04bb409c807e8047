//! Spreadsheet-backed infraction store.
//!
//! The store owns the mapping between [`SHEET_HEADERS`] and a remote table
//! reached through [`SheetBackend`]. Row 1 is the header row; every other
//! row is one infraction, appended in submission order and never edited.
//!
//! Rows are matched by content only. Row numbers shift whenever someone
//! sorts or edits the live sheet, so nothing here stores or returns them.

use async_trait::async_trait;

use crate::schema::{
    HEADER_ALDERON_ID, HEADER_ALDERON_NAME, InfractionRecord, InfractionRow, SHEET_HEADERS,
    header_index,
};

/// Minimum row capacity requested when the grid has to be expanded.
pub const DEFAULT_ROW_CAPACITY: u32 = 100;

/// Error returned by a backend. Transport crates box their own error type.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Row/column capacity of the backing tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub rows: u32,
    pub columns: u32,
}

/// Remote tabular backend (one tab of one spreadsheet).
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Values of row 1. Empty when the tab is blank.
    async fn header_row(&self) -> Result<Vec<String>, BackendError>;

    /// Every row of the tab including the header row, in table order.
    async fn all_rows(&self) -> Result<Vec<Vec<String>>, BackendError>;

    /// Overwrite row 1 with `headers`, starting at column A.
    async fn write_header_row(&self, headers: &[String]) -> Result<(), BackendError>;

    /// Append one row after the last non-empty row.
    async fn append_row(&self, values: &[String]) -> Result<(), BackendError>;

    async fn capacity(&self) -> Result<GridSize, BackendError>;

    async fn resize(&self, size: GridSize) -> Result<(), BackendError>;
}

/// Errors from the record store. Each carries the backend's message.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("header sync failed: {0}")]
    HeaderSync(String),

    #[error("append failed: {0}")]
    Append(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// The backend's message without the operation prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::HeaderSync(m) | Self::Append(m) | Self::Query(m) => m,
        }
    }
}

/// What `ensure_headers` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSync {
    /// Row 1 already matched; nothing was written.
    Unchanged,
    /// Row 1 was rewritten (after growing the grid when `resized`).
    Repaired { resized: bool },
}

/// Append/query access to the infraction tab.
pub struct RecordStore<B> {
    backend: B,
}

impl<B: SheetBackend> RecordStore<B> {
    /// Wrap `backend` and make sure its header row is canonical before any
    /// append or query is accepted.
    pub async fn open(backend: B) -> Result<Self, StoreError> {
        let store = Self { backend };
        store.ensure_headers().await?;
        Ok(store)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Compare row 1 with [`SHEET_HEADERS`] and rewrite it on any mismatch.
    ///
    /// With correct headers in place this issues no write at all.
    pub async fn ensure_headers(&self) -> Result<HeaderSync, StoreError> {
        let existing = self
            .backend
            .header_row()
            .await
            .map_err(|e| StoreError::HeaderSync(e.to_string()))?;

        if existing.iter().map(String::as_str).eq(SHEET_HEADERS) {
            tracing::debug!("Header row already canonical");
            return Ok(HeaderSync::Unchanged);
        }

        tracing::info!(
            found = ?existing,
            "Header row does not match the canonical schema; rewriting"
        );

        let required_columns = SHEET_HEADERS.len() as u32;
        let current = self
            .backend
            .capacity()
            .await
            .map_err(|e| StoreError::HeaderSync(e.to_string()))?;

        let resized = current.columns < required_columns || current.rows < 1;
        if resized {
            let target = GridSize {
                rows: current.rows.max(DEFAULT_ROW_CAPACITY),
                columns: current.columns.max(required_columns),
            };
            tracing::info!(
                rows = target.rows,
                columns = target.columns,
                "Expanding sheet capacity before header write"
            );
            self.backend
                .resize(target)
                .await
                .map_err(|e| StoreError::HeaderSync(e.to_string()))?;
        }

        // Blank out stale cells past column H so the next read matches.
        let mut headers: Vec<String> = SHEET_HEADERS.iter().map(ToString::to_string).collect();
        if existing.len() > headers.len() {
            headers.resize(existing.len(), String::new());
        }
        self.backend
            .write_header_row(&headers)
            .await
            .map_err(|e| StoreError::HeaderSync(e.to_string()))?;

        Ok(HeaderSync::Repaired { resized })
    }

    /// Append `record` as a new row. Duplicate submissions produce duplicate rows.
    pub async fn append_infraction(&self, record: &InfractionRecord) -> Result<(), StoreError> {
        self.backend
            .append_row(&record.to_values())
            .await
            .map_err(|e| StoreError::Append(e.to_string()))
    }

    /// Rows whose Alderon Name equals `name`, or else whose Alderon ID
    /// equals `alderon_id`, in table order.
    ///
    /// The ID is only consulted for rows the name did not select, and only
    /// when a name was not given at all: when both are supplied the name
    /// alone decides. Columns are located through the fetched header row,
    /// so a reordered sheet is still read correctly.
    pub async fn query_by_alderon(
        &self,
        name: Option<&str>,
        alderon_id: Option<&str>,
    ) -> Result<Vec<InfractionRow>, StoreError> {
        let mut rows = self
            .backend
            .all_rows()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .into_iter();

        let Some(headers) = rows.next() else {
            return Ok(Vec::new());
        };
        let index = header_index(&headers);
        let name_col = index.get(HEADER_ALDERON_NAME).copied();
        let id_col = index.get(HEADER_ALDERON_ID).copied();

        let cell_equals = |cells: &[String], col: Option<usize>, expected: &str| {
            col.and_then(|i| cells.get(i))
                .is_some_and(|value| value == expected)
        };

        let matches = rows
            .filter(|cells| {
                if let Some(name) = name {
                    cell_equals(cells, name_col, name)
                } else if let Some(alderon_id) = alderon_id {
                    cell_equals(cells, id_col, alderon_id)
                } else {
                    false
                }
            })
            .map(|cells| InfractionRow::from_cells(&index, &cells))
            .collect();

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::memory::MemorySheet;
    use crate::schema::{PlayerInformed, Verdict};
    use pretty_assertions::assert_eq;

    fn record(name: &str, id: &str) -> InfractionRecord {
        InfractionRecord {
            timestamp: "01/15/2024 : 01:05 PM".to_string(),
            alderon_name: name.to_string(),
            alderon_id: id.to_string(),
            rules_broken: "Rule 2".to_string(),
            ticket_id: "T-1".to_string(),
            verdict: Verdict::Warning,
            admin: "Mod".to_string(),
            player_informed: PlayerInformed::Yes,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn open_writes_headers_into_blank_sheet() {
        let sheet = MemorySheet::new();
        let store = RecordStore::open(sheet).await.unwrap();

        assert_eq!(store.backend().header_writes(), 1);
        assert_eq!(store.backend().rows()[0], strings(&SHEET_HEADERS));
    }

    #[tokio::test]
    async fn ensure_headers_is_idempotent() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        assert_eq!(
            store.ensure_headers().await.unwrap(),
            HeaderSync::Unchanged
        );
        assert_eq!(store.backend().header_writes(), 1);
        assert_eq!(store.backend().resizes(), 0);
    }

    #[tokio::test]
    async fn canonical_headers_cause_no_write() {
        let sheet = MemorySheet::with_rows(vec![strings(&SHEET_HEADERS)]);
        let store = RecordStore::open(sheet).await.unwrap();
        assert_eq!(store.backend().header_writes(), 0);
        assert_eq!(store.backend().resizes(), 0);
    }

    #[tokio::test]
    async fn reordered_headers_are_rewritten() {
        let mut headers = strings(&SHEET_HEADERS);
        headers.swap(1, 2);
        let store = RecordStore::open(MemorySheet::with_rows(vec![headers]))
            .await
            .unwrap();
        assert_eq!(store.backend().header_writes(), 1);
        assert_eq!(store.backend().rows()[0], strings(&SHEET_HEADERS));
    }

    #[tokio::test]
    async fn stale_cells_past_the_schema_are_cleared() {
        let mut headers = strings(&SHEET_HEADERS);
        headers.push("Notes".to_string());
        let store = RecordStore::open(MemorySheet::with_rows(vec![headers]))
            .await
            .unwrap();

        assert_eq!(store.backend().rows()[0], strings(&SHEET_HEADERS));
        assert_eq!(
            store.ensure_headers().await.unwrap(),
            HeaderSync::Unchanged
        );
        assert_eq!(store.backend().header_writes(), 1);
    }

    #[tokio::test]
    async fn narrow_grid_is_expanded_before_header_write() {
        let sheet = MemorySheet::new().with_capacity(GridSize {
            rows: 20,
            columns: 5,
        });
        let store = RecordStore::open(sheet).await.unwrap();

        assert_eq!(store.backend().resizes(), 1);
        assert_eq!(
            store.backend().current_capacity(),
            GridSize {
                rows: DEFAULT_ROW_CAPACITY,
                columns: 8
            }
        );
    }

    #[tokio::test]
    async fn wide_grid_is_never_shrunk() {
        let sheet = MemorySheet::new().with_capacity(GridSize {
            rows: 500,
            columns: 26,
        });
        let store = RecordStore::open(sheet).await.unwrap();
        assert_eq!(store.backend().resizes(), 0);
        assert_eq!(store.backend().current_capacity().columns, 26);
    }

    #[tokio::test]
    async fn append_then_query_round_trips() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        let rec = record("Alice", "123-456-789");
        store.append_infraction(&rec).await.unwrap();

        let rows = store.query_by_alderon(Some("Alice"), None).await.unwrap();
        assert_eq!(rows, vec![InfractionRow::from(&rec)]);
        assert_eq!(rows[0].to_values(), rec.to_values());
    }

    #[tokio::test]
    async fn duplicate_appends_are_kept() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        let rec = record("Alice", "123-456-789");
        store.append_infraction(&rec).await.unwrap();
        store.append_infraction(&rec).await.unwrap();

        let rows = store.query_by_alderon(Some("Alice"), None).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn query_on_header_only_sheet_is_empty() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        let rows = store
            .query_by_alderon(None, Some("123-456-789"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn query_by_id_preserves_table_order() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        let mut first = record("Alice", "123-456-789");
        first.ticket_id = "T-1".to_string();
        let other = record("Bob", "999-999-999");
        let mut second = record("Alicia", "123-456-789");
        second.ticket_id = "T-2".to_string();
        for r in [&first, &other, &second] {
            store.append_infraction(r).await.unwrap();
        }

        let rows = store
            .query_by_alderon(None, Some("123-456-789"))
            .await
            .unwrap();
        let tickets: Vec<&str> = rows.iter().map(|r| r.ticket_id.as_str()).collect();
        assert_eq!(tickets, vec!["T-1", "T-2"]);
    }

    #[tokio::test]
    async fn name_takes_precedence_over_id_when_both_given() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        store
            .append_infraction(&record("Bob", "123-456-789"))
            .await
            .unwrap();

        let rows = store
            .query_by_alderon(Some("Alice"), Some("123-456-789"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn query_reads_reordered_columns_by_header() {
        // Sheet edited externally after startup: name and ID columns swapped.
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        let mut headers = strings(&SHEET_HEADERS);
        headers.swap(1, 2);
        let cells = strings(&[
            "ts",
            "555-555-555",
            "Carol",
            "Rule 9",
            "T-9",
            "Ban",
            "Mod",
            "No",
        ]);
        store.backend().replace_rows(vec![headers, cells]);

        let rows = store.query_by_alderon(Some("Carol"), None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].alderon_id, "555-555-555");
        assert_eq!(rows[0].verdict, "Ban");
    }

    #[tokio::test]
    async fn backend_failures_surface_as_store_errors() {
        let store = RecordStore::open(MemorySheet::new()).await.unwrap();
        store.backend().fail_with("quota exceeded");

        let err = store
            .append_infraction(&record("Alice", "123-456-789"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Append(_)));
        assert_eq!(err.message(), "quota exceeded");

        let err = store.query_by_alderon(Some("Alice"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[tokio::test]
    async fn open_fails_when_headers_cannot_be_read() {
        let sheet = MemorySheet::new();
        sheet.fail_with("permission denied");
        let err = RecordStore::open(sheet).await.err().unwrap();
        assert!(matches!(err, StoreError::HeaderSync(_)));
        assert!(err.to_string().contains("permission denied"));
    }
}
