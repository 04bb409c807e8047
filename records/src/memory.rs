//! In-process [`SheetBackend`] used by tests and local dry runs.
//!
//! Mirrors the parts of Google Sheets behaviour the store relies on:
//! trailing empty cells are dropped on read, header writes overwrite
//! from column A, appends go after the last row. Every write is counted
//! so tests can assert on exactly which calls were issued.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::store::{BackendError, GridSize, SheetBackend};

/// Capacity of a freshly created Google sheet.
const DEFAULT_CAPACITY: GridSize = GridSize {
    rows: 1000,
    columns: 26,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MemorySheetError(String);

#[derive(Default)]
struct State {
    rows: Vec<Vec<String>>,
    capacity: Option<GridSize>,
    failure: Option<String>,
}

pub struct MemorySheet {
    state: Mutex<State>,
    header_writes: AtomicUsize,
    appends: AtomicUsize,
    resizes: AtomicUsize,
}

impl Default for MemorySheet {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySheet {
    /// A blank tab.
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// A tab pre-filled with `rows` (row 1 first).
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            state: Mutex::new(State {
                rows,
                capacity: Some(DEFAULT_CAPACITY),
                failure: None,
            }),
            header_writes: AtomicUsize::new(0),
            appends: AtomicUsize::new(0),
            resizes: AtomicUsize::new(0),
        }
    }

    pub fn with_capacity(self, capacity: GridSize) -> Self {
        self.lock().capacity = Some(capacity);
        self
    }

    /// Make every subsequent call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// Replace the whole table, bypassing the write counters.
    pub fn replace_rows(&self, rows: Vec<Vec<String>>) {
        self.lock().rows = rows;
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.lock().rows.iter().map(|r| trimmed(r)).collect()
    }

    pub fn current_capacity(&self) -> GridSize {
        self.lock().capacity.unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn header_writes(&self) -> usize {
        self.header_writes.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn resizes(&self) -> usize {
        self.resizes.load(Ordering::SeqCst)
    }

    /// Header writes, appends and resizes combined.
    pub fn total_writes(&self) -> usize {
        self.header_writes() + self.appends() + self.resizes()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<std::sync::MutexGuard<'_, State>, BackendError> {
        let state = self.lock();
        match &state.failure {
            Some(message) => Err(Box::new(MemorySheetError(message.clone()))),
            None => Ok(state),
        }
    }
}

/// Drop trailing empty cells, as the Sheets values API does.
fn trimmed(row: &[String]) -> Vec<String> {
    let len = row
        .iter()
        .rposition(|cell| !cell.is_empty())
        .map_or(0, |i| i + 1);
    row[..len].to_vec()
}

#[async_trait]
impl SheetBackend for MemorySheet {
    async fn header_row(&self) -> Result<Vec<String>, BackendError> {
        let state = self.check()?;
        Ok(state.rows.first().map(|r| trimmed(r)).unwrap_or_default())
    }

    async fn all_rows(&self) -> Result<Vec<Vec<String>>, BackendError> {
        let state = self.check()?;
        Ok(state.rows.iter().map(|r| trimmed(r)).collect())
    }

    async fn write_header_row(&self, headers: &[String]) -> Result<(), BackendError> {
        let mut state = self.check()?;
        match state.rows.first_mut() {
            Some(first) => {
                if first.len() < headers.len() {
                    first.resize(headers.len(), String::new());
                }
                first[..headers.len()].clone_from_slice(headers);
            }
            None => state.rows.push(headers.to_vec()),
        }
        self.header_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_row(&self, values: &[String]) -> Result<(), BackendError> {
        let mut state = self.check()?;
        state.rows.push(values.to_vec());
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn capacity(&self) -> Result<GridSize, BackendError> {
        let state = self.check()?;
        Ok(state.capacity.unwrap_or(DEFAULT_CAPACITY))
    }

    async fn resize(&self, size: GridSize) -> Result<(), BackendError> {
        let mut state = self.check()?;
        state.capacity = Some(size);
        self.resizes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn reads_drop_trailing_empty_cells() {
        let sheet = MemorySheet::with_rows(vec![vec![
            "a".to_string(),
            String::new(),
            "c".to_string(),
            String::new(),
        ]]);
        assert_eq!(sheet.header_row().await.unwrap(), vec!["a", "", "c"]);
    }

    #[tokio::test]
    async fn header_write_overwrites_from_column_a() {
        let sheet = MemorySheet::with_rows(vec![vec![
            "x".to_string(),
            "y".to_string(),
            "z".to_string(),
        ]]);
        sheet
            .write_header_row(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(sheet.rows()[0], vec!["a", "b", "z"]);
        assert_eq!(sheet.header_writes(), 1);
    }
}
