//! Sheets v4 / Drive v3 REST client bound to one worksheet tab.

use std::sync::Arc;

use anthrax_records::{BackendError, DEFAULT_ROW_CAPACITY, GridSize, SHEET_HEADERS, SheetBackend};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::auth::AccessTokenSource;
use crate::error::SheetsError;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const DRIVE_BASE_URL: &str = "https://www.googleapis.com";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// API roots. Overridden in tests to point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsEndpoints {
    pub sheets_base: String,
    pub drive_base: String,
}

impl Default for SheetsEndpoints {
    fn default() -> Self {
        Self {
            sheets_base: SHEETS_BASE_URL.to_string(),
            drive_base: DRIVE_BASE_URL.to_string(),
        }
    }
}

impl SheetsEndpoints {
    /// Both APIs served from one root.
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            sheets_base: base.clone(),
            drive_base: base,
        }
    }
}

/// Which spreadsheet to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    Id(String),
    /// Looked up through Drive; the first match visible to the service
    /// account wins.
    Name(String),
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Authenticated HTTP plumbing shared by lookup and data calls.
struct Transport {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    endpoints: SheetsEndpoints,
}

impl Transport {
    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, SheetsError> {
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, SheetsError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = if body.trim().is_empty() { "{}" } else { &body };
        serde_json::from_str(body).map_err(|e| SheetsError::InvalidResponse(e.to_string()))
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.endpoints.sheets_base.trim_end_matches('/'),
            urlencoding::encode(spreadsheet_id)
        )
    }

    async fn find_spreadsheet_by_name(&self, name: &str) -> Result<String, SheetsError> {
        let url = format!(
            "{}/drive/v3/files",
            self.endpoints.drive_base.trim_end_matches('/')
        );
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false",
            escape_drive_literal(name)
        );
        let builder = self.request(Method::GET, &url).await?.query(&[
            ("q", query.as_str()),
            ("fields", "files(id,name)"),
            ("pageSize", "10"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        let list: DriveFileList = self.send(builder).await?;
        if list.files.len() > 1 {
            tracing::warn!(
                name,
                matches = list.files.len(),
                "several spreadsheets share this name; using the first"
            );
        }
        list.files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| SheetsError::SpreadsheetNotFound(name.to_string()))
    }

    async fn sheet_properties(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, SheetsError> {
        let builder = self
            .request(Method::GET, &self.spreadsheet_url(spreadsheet_id))
            .await?
            .query(&[(
                "fields",
                "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))",
            )]);
        let meta: SpreadsheetMeta = self.send(builder).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Value,
    ) -> Result<BatchUpdateResponse, SheetsError> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id));
        let builder = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "requests": requests }));
        self.send(builder).await
    }
}

/// Worksheet handle implementing [`SheetBackend`].
pub struct SheetsClient {
    transport: Transport,
    spreadsheet_id: String,
    tab_title: String,
    sheet_id: i64,
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("tab_title", &self.tab_title)
            .field("sheet_id", &self.sheet_id)
            .finish_non_exhaustive()
    }
}

impl SheetsClient {
    /// Resolve the spreadsheet, then the tab by exact title. A missing tab
    /// is created with room for 100 rows and one column per header.
    pub async fn open(
        http: reqwest::Client,
        tokens: Arc<dyn AccessTokenSource>,
        endpoints: SheetsEndpoints,
        spreadsheet: SpreadsheetRef,
        tab: &str,
    ) -> Result<Self, SheetsError> {
        let transport = Transport {
            http,
            tokens,
            endpoints,
        };

        let spreadsheet_id = match spreadsheet {
            SpreadsheetRef::Id(id) => id,
            SpreadsheetRef::Name(name) => transport.find_spreadsheet_by_name(&name).await?,
        };

        let existing = transport
            .sheet_properties(&spreadsheet_id)
            .await?
            .into_iter()
            .find(|p| p.title == tab);

        let sheet_id = match existing {
            Some(props) => props.sheet_id,
            None => {
                tracing::info!(tab, "worksheet missing; creating it");
                add_tab(&transport, &spreadsheet_id, tab).await?
            }
        };

        tracing::info!(%spreadsheet_id, tab, sheet_id, "worksheet opened");
        Ok(Self {
            transport,
            spreadsheet_id,
            tab_title: tab.to_string(),
            sheet_id,
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn tab_title(&self) -> &str {
        &self.tab_title
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.transport.spreadsheet_url(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let builder = self
            .transport
            .request(Method::GET, &self.values_url(range))
            .await?
            .query(&[("majorDimension", "ROWS")]);
        let values: ValueRange = self.transport.send(builder).await?;
        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn grid_size(&self) -> Result<GridSize, SheetsError> {
        let props = self
            .transport
            .sheet_properties(&self.spreadsheet_id)
            .await?
            .into_iter()
            .find(|p| p.sheet_id == self.sheet_id)
            .ok_or_else(|| {
                SheetsError::InvalidResponse(format!("worksheet '{}' disappeared", self.tab_title))
            })?;
        let grid = props.grid_properties.unwrap_or_default();
        Ok(GridSize {
            rows: grid.row_count,
            columns: grid.column_count,
        })
    }
}

async fn add_tab(transport: &Transport, spreadsheet_id: &str, tab: &str) -> Result<i64, SheetsError> {
    let columns = SHEET_HEADERS.len() as u32;
    let response = transport
        .batch_update(
            spreadsheet_id,
            json!([{
                "addSheet": {
                    "properties": {
                        "title": tab,
                        "gridProperties": {
                            "rowCount": DEFAULT_ROW_CAPACITY,
                            "columnCount": columns,
                        }
                    }
                }
            }]),
        )
        .await?;

    response
        .replies
        .first()
        .and_then(|reply| reply.pointer("/addSheet/properties/sheetId"))
        .and_then(Value::as_i64)
        .ok_or_else(|| SheetsError::InvalidResponse("addSheet reply missing sheetId".to_string()))
}

#[async_trait]
impl SheetBackend for SheetsClient {
    async fn header_row(&self) -> Result<Vec<String>, BackendError> {
        let range = format!("{}!1:1", quote_tab(&self.tab_title));
        let mut rows = self.get_values(&range).await?;
        Ok(if rows.is_empty() {
            Vec::new()
        } else {
            rows.swap_remove(0)
        })
    }

    async fn all_rows(&self) -> Result<Vec<Vec<String>>, BackendError> {
        Ok(self.get_values(&quote_tab(&self.tab_title)).await?)
    }

    async fn write_header_row(&self, headers: &[String]) -> Result<(), BackendError> {
        let width = headers.len().max(1);
        let range = format!(
            "{}!A1:{}1",
            quote_tab(&self.tab_title),
            column_letter(width)
        );
        let builder = self
            .transport
            .request(Method::PUT, &self.values_url(&range))
            .await?
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [headers],
            }));
        let _: Value = self.transport.send(builder).await?;
        tracing::debug!(tab = %self.tab_title, width, "header row written");
        Ok(())
    }

    async fn append_row(&self, values: &[String]) -> Result<(), BackendError> {
        let values: Vec<String> = values.iter().map(|v| literal_cell(v.as_str())).collect();
        let range = quote_tab(&self.tab_title);
        let url = format!("{}:append", self.values_url(&range));
        let builder = self
            .transport
            .request(Method::POST, &url)
            .await?
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({
                "majorDimension": "ROWS",
                "values": [values],
            }));
        let _: Value = self.transport.send(builder).await?;
        Ok(())
    }

    async fn capacity(&self) -> Result<GridSize, BackendError> {
        Ok(self.grid_size().await?)
    }

    async fn resize(&self, size: GridSize) -> Result<(), BackendError> {
        self.transport
            .batch_update(
                &self.spreadsheet_id,
                json!([{
                    "updateSheetProperties": {
                        "properties": {
                            "sheetId": self.sheet_id,
                            "gridProperties": {
                                "rowCount": size.rows,
                                "columnCount": size.columns,
                            }
                        },
                        "fields": "gridProperties.rowCount,gridProperties.columnCount",
                    }
                }]),
            )
            .await?;
        tracing::info!(tab = %self.tab_title, rows = size.rows, columns = size.columns, "worksheet resized");
        Ok(())
    }
}

/// A1 notation: tab titles are always single-quoted, with embedded quotes doubled.
pub fn quote_tab(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// 1-based column index to its letter name (`1 -> A`, `27 -> AA`).
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// `USER_ENTERED` parses cells like typed input, so anything Sheets could
/// read as a formula, number, or date gets a leading apostrophe. The
/// apostrophe marks the cell as text and is not part of its value.
fn literal_cell(cell: &str) -> String {
    let needs_quote = cell.trim_start().starts_with(|c: char| {
        c.is_ascii_digit() || matches!(c, '=' | '+' | '-' | '@' | '.' | '\'')
    });
    if needs_quote {
        format!("'{cell}")
    } else {
        cell.to_string()
    }
}

fn escape_drive_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(8), "H");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn tab_titles_are_quoted() {
        assert_eq!(quote_tab("Anthraxions"), "'Anthraxions'");
        assert_eq!(quote_tab("Rex's log"), "'Rex''s log'");
    }

    #[test]
    fn typed_input_lookalikes_are_kept_literal() {
        assert_eq!(literal_cell("=IMPORTXML(A1)"), "'=IMPORTXML(A1)");
        assert_eq!(literal_cell("007"), "'007");
        assert_eq!(literal_cell("123-456-789"), "'123-456-789");
        assert_eq!(literal_cell("+1 spam"), "'+1 spam");
        assert_eq!(literal_cell("'quoted"), "''quoted");
        assert_eq!(literal_cell("Rule 3"), "Rule 3");
        assert_eq!(literal_cell("T-9"), "T-9");
        assert_eq!(literal_cell(""), "");
    }

    #[test]
    fn drive_literals_escape_quotes_and_backslashes() {
        assert_eq!(escape_drive_literal(r"Staff's \ log"), r"Staff\'s \\ log");
    }

    #[test]
    fn non_string_cells_render_as_text() {
        assert_eq!(cell_text(json!("x")), "x");
        assert_eq!(cell_text(json!(42)), "42");
        assert_eq!(cell_text(Value::Null), "");
    }
}
