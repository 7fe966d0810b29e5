//! `gsheets-client` — typed reqwest client for the Google Sheets v4 values
//! API, implementing [`leadsync_core::SheetGateway`].
//!
//! Row 1 is the header; data rows are addressed 1-based from row 2. Every
//! write resolves its column by name against the live header, so header
//! reordering between calls never misdirects a cell.

pub mod auth;

use async_trait::async_trait;
use auth::{ServiceAccountKey, TokenProvider};
use leadsync_core::config::SheetsConfig;
use leadsync_core::{Result, RowRecord, SheetGateway, SyncError};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "google-sheets";
const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Characters that cannot appear raw in a URL path segment (tab names may
/// contain spaces or non-ASCII).
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    sheet_id: String,
    tab: String,
    identity_column: String,
    auth: TokenProvider,
}

impl SheetsClient {
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let key = ServiceAccountKey::from_file(&config.credentials_path)?;
        Self::with_base_url(
            DEFAULT_BASE_URL,
            &config.sheet_id,
            &config.tab,
            &config.identity_column,
            TokenProvider::service_account(key)?,
        )
    }

    /// Construct against an explicit base URL (tests point this at a mock
    /// server, usually with a fixed-token provider).
    pub fn with_base_url(
        base_url: impl Into<String>,
        sheet_id: &str,
        tab: &str,
        identity_column: &str,
        auth: TokenProvider,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
            tab: tab.to_string(),
            identity_column: identity_column.to_string(),
            auth,
        })
    }

    fn range_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url,
            self.sheet_id,
            utf8_percent_encode(range, SEGMENT)
        )
    }

    /// Fetch the whole tab: header first, then data rows, as the API returns
    /// them (trailing empty cells may be absent).
    async fn fetch_values(&self) -> Result<Vec<Vec<String>>> {
        let resp = self
            .http
            .get(self.range_url(&self.tab))
            .bearer_auth(self.auth.bearer().await?)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        let resp = check_status(resp).await?;
        let range: ValueRange = resp
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, format!("invalid values body: {e}")))?;
        Ok(range.values)
    }

    fn header_index(header: &[String], column: &str) -> Result<usize> {
        header
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SyncError::ColumnNotFound(column.to_string()))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SyncError::auth(SERVICE, format!("{status}")));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::transport(
        SERVICE,
        format!("{status}: {}", body.chars().take(200).collect::<String>()),
    ))
}

/// 1-based column index to A1 letters: 1 -> A, 26 -> Z, 27 -> AA.
fn column_letter(mut index: usize) -> String {
    debug_assert!(index >= 1);
    let mut letters = Vec::new();
    while index > 0 {
        index -= 1;
        letters.push(b'A' + (index % 26) as u8);
        index /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ASCII letters")
}

#[async_trait]
impl SheetGateway for SheetsClient {
    async fn header(&self) -> Result<Vec<String>> {
        Ok(self.fetch_values().await?.into_iter().next().unwrap_or_default())
    }

    async fn all_rows(&self) -> Result<Vec<RowRecord>> {
        let mut values = self.fetch_values().await?.into_iter();
        let header = values.next().unwrap_or_default();

        let mut rows = Vec::new();
        for (offset, cells) in values.enumerate() {
            let mut record = RowRecord::new(offset as u32 + 2);
            for (column, value) in header.iter().zip(cells) {
                record.cells.insert(column.clone(), value);
            }
            rows.push(record);
        }
        Ok(rows)
    }

    async fn find_row(&self, deal_id: i64) -> Result<Option<u32>> {
        let values = self.fetch_values().await?;
        let header = values.first().cloned().unwrap_or_default();
        let column = Self::header_index(&header, &self.identity_column)?;

        let wanted = deal_id.to_string();
        for (offset, cells) in values.iter().skip(1).enumerate() {
            if cells.get(column).map(|v| v.trim()) == Some(wanted.as_str()) {
                return Ok(Some(offset as u32 + 2));
            }
        }
        Ok(None)
    }

    async fn write_cell(&self, row: u32, column: &str, value: &str) -> Result<()> {
        let header = self.header().await?;
        let index = Self::header_index(&header, column)?;
        let range = format!("{}!{}{row}", self.tab, column_letter(index + 1));

        let resp = self
            .http
            .put(self.range_url(&range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(self.auth.bearer().await?)
            .json(&serde_json::json!({ "values": [[value]] }))
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e.to_string()))?;
        check_status(resp).await?;
        tracing::debug!(row, column, value, "cell written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> SheetsClient {
        SheetsClient::with_base_url(
            server.url(),
            "sheet-1",
            "Sheet1",
            "lead_id",
            TokenProvider::fixed("fixed-token"),
        )
        .unwrap()
    }

    async fn mock_values(
        server: &mut mockito::ServerGuard,
        values: serde_json::Value,
    ) -> mockito::Mock {
        server
            .mock("GET", "/sheet-1/values/Sheet1")
            .match_header("authorization", "Bearer fixed-token")
            .with_body(json!({"range": "Sheet1", "values": values}).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn rows_are_keyed_by_header_and_positioned_from_two() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_values(
            &mut server,
            json!([["lead_id", "Name", "Amount"], ["42", "Acme", "500"], ["", "Beta"]]),
        ).await;

        let rows = client(&server).all_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, 2);
        assert_eq!(rows[0].cell("Name"), Some("Acme"));
        assert_eq!(rows[1].position, 3);
        // Blank identity and short rows read as absent cells.
        assert_eq!(rows[1].cell("lead_id"), None);
        assert_eq!(rows[1].cell("Amount"), None);
    }

    #[tokio::test]
    async fn find_row_matches_identity_exactly() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_values(
            &mut server,
            json!([["lead_id"], ["420"], ["42"], ["42"]]),
        ).await;

        // First exact match wins; "420" is not a match for 42.
        assert_eq!(client(&server).find_row(42).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn find_row_without_identity_column_is_column_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_values(&mut server, json!([["Name"], ["Acme"]])).await;

        let err = client(&server).find_row(42).await.unwrap_err();
        assert!(matches!(err, SyncError::ColumnNotFound(c) if c == "lead_id"));
    }

    #[tokio::test]
    async fn find_row_missing_id_returns_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_values(&mut server, json!([["lead_id"], ["7"]])).await;
        assert_eq!(client(&server).find_row(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_cell_addresses_the_column_from_the_live_header() {
        let mut server = mockito::Server::new_async().await;
        let _header = mock_values(&mut server, json!([["Name", "Status"]])).await;
        let put = server
            .mock("PUT", "/sheet-1/values/Sheet1!B2")
            .match_query(Matcher::UrlEncoded(
                "valueInputOption".into(),
                "RAW".into(),
            ))
            .match_body(Matcher::Json(json!({"values": [["Won"]]})))
            .with_body("{}")
            .create_async()
            .await;

        client(&server).write_cell(2, "Status", "Won").await.unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn write_cell_to_unknown_column_is_column_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _header = mock_values(&mut server, json!([["Name"]])).await;

        let err = client(&server).write_cell(2, "Status", "Won").await.unwrap_err();
        assert!(matches!(err, SyncError::ColumnNotFound(_)));
    }

    #[tokio::test]
    async fn forbidden_maps_to_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/sheet-1/values/Sheet1")
            .with_status(403)
            .create_async()
            .await;

        let err = client(&server).all_rows().await.unwrap_err();
        assert!(matches!(err, SyncError::Auth { .. }));
    }

    #[test]
    fn column_letters_cover_multi_letter_ranges() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(2), "B");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(28), "AB");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(53), "BA");
    }

    #[test]
    fn tab_names_with_spaces_are_percent_encoded() {
        let client = SheetsClient::with_base_url(
            "http://example.test",
            "sheet-1",
            "My Tab",
            "lead_id",
            TokenProvider::fixed("t"),
        )
        .unwrap();
        assert_eq!(
            client.range_url("My Tab!A2"),
            "http://example.test/sheet-1/values/My%20Tab!A2"
        );
    }
}
