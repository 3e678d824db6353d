//! The export pipeline: locate credentials, fetch every page, write the CSV.
//!
//! `run_export` never returns an error across the host boundary; failures are
//! folded into the report and its `{ success: false, message }` result.

use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::credential::locate_credential;
use crate::csv::{CsvDocument, to_csv};
use crate::error::ExportError;
use crate::fetcher::{Transport, fetch_all_transactions};
use crate::storage::PageStorage;
use crate::types::ExportDates;

pub const NO_TRANSACTIONS_MESSAGE: &str = "No transactions found for that date range.";

/// Outcome of one export run.
#[derive(Debug)]
pub enum ExportReport {
    /// At least one row was written.
    Exported(CsvDocument),
    /// The API returned no records for the range. Not a failure.
    NoTransactions,
    Failed(ExportError),
}

/// Result shape handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExportResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            row_count: None,
            file_name: None,
            message: Some(message.into()),
        }
    }
}

impl ExportReport {
    /// The CSV to offer for download. Only present on success.
    pub fn document(&self) -> Option<&CsvDocument> {
        match self {
            Self::Exported(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<CsvDocument> {
        match self {
            Self::Exported(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn result(&self) -> ExportResult {
        match self {
            Self::Exported(doc) => ExportResult {
                success: true,
                row_count: Some(doc.row_count),
                file_name: Some(doc.file_name.clone()),
                message: None,
            },
            Self::NoTransactions => ExportResult::failure(NO_TRANSACTIONS_MESSAGE),
            Self::Failed(err) => ExportResult::failure(err.to_string()),
        }
    }
}

async fn export<T: Transport>(
    transport: &T,
    storage: &PageStorage,
    dates: &ExportDates,
    config: &ExportConfig,
) -> Result<Option<CsvDocument>, ExportError> {
    dates.validate()?;
    let credential = locate_credential(storage)?;
    let records = fetch_all_transactions(transport, &credential, dates, config).await?;
    to_csv(
        &records,
        &dates.display_from,
        &dates.display_to,
        config.display_offset,
    )
}

/// Run one export against `storage` for `dates`.
pub async fn run_export<T: Transport>(
    transport: &T,
    storage: &PageStorage,
    dates: &ExportDates,
    config: &ExportConfig,
) -> ExportReport {
    match export(transport, storage, dates, config).await {
        Ok(Some(doc)) => {
            tracing::info!(rows = doc.row_count, file = %doc.file_name, "export complete");
            ExportReport::Exported(doc)
        }
        Ok(None) => {
            tracing::info!("no transactions in range");
            ExportReport::NoTransactions
        }
        Err(err) => {
            tracing::warn!(error = %err, "export failed");
            ExportReport::Failed(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpResponse;
    use crate::fetcher::tests::{ScriptedTransport, dates, page_of};
    use crate::jwt::tests::make_token;
    use crate::storage::StorageArea;
    use serde_json::json;

    fn signed_in() -> PageStorage {
        PageStorage {
            local: StorageArea::new()
                .with("theme", "dark")
                .with("accesstoken", make_token(&json!({"custId": "445566"}))),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_successful_export() {
        let transport = ScriptedTransport::new(vec![page_of(0, 50), page_of(50, 2)]);
        let report = run_export(&transport, &signed_in(), &dates(), &ExportConfig::default()).await;
        let result = report.result();
        assert!(result.success);
        assert_eq!(result.row_count, Some(52));
        assert_eq!(
            result.file_name.as_deref(),
            Some("sportsbet-transactions-01-03-24-to-31-03-24.csv")
        );
        let doc = report.document().unwrap();
        let text = String::from_utf8(doc.content.clone()).unwrap();
        assert_eq!(text.lines().count(), 53);
    }

    #[tokio::test]
    async fn test_empty_range_is_reported_without_document() {
        let transport = ScriptedTransport::new(vec![json!({"transactions": []})]);
        let report = run_export(&transport, &signed_in(), &dates(), &ExportConfig::default()).await;
        assert!(matches!(report, ExportReport::NoTransactions));
        assert!(report.document().is_none());
        assert_eq!(
            report.result().message.as_deref(),
            Some(NO_TRANSACTIONS_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_missing_login_makes_no_requests() {
        let transport = ScriptedTransport::new(vec![page_of(0, 3)]);
        let storage = PageStorage::default();
        let report = run_export(&transport, &storage, &dates(), &ExportConfig::default()).await;
        assert!(matches!(
            report,
            ExportReport::Failed(ExportError::CredentialNotFound)
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_dates_rejected_before_lookup() {
        let transport = ScriptedTransport::default();
        let mut bad = dates();
        bad.to_date.clear();
        let report = run_export(&transport, &signed_in(), &bad, &ExportConfig::default()).await;
        let result = report.result();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Invalid dates provided."));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_no_document() {
        let transport = ScriptedTransport::new(vec![page_of(0, 50)]);
        transport.push(Ok(HttpResponse {
            status: 500,
            body: String::new(),
        }));
        let report = run_export(&transport, &signed_in(), &dates(), &ExportConfig::default()).await;
        assert!(report.document().is_none());
        assert_eq!(
            report.result().message.as_deref(),
            Some("Sportsbet responded 500")
        );
    }

    #[tokio::test]
    async fn test_transport_failure_message_reaches_result() {
        let transport = ScriptedTransport::new(vec![page_of(0, 50)]);
        transport.push(Err(ExportError::Transport("connection reset".to_string())));
        let report = run_export(&transport, &signed_in(), &dates(), &ExportConfig::default()).await;
        assert!(report.document().is_none());
        let result = report.result();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_result_serialization() {
        let success = ExportResult {
            success: true,
            row_count: Some(3),
            file_name: Some("f.csv".to_string()),
            message: None,
        };
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({"success": true, "rowCount": 3, "fileName": "f.csv"})
        );
        assert_eq!(
            serde_json::to_value(ExportResult::failure("nope")).unwrap(),
            json!({"success": false, "message": "nope"})
        );
    }
}
