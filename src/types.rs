use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// A single transaction as returned by the history API.
///
/// No schema is assumed; fields are read defensively by name.
pub type TransactionRecord = serde_json::Value;

/// Session credentials discovered in the page's storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub customer_id: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask(&self.access_token))
            .field("customer_id", &mask(&self.customer_id))
            .finish()
    }
}

/// Mask a secret for log output, keeping only the last four characters.
pub(crate) fn mask(value: &str) -> String {
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{} ({} chars)", tail, value.chars().count())
}

/// Dates handed to the exporter by the host.
///
/// `display_*` are `DD/MM/YY` strings used for the file name, `*_date` are the
/// `DD/MM/YYYY` strings sent to the API. Ordering is not checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDates {
    #[serde(default)]
    pub display_from: String,
    #[serde(default)]
    pub display_to: String,
    #[serde(default)]
    pub from_date: String,
    #[serde(default)]
    pub to_date: String,
}

impl ExportDates {
    /// The only check the core performs: all four strings must be present.
    pub fn validate(&self) -> Result<(), ExportError> {
        let fields = [
            &self.display_from,
            &self.display_to,
            &self.from_date,
            &self.to_date,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ExportError::InvalidInput(
                "Invalid dates provided.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pagination cursor taken from the last record of the previous page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub last_id: Option<String>,
    pub last_time: Option<String>,
}

/// Column headers, in output order.
pub const CSV_COLUMNS: [&str; 11] = [
    "Time",
    "Type",
    "Summary",
    "Transaction Id",
    "Bet Id",
    "Amount",
    "Balance",
    "Single",
    "Multiple",
    "Exotic",
    "Pool",
];

/// One formatted output row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub time: String,
    pub kind: String,
    pub summary: String,
    pub transaction_id: String,
    pub bet_id: String,
    pub amount: String,
    pub balance: String,
    pub single: String,
    pub multiple: String,
    pub exotic: String,
    pub pool: String,
}

impl CsvRow {
    /// Field values in `CSV_COLUMNS` order.
    pub fn fields(&self) -> [&str; 11] {
        [
            &self.time,
            &self.kind,
            &self.summary,
            &self.transaction_id,
            &self.bet_id,
            &self.amount,
            &self.balance,
            &self.single,
            &self.multiple,
            &self.exotic,
            &self.pool,
        ]
    }
}
