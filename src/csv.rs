//! Record normalization and CSV output.

use chrono::FixedOffset;
use ::csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

use crate::error::ExportError;
use crate::fetcher::TIMESTAMP_FIELDS;
use crate::record::{pick, text_field, to_text};
use crate::timestamp;
use crate::types::{CSV_COLUMNS, CsvRow, TransactionRecord};

const FILE_PREFIX: &str = "sportsbet-transactions";

/// A finished CSV export.
#[derive(Debug, Clone)]
pub struct CsvDocument {
    /// UTF-8 CSV text, header first
    pub content: Vec<u8>,
    pub file_name: String,
    pub row_count: usize,
}

/// `"true"` only for boolean `true` or the string "true" in any case.
pub fn to_bool(value: Option<&Value>) -> String {
    let truth = match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };
    truth.to_string()
}

/// Numeric coercion: strings are trimmed, empty strings count as zero.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().ok()?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

/// Two-decimal string. Non-numeric values pass through as text.
///
/// Ties round away from zero and negative zero prints as `0.00`.
pub fn to_decimal(value: &Value) -> String {
    match as_number(value) {
        Some(n) => {
            let rounded = (n.abs() * 100.0).round() / 100.0 * n.signum();
            let rounded = if rounded == 0.0 { 0.0 } else { rounded };
            format!("{:.2}", rounded)
        }
        None => to_text(value),
    }
}

fn decimal_field(record: &Value, keys: &[&str]) -> String {
    pick(record, keys).map(to_decimal).unwrap_or_else(|| to_decimal(&Value::from(0)))
}

/// Map one API record onto the fixed output columns.
pub fn map_row(record: &TransactionRecord, display: FixedOffset) -> CsvRow {
    let raw_time = pick(record, &TIMESTAMP_FIELDS).or_else(|| record.get("createdAt"));
    CsvRow {
        time: raw_time
            .map(|v| timestamp::format_display(v, display))
            .unwrap_or_default(),
        kind: text_field(record, &["type", "transactionType"]),
        summary: text_field(record, &["summary", "description", "detail"]),
        transaction_id: text_field(record, &["transactionId", "id"]),
        bet_id: text_field(record, &["betId", "betSlipId", "wagerId"]),
        amount: decimal_field(
            record,
            &["amount", "value", "stakeChange", "credit", "debit"],
        ),
        balance: decimal_field(record, &["balance", "balanceAmount", "runningBalance"]),
        single: to_bool(pick(record, &["single", "isSingle"])),
        multiple: to_bool(pick(record, &["multiple", "isMulti"])),
        exotic: to_bool(pick(record, &["exotic", "isExotic"])),
        pool: to_bool(pick(record, &["pool", "isPool"])),
    }
}

/// `sportsbet-transactions-DD-MM-YY-to-DD-MM-YY.csv`
pub fn file_name(display_from: &str, display_to: &str) -> String {
    format!(
        "{}-{}-to-{}.csv",
        FILE_PREFIX,
        display_from.replace('/', "-"),
        display_to.replace('/', "-")
    )
}

/// Serialize `records` as CSV. Every field is quoted and the last line has
/// no trailing newline.
///
/// Returns `None` when there is nothing to export.
pub fn to_csv(
    records: &[TransactionRecord],
    display_from: &str,
    display_to: &str,
    display: FixedOffset,
) -> Result<Option<CsvDocument>, ExportError> {
    if records.is_empty() {
        return Ok(None);
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.write_record(map_row(record, display).fields())?;
    }
    let mut content = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    // lines are separated, not terminated
    if content.last() == Some(&b'\n') {
        content.pop();
    }

    Ok(Some(CsvDocument {
        content,
        file_name: file_name(display_from, display_to),
        row_count: records.len(),
    }))
}
