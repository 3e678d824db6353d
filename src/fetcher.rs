//! Cursor-paginated retrieval of the transaction history.
//!
//! Pages are requested strictly in sequence: the cursor for page *n+1* is taken
//! from the last record of page *n*. The loop ends on an empty page, a short
//! page, or a last record without an id.

use std::future::Future;

use chrono::FixedOffset;
use serde_json::Value;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::record::{pick, to_text};
use crate::request_id::generate_request_id;
use crate::timestamp;
use crate::types::{Credential, Cursor, ExportDates, TransactionRecord};

pub const PAGE_SIZE: usize = 50;
const DATE_TYPE: &str = "CUSTOM";
const FILTER_TYPE: &str = "ALL";
const SORT_ORDER: &str = "DESC";

const APP_TOKEN: &str = "cxp-desktop-web";
const CHANNEL: &str = "cxp";

/// JSON pointers to the record list, in priority order.
const RECORD_PATHS: [&str; 6] = [
    "/transactions",
    "/items",
    "/transactionList",
    "/transactions/items",
    "/transactions/transactions",
    "/data",
];

const CURSOR_ID_FIELDS: [&str; 3] = ["transactionId", "transactionID", "id"];

/// Fields that may hold a record's timestamp, in priority order.
pub const TIMESTAMP_FIELDS: [&str; 5] = [
    "transactionTime",
    "transactionDate",
    "date",
    "time",
    "transaction_time",
];

/// Status and body of an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests on behalf of the fetcher.
pub trait Transport {
    fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> impl Future<Output = Result<HttpResponse, ExportError>> + Send;
}

/// One page request: the date range plus the cursor, if any.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub from_date: &'a str,
    pub to_date: &'a str,
    pub cursor: &'a Cursor,
}

impl PageRequest<'_> {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("dateType", DATE_TYPE.to_string()),
            ("filterType", FILTER_TYPE.to_string()),
            ("fromDate", self.from_date.to_string()),
            ("toDate", self.to_date.to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("sortOrder", SORT_ORDER.to_string()),
        ];
        if let Some(last_id) = &self.cursor.last_id {
            pairs.push(("lastId", last_id.clone()));
            if let Some(last_time) = &self.cursor.last_time {
                pairs.push(("lastTime", last_time.clone()));
            }
        }
        pairs
    }

    pub fn url(&self, endpoint: &str) -> String {
        let query = self
            .query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", endpoint, query)
    }
}

/// Headers for one request.
///
/// The token goes out under every header name the API has been seen to read.
pub fn request_headers(credential: &Credential) -> Vec<(&'static str, String)> {
    let token = &credential.access_token;
    vec![
        ("accept", "application/json".to_string()),
        ("content-type", "application/json".to_string()),
        ("apptoken", APP_TOKEN.to_string()),
        ("channel", CHANNEL.to_string()),
        ("accesstoken", token.clone()),
        ("authorization", format!("Bearer {}", token)),
        ("cxp-token", token.clone()),
        ("customer-id", credential.customer_id.clone()),
        ("x-request-id", generate_request_id()),
    ]
}

/// Pull the record list out of a response payload.
///
/// The first non-empty array among `RECORD_PATHS` wins; a bare array payload
/// is used as-is; anything else is an empty page.
pub fn extract_records(mut payload: Value) -> Vec<TransactionRecord> {
    let hit = RECORD_PATHS.iter().find(|path| {
        payload
            .pointer(path)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty())
    });
    if let Some(path) = hit {
        return match payload.pointer_mut(path).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
    }
    match payload {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Cursor for the page after the one ending in `last`.
pub fn next_cursor(last: &TransactionRecord, local: FixedOffset) -> Cursor {
    let last_id = pick(last, &CURSOR_ID_FIELDS).map(to_text);
    let last_time =
        pick(last, &TIMESTAMP_FIELDS).and_then(|raw| timestamp::format_param(raw, local));
    Cursor { last_id, last_time }
}

/// Why the pagination loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EmptyPage,
    ShortPage,
    MissingCursorId,
    PageLimit,
}

/// Fetch every page for `dates` and return the records in API order.
pub async fn fetch_all_transactions<T: Transport>(
    transport: &T,
    credential: &Credential,
    dates: &ExportDates,
    config: &ExportConfig,
) -> Result<Vec<TransactionRecord>, ExportError> {
    let mut records = Vec::new();
    let mut cursor = Cursor::default();
    let mut page = 0u32;

    let reason = loop {
        page += 1;
        let request = PageRequest {
            from_date: &dates.from_date,
            to_date: &dates.to_date,
            cursor: &cursor,
        };
        let url = request.url(&config.endpoint);
        tracing::debug!(page, last_id = ?cursor.last_id, "requesting page");

        let response = transport.get(&url, &request_headers(credential)).await?;
        if !response.is_success() {
            tracing::warn!(page, status = response.status, "transactions request rejected");
            return Err(ExportError::Remote {
                status: response.status,
            });
        }

        let payload: Value = serde_json::from_str(&response.body)?;
        let chunk = extract_records(payload);
        if chunk.is_empty() {
            break StopReason::EmptyPage;
        }

        let count = chunk.len();
        let next = chunk
            .last()
            .map(|last| next_cursor(last, config.display_offset))
            .unwrap_or_default();
        records.extend(chunk);
        tracing::info!(page, count, total = records.len(), "page received");

        if next.last_id.is_none() {
            break StopReason::MissingCursorId;
        }
        if count < PAGE_SIZE {
            break StopReason::ShortPage;
        }
        if config.max_pages.is_some_and(|max| page >= max) {
            tracing::warn!(page, "page ceiling reached, returning partial history");
            break StopReason::PageLimit;
        }
        cursor = next;
    };

    tracing::debug!(?reason, pages = page, total = records.len(), "pagination finished");
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records the requested URLs.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, ExportError>>>,
        pub(crate) urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(pages: Vec<Value>) -> Self {
            let responses = pages
                .into_iter()
                .map(|page| {
                    Ok(HttpResponse {
                        status: 200,
                        body: page.to_string(),
                    })
                })
                .collect();
            Self {
                responses: Mutex::new(responses),
                urls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn push(&self, response: Result<HttpResponse, ExportError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub(crate) fn request_count(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            url: &str,
            _headers: &[(&'static str, String)],
        ) -> Result<HttpResponse, ExportError> {
            self.urls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(HttpResponse {
                        status: 200,
                        body: "[]".to_string(),
                    })
                })
        }
    }

    pub(crate) fn page_of(start: usize, count: usize) -> Value {
        let items: Vec<Value> = (start..start + count)
            .map(|i| {
                json!({
                    "transactionId": format!("T{}", i),
                    "transactionTime": "2024-03-01T10:00:00Z",
                    "amount": -5,
                })
            })
            .collect();
        json!({ "transactions": items })
    }

    pub(crate) fn credential() -> Credential {
        Credential {
            access_token: "abcdefghij.klmnopqrst.uvwxyz0123".to_string(),
            customer_id: "123456".to_string(),
        }
    }

    pub(crate) fn dates() -> ExportDates {
        ExportDates {
            display_from: "01/03/24".to_string(),
            display_to: "31/03/24".to_string(),
            from_date: "01/03/2024".to_string(),
            to_date: "31/03/2024".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stops_after_short_page() {
        let transport =
            ScriptedTransport::new(vec![page_of(0, 50), page_of(50, 50), page_of(100, 12)]);
        let records = fetch_all_transactions(
            &transport,
            &credential(),
            &dates(),
            &ExportConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(transport.request_count(), 3);
        assert_eq!(records.len(), 112);
        assert_eq!(records[111]["transactionId"], "T111");
    }

    #[tokio::test]
    async fn test_cursor_carried_to_next_request() {
        let transport = ScriptedTransport::new(vec![page_of(0, 50), page_of(50, 3)]);
        fetch_all_transactions(&transport, &credential(), &dates(), &ExportConfig::default())
            .await
            .unwrap();
        let urls = transport.urls.lock().unwrap();
        assert!(!urls[0].contains("lastId"));
        assert!(urls[1].contains("lastId=T49"));
        assert!(urls[1].contains("lastTime=2024-03-01%2010%3A00%3A00"));
    }

    #[tokio::test]
    async fn test_stops_when_last_record_has_no_id() {
        let mut page = page_of(0, 50);
        page["transactions"][49] = json!({"amount": 1, "transactionTime": "2024-03-01"});
        let transport = ScriptedTransport::new(vec![page, page_of(50, 50)]);
        let records = fetch_all_transactions(
            &transport,
            &credential(),
            &dates(),
            &ExportConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(transport.request_count(), 1);
        assert_eq!(records.len(), 50);
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let transport = ScriptedTransport::new(vec![json!({"transactions": []})]);
        let records = fetch_all_transactions(
            &transport,
            &credential(),
            &dates(),
            &ExportConfig::default(),
        )
        .await
        .unwrap();
        assert!(records.is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_aborts() {
        let transport = ScriptedTransport::new(vec![page_of(0, 50)]);
        transport.push(Ok(HttpResponse {
            status: 403,
            body: "forbidden".to_string(),
        }));
        let err = fetch_all_transactions(
            &transport,
            &credential(),
            &dates(),
            &ExportConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::Remote { status: 403 }));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_fatal() {
        let transport = ScriptedTransport::default();
        transport.push(Ok(HttpResponse {
            status: 200,
            body: "<html>".to_string(),
        }));
        let err = fetch_all_transactions(
            &transport,
            &credential(),
            &dates(),
            &ExportConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_page_ceiling() {
        let transport =
            ScriptedTransport::new(vec![page_of(0, 50), page_of(50, 50), page_of(100, 50)]);
        let config = ExportConfig {
            max_pages: Some(2),
            ..Default::default()
        };
        let records = fetch_all_transactions(&transport, &credential(), &dates(), &config)
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 2);
        assert_eq!(records.len(), 100);
    }

    #[test]
    fn test_extract_records_paths() {
        let items = json!([{"id": 1}]);
        assert_eq!(extract_records(json!({"transactions": items})).len(), 1);
        assert_eq!(extract_records(json!({"items": items})).len(), 1);
        assert_eq!(
            extract_records(json!({"transactions": {"items": items}})).len(),
            1
        );
        assert_eq!(
            extract_records(json!({"transactions": [], "data": [{"id": 1}, {"id": 2}]})).len(),
            2
        );
        assert_eq!(extract_records(json!([{"id": 1}, {"id": 2}])).len(), 2);
        assert!(extract_records(json!({"message": "ok"})).is_empty());
        assert!(extract_records(json!("text")).is_empty());
    }

    #[test]
    fn test_next_cursor_fields() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let cursor = next_cursor(&json!({"transactionID": 991, "date": 1_700_000_000}), offset);
        assert_eq!(cursor.last_id.as_deref(), Some("991"));
        assert_eq!(cursor.last_time.as_deref(), Some("2023-11-14 22:13:20"));

        let cursor = next_cursor(&json!({"id": "abc"}), offset);
        assert_eq!(cursor.last_time, None);
    }

    #[test]
    fn test_query_and_headers() {
        let cursor = Cursor {
            last_id: Some("55".to_string()),
            last_time: None,
        };
        let request = PageRequest {
            from_date: "01/03/2024",
            to_date: "31/03/2024",
            cursor: &cursor,
        };
        let url = request.url("https://example.test/tx");
        assert_eq!(
            url,
            "https://example.test/tx?dateType=CUSTOM&filterType=ALL&fromDate=01%2F03%2F2024\
             &toDate=31%2F03%2F2024&limit=50&sortOrder=DESC&lastId=55"
        );

        let headers = request_headers(&credential());
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(
            get("authorization").as_deref(),
            Some("Bearer abcdefghij.klmnopqrst.uvwxyz0123")
        );
        assert_eq!(get("cxp-token"), get("accesstoken"));
        assert_eq!(get("customer-id").as_deref(), Some("123456"));
        assert_eq!(get("x-request-id").map(|v| v.len()), Some(36));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = ScriptedTransport::new(vec![page_of(0, 50)]);
        transport.push(Err(ExportError::Transport("connection reset".to_string())));
        let err = fetch_all_transactions(
            &transport,
            &credential(),
            &dates(),
            &ExportConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, ExportError::Transport(msg) if msg == "connection reset"));
        assert_eq!(transport.request_count(), 2);
    }
}
