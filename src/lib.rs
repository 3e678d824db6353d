pub mod client;
pub mod config;
pub mod credential;
pub mod csv;
pub mod dates;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod jwt;
pub mod record;
pub mod request_id;
pub mod storage;
pub mod timestamp;
pub mod types;

pub use client::SportsbetClient;
pub use config::ExportConfig;
pub use credential::locate_credential;
pub use error::ExportError;
pub use export::{ExportReport, ExportResult, run_export};
pub use fetcher::{HttpResponse, Transport, fetch_all_transactions};
pub use storage::{PageStorage, StorageArea, StorageSurface};
pub use types::{CSV_COLUMNS, Credential, Cursor, ExportDates, TransactionRecord};
