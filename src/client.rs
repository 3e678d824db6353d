use anyhow::Result;
use wreq::Client;
use wreq_util::Emulation;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::export::{ExportReport, run_export};
use crate::fetcher::{HttpResponse, Transport};
use crate::storage::PageStorage;
use crate::types::ExportDates;

/// HTTP client for the Sportsbet history API.
///
/// Requests are sent with a desktop Chrome fingerprint; authentication comes
/// entirely from the headers the fetcher attaches.
pub struct SportsbetClient {
    http_client: Client,
    config: ExportConfig,
}

impl SportsbetClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ExportConfig::from_env())
    }

    pub fn with_config(config: ExportConfig) -> Result<Self> {
        let mut http_builder = Client::builder()
            .emulation(Emulation::Chrome143)
            .gzip(true)
            .brotli(true)
            .zstd(true);

        if let Some(timeout) = config.request_timeout {
            http_builder = http_builder.timeout(timeout);
        }

        let http_client = http_builder.build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the transaction history visible to the session in `storage`.
    pub async fn export(&self, storage: &PageStorage, dates: &ExportDates) -> ExportReport {
        run_export(self, storage, dates, &self.config).await
    }
}

impl Transport for SportsbetClient {
    async fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, ExportError> {
        let mut request = self.http_client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
