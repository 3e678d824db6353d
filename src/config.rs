use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

pub const DEFAULT_ENDPOINT: &str = "https://www.sportsbet.com.au/apigw/history/transactions";

/// AEST (UTC+10), the zone the site reports in.
const DEFAULT_OFFSET_MINUTES: i32 = 600;

/// Export settings
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Transactions endpoint (without query string)
    pub endpoint: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Stop after this many pages. `None` pages until the API runs out.
    pub max_pages: Option<u32>,
    /// Offset used for the Time column and for timestamps without a zone
    pub display_offset: FixedOffset,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: None,
            max_pages: None,
            display_offset: offset_from_minutes(DEFAULT_OFFSET_MINUTES),
        }
    }
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or(Utc.fix())
}

impl ExportConfig {
    /// Read overrides from `SPORTSBET_*` environment variables.
    ///
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("SPORTSBET_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.endpoint),
            request_timeout: env::var("SPORTSBET_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_pages: env::var("SPORTSBET_MAX_PAGES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0),
            display_offset: env::var("SPORTSBET_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|s| s.parse::<i32>().ok())
                .and_then(|m| FixedOffset::east_opt(m * 60))
                .unwrap_or(defaults.display_offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.display_offset.local_minus_utc(), 36000);
        assert!(config.request_timeout.is_none());
        assert!(config.max_pages.is_none());
    }
}
