use thiserror::Error;

/// Failures of an export run. Every variant carries a user-facing message.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not find your Sportsbet login. Make sure you are signed in on sportsbet.com.au.")]
    CredentialNotFound,
    #[error("Unable to detect your Sportsbet account ID. Visit Account > Transactions and try again.")]
    AccountNotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Sportsbet responded {status}")]
    Remote { status: u16 },
    #[error("Failed to parse transactions response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Transport(String),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] ::csv::Error),
}
