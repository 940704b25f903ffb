//! FX error types.

use cambist_common::Currency;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or refreshing FX rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// No quote for a currency on the resolved data date.
    #[error("No rate for {currency} on {date}")]
    MissingRate { currency: Currency, date: NaiveDate },

    /// No data date exists on or before the requested date.
    #[error("No rates available on or before {date}")]
    NoDataOnOrBefore { date: NaiveDate },

    /// The backward date walk ran out of history before finding a quote.
    #[error("Rate history exhausted looking for {currency} before {date}")]
    HistoryExhausted { currency: Currency, date: NaiveDate },

    /// The rate table contains no dates at all.
    #[error("Rate history is empty")]
    EmptyHistory,

    /// Download failed: network error, timeout, or non-success status.
    #[error("Rate download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The local cache file could not be read.
    #[error("Cannot read rate cache {path}: {source}")]
    CacheRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The local cache file could not be written.
    #[error("Cannot write rate cache {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No per-user cache directory could be determined.
    #[error("No cache directory available on this platform")]
    NoCacheDir,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FxError {
    /// Whether this is a missing-rate failure, recoverable under the
    /// "last" fallback policy (as opposed to a download or cache fault).
    pub fn is_missing_rate(&self) -> bool {
        matches!(
            self,
            FxError::MissingRate { .. }
                | FxError::NoDataOnOrBefore { .. }
                | FxError::HistoryExhausted { .. }
                | FxError::EmptyHistory
        )
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
