//! FX configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cambist_common::Currency;

use crate::error::{FxError, FxResult};

/// Behavior when an exact rate is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Substitute the most recent prior value.
    #[default]
    Last,
    /// Surface a missing-rate error to the caller.
    Raise,
}

impl FromStr for FallbackMode {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last" => Ok(FallbackMode::Last),
            "raise" => Ok(FallbackMode::Raise),
            other => Err(FxError::Config(format!(
                "unknown fallback mode {other:?}, expected \"last\" or \"raise\""
            ))),
        }
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackMode::Last => write!(f, "last"),
            FallbackMode::Raise => write!(f, "raise"),
        }
    }
}

/// FX settings snapshot.
///
/// Cloned into the backend and conversion service at construction; readers
/// never observe a partially-updated configuration.
#[derive(Debug, Clone)]
pub struct FxConfig {
    /// Pivot currency all cross-rates are computed through.
    pub base_currency: Currency,
    /// Policy when a rate is missing for the resolved date.
    pub fallback_mode: FallbackMode,
    /// Timeout for the rate download request.
    pub request_timeout: Duration,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            base_currency: Currency::eur(),
            fallback_mode: FallbackMode::Last,
            request_timeout: Duration::from_secs(3),
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(code) = std::env::var("FX_BASE_CURRENCY") {
            config.base_currency = Currency::new(code);
        }

        if let Ok(mode) = std::env::var("FX_FALLBACK_MODE") {
            if let Ok(mode) = mode.parse() {
                config.fallback_mode = mode;
            }
        }

        if let Ok(secs) = std::env::var("FX_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<f64>() {
                if secs.is_finite() && secs > 0.0 {
                    config.request_timeout = Duration::from_secs_f64(secs);
                }
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> FxResult<()> {
        let code = self.base_currency.code();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(FxError::Config(format!(
                "base currency {code:?} is not a 3-letter ISO code"
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(FxError::Config("request timeout cannot be zero".into()));
        }

        Ok(())
    }
}
