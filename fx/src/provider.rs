//! Rate source abstraction and the swappable backend registry.

use std::sync::Arc;

use async_trait::async_trait;
use cambist_common::Currency;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::error::FxResult;

/// Capability surface every rate backend implements.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Rate from `src` to `tgt` on `on_date`, falling back to the most
    /// recent available data when the date is unset. Multiplying an amount
    /// in `src` by the returned rate yields the amount in `tgt`.
    async fn get_rate(
        &self,
        src: &Currency,
        tgt: &Currency,
        on_date: Option<NaiveDate>,
    ) -> FxResult<Decimal>;
}

/// Holder of the active [`RateSource`], swappable at runtime.
///
/// Constructed with the initial backend and injected wherever lookups are
/// made. [`BackendRegistry::install`] atomically replaces the source;
/// readers only ever need the latest value, so a plain reference swap under
/// a read-mostly lock suffices.
pub struct BackendRegistry {
    active: RwLock<Arc<dyn RateSource>>,
}

impl BackendRegistry {
    /// Create a registry with the given initial backend.
    pub fn new(backend: Arc<dyn RateSource>) -> Self {
        Self {
            active: RwLock::new(backend),
        }
    }

    /// Switch the active backend; visible to all subsequent callers.
    pub fn install(&self, backend: Arc<dyn RateSource>) {
        *self.active.write() = backend;
    }

    /// The currently active backend.
    pub fn current(&self) -> Arc<dyn RateSource> {
        self.active.read().clone()
    }
}

/// Fixed-rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MockRateSource {
    rates: dashmap::DashMap<String, Decimal>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fixed rate for a directed currency pair.
    pub fn set_rate(&self, src: &Currency, tgt: &Currency, rate: Decimal) {
        self.rates.insert(Self::key(src, tgt), rate);
    }

    fn key(src: &Currency, tgt: &Currency) -> String {
        format!("{src}/{tgt}")
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    async fn get_rate(
        &self,
        src: &Currency,
        tgt: &Currency,
        on_date: Option<NaiveDate>,
    ) -> FxResult<Decimal> {
        if src == tgt {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&Self::key(src, tgt))
            .map(|rate| *rate)
            .ok_or_else(|| crate::error::FxError::MissingRate {
                currency: tgt.clone(),
                date: on_date.unwrap_or_default(),
            })
    }
}
