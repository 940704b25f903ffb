//! Currency conversion over the active rate source.

use std::sync::Arc;

use cambist_common::{Currency, Money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::config::{FallbackMode, FxConfig};
use crate::error::FxResult;
use crate::provider::BackendRegistry;

/// The conversion entry point external collaborators use.
///
/// Delegates rate resolution to whatever backend the registry currently
/// holds and applies the configured fallback policy to missing-rate
/// failures. The multiplication itself is exact decimal arithmetic.
pub struct ConversionService {
    registry: Arc<BackendRegistry>,
    config: FxConfig,
}

impl ConversionService {
    /// Create a service over the given registry and settings snapshot.
    pub fn new(registry: Arc<BackendRegistry>, config: FxConfig) -> Self {
        Self { registry, config }
    }

    /// Convert `amount` from `src` to `tgt` at the given date.
    ///
    /// Under the "last" policy a conversion whose rate cannot be resolved
    /// at all passes the amount through unconverted (rate 1); under
    /// "raise" the missing-rate failure propagates. Download and cache
    /// faults always propagate.
    #[instrument(skip(self), fields(src = %src, tgt = %tgt))]
    pub async fn convert_amount(
        &self,
        amount: Decimal,
        src: &Currency,
        tgt: &Currency,
        on_date: Option<NaiveDate>,
    ) -> FxResult<Decimal> {
        let rate = match self.registry.current().get_rate(src, tgt, on_date).await {
            Ok(rate) => rate,
            Err(err) if self.config.fallback_mode == FallbackMode::Last && err.is_missing_rate() => {
                debug!(error = %err, "No rate resolved, passing amount through");
                Decimal::ONE
            }
            Err(err) => return Err(err),
        };
        Ok(amount * rate)
    }

    /// Convert a money value into `tgt`, keeping full precision.
    /// Quantization stays a presentation concern ([`Money::round`]).
    pub async fn convert(
        &self,
        money: &Money,
        tgt: Currency,
        on_date: Option<NaiveDate>,
    ) -> FxResult<Money> {
        if money.currency == tgt {
            return Ok(money.clone());
        }
        let amount = self
            .convert_amount(money.amount, &money.currency, &tgt, on_date)
            .await?;
        Ok(Money::new(amount, tgt))
    }
}
