//! Historical-rate backend over the ECB daily reference dataset.

use std::path::PathBuf;

use async_trait::async_trait;
use cambist_common::Currency;
use chrono::NaiveDate;
use directories::ProjectDirs;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::cache::CacheManager;
use crate::config::{FallbackMode, FxConfig};
use crate::error::{FxError, FxResult};
use crate::provider::RateSource;
use crate::store::RateTable;

/// Upstream ECB historical reference-rate dataset.
pub const ECB_HISTORY_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist.csv";

/// Local cache file name, mirroring the upstream dataset name.
pub const ECB_CACHE_FILE: &str = "eurofxref-hist.csv";

/// [`RateSource`] backed by the cached ECB daily time series.
///
/// Quotes are units of currency per 1 unit of the base currency; a cross
/// rate is the product of the `src -> base` and `base -> tgt` legs on the
/// resolved data date. When a leg has no quote, the "last" fallback policy
/// walks backward through dates that actually carry data, flooring at the
/// oldest date in the table.
pub struct EcbBackend {
    cache: CacheManager,
    config: FxConfig,
}

impl EcbBackend {
    /// Construct against the standard ECB endpoint and the per-user cache
    /// directory, performing the initial cache synchronization.
    pub async fn new(config: FxConfig) -> FxResult<Self> {
        config.validate()?;
        let cache =
            CacheManager::open(default_cache_file()?, ECB_HISTORY_URL, config.request_timeout)
                .await?;
        Ok(Self { cache, config })
    }

    /// Construct over an already-opened cache (custom location or endpoint).
    pub fn with_cache(config: FxConfig, cache: CacheManager) -> FxResult<Self> {
        config.validate()?;
        Ok(Self { cache, config })
    }

    fn resolve(
        &self,
        table: &RateTable,
        src: &Currency,
        tgt: &Currency,
        on_date: Option<NaiveDate>,
    ) -> FxResult<Decimal> {
        let latest = table.latest_date().ok_or(FxError::EmptyHistory)?;
        let query_date = on_date.unwrap_or(latest);

        let mut day = match table.latest_on_or_before(query_date) {
            Some(day) => day,
            None => match self.config.fallback_mode {
                FallbackMode::Last => table.oldest_date().ok_or(FxError::EmptyHistory)?,
                FallbackMode::Raise => {
                    return Err(FxError::NoDataOnOrBefore { date: query_date });
                }
            },
        };

        // Same-currency short-circuit, deliberately after date resolution:
        // a query with no resolvable date fails even when no conversion is
        // actually needed.
        if src == tgt {
            return Ok(Decimal::ONE);
        }

        let base = &self.config.base_currency;
        loop {
            let src_to_base = if src == base {
                Some(Decimal::ONE)
            } else {
                table.quote(day, src).map(|quote| Decimal::ONE / quote)
            };
            let base_to_tgt = if tgt == base {
                Some(Decimal::ONE)
            } else {
                table.quote(day, tgt)
            };

            if let (Some(src_to_base), Some(base_to_tgt)) = (src_to_base, base_to_tgt) {
                return Ok(src_to_base * base_to_tgt);
            }

            let missing = if src_to_base.is_none() { src } else { tgt };
            match self.config.fallback_mode {
                FallbackMode::Raise => {
                    return Err(FxError::MissingRate {
                        currency: missing.clone(),
                        date: day,
                    });
                }
                FallbackMode::Last => match table.previous_day_with_data(day) {
                    Some(previous) => {
                        debug!(currency = %missing, day = %day, previous = %previous, "Quote missing, walking back");
                        day = previous;
                    }
                    None => {
                        return Err(FxError::HistoryExhausted {
                            currency: missing.clone(),
                            date: day,
                        });
                    }
                },
            }
        }
    }
}

#[async_trait]
impl RateSource for EcbBackend {
    #[instrument(skip(self), fields(src = %src, tgt = %tgt))]
    async fn get_rate(
        &self,
        src: &Currency,
        tgt: &Currency,
        on_date: Option<NaiveDate>,
    ) -> FxResult<Decimal> {
        self.cache.ensure_fresh().await?;
        let table = self.cache.table();
        self.resolve(&table, src, tgt, on_date)
    }
}

fn default_cache_file() -> FxResult<PathBuf> {
    let dirs = ProjectDirs::from("", "", "cambist").ok_or(FxError::NoCacheDir)?;
    Ok(dirs.cache_dir().join(ECB_CACHE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{serve, SAMPLE_CSV};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tempfile::TempDir;

    const HISTORY: &str = "\
Date,USD,JPY,CHF
2024-01-03,1.0919,156.33,
2024-01-01,1.0956,154.98,0.9315
";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn backend(csv: &str, mode: FallbackMode) -> (EcbBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ECB_CACHE_FILE);
        std::fs::write(&path, csv).unwrap();

        // The file is fresh, so the endpoint is never contacted.
        let cache = CacheManager::open(path, "http://127.0.0.1:9/unused", Duration::from_secs(1))
            .await
            .unwrap();
        let config = FxConfig {
            fallback_mode: mode,
            ..FxConfig::default()
        };
        (EcbBackend::with_cache(config, cache).unwrap(), dir)
    }

    #[tokio::test]
    async fn test_same_currency_is_unity() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let rate = backend
            .get_rate(&Currency::usd(), &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_same_currency_still_needs_a_resolvable_date() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Raise).await;
        let err = backend
            .get_rate(&Currency::usd(), &Currency::usd(), Some(date(2023, 12, 31)))
            .await
            .unwrap_err();
        assert!(matches!(err, FxError::NoDataOnOrBefore { .. }));
    }

    #[tokio::test]
    async fn test_base_to_currency_uses_quote() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let rate = backend
            .get_rate(&Currency::eur(), &Currency::usd(), Some(date(2024, 1, 3)))
            .await
            .unwrap();
        assert_eq!(rate, dec!(1.0919));
    }

    #[tokio::test]
    async fn test_currency_to_base_inverts_quote() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let rate = backend
            .get_rate(&Currency::usd(), &Currency::eur(), Some(date(2024, 1, 3)))
            .await
            .unwrap();
        assert_eq!(rate, Decimal::ONE / dec!(1.0919));
    }

    #[tokio::test]
    async fn test_cross_rate_goes_through_base() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let rate = backend
            .get_rate(&Currency::usd(), &Currency::jpy(), Some(date(2024, 1, 3)))
            .await
            .unwrap();
        assert_eq!(rate, (Decimal::ONE / dec!(1.0919)) * dec!(156.33));
    }

    #[tokio::test]
    async fn test_inverse_consistency() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let there = backend
            .get_rate(&Currency::usd(), &Currency::jpy(), Some(date(2024, 1, 3)))
            .await
            .unwrap();
        let back = backend
            .get_rate(&Currency::jpy(), &Currency::usd(), Some(date(2024, 1, 3)))
            .await
            .unwrap();

        let drift = (there * back - Decimal::ONE).abs();
        assert!(drift < dec!(0.000000000000000001), "drift {drift}");
    }

    #[tokio::test]
    async fn test_query_date_resolves_to_nearest_earlier_data() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        // 2024-01-02 has no data: the data date is 2024-01-01, not -03.
        let rate = backend
            .get_rate(&Currency::eur(), &Currency::usd(), Some(date(2024, 1, 2)))
            .await
            .unwrap();
        assert_eq!(rate, dec!(1.0956));
    }

    #[tokio::test]
    async fn test_unset_date_uses_latest_data() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let rate = backend
            .get_rate(&Currency::eur(), &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(rate, dec!(1.0919));
    }

    #[tokio::test]
    async fn test_missing_quote_falls_back_to_prior_day() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        // CHF is unquoted on 2024-01-03; the walk lands on 2024-01-01.
        let rate = backend
            .get_rate(&Currency::eur(), &Currency::new("CHF"), Some(date(2024, 1, 3)))
            .await
            .unwrap();
        assert_eq!(rate, dec!(0.9315));
    }

    #[tokio::test]
    async fn test_missing_quote_raises_when_configured() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Raise).await;
        let err = backend
            .get_rate(&Currency::eur(), &Currency::new("CHF"), Some(date(2024, 1, 3)))
            .await
            .unwrap_err();
        match err {
            FxError::MissingRate { currency, date: d } => {
                assert_eq!(currency, Currency::new("CHF"));
                assert_eq!(d, date(2024, 1, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_query_before_all_data_uses_oldest_in_last_mode() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let rate = backend
            .get_rate(&Currency::eur(), &Currency::usd(), Some(date(2023, 12, 31)))
            .await
            .unwrap();
        assert_eq!(rate, dec!(1.0956));
    }

    #[tokio::test]
    async fn test_query_before_all_data_raises_when_configured() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Raise).await;
        let err = backend
            .get_rate(&Currency::eur(), &Currency::usd(), Some(date(2023, 12, 31)))
            .await
            .unwrap_err();
        assert!(matches!(err, FxError::NoDataOnOrBefore { .. }));
    }

    #[tokio::test]
    async fn test_never_quoted_currency_exhausts_history() {
        let (backend, _dir) = backend(HISTORY, FallbackMode::Last).await;
        let err = backend
            .get_rate(&Currency::eur(), &Currency::new("NOK"), None)
            .await
            .unwrap_err();
        match err {
            FxError::HistoryExhausted { currency, date: d } => {
                assert_eq!(currency, Currency::new("NOK"));
                assert_eq!(d, date(2024, 1, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_history_is_an_error_in_both_modes() {
        for mode in [FallbackMode::Last, FallbackMode::Raise] {
            let (backend, _dir) = backend("Date,USD\n", mode).await;
            let err = backend
                .get_rate(&Currency::eur(), &Currency::usd(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, FxError::EmptyHistory));
        }
    }

    #[tokio::test]
    async fn test_lookup_downloads_when_cache_is_absent() {
        let dir = TempDir::new().unwrap();
        let stub = serve("200 OK", SAMPLE_CSV).await;
        let cache = CacheManager::open(
            dir.path().join(ECB_CACHE_FILE),
            &stub.url,
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        let backend = EcbBackend::with_cache(FxConfig::default(), cache).unwrap();

        let rate = backend
            .get_rate(&Currency::eur(), &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(rate, dec!(1.0919));

        // Within the freshness window no further download happens.
        backend
            .get_rate(&Currency::eur(), &Currency::gbp(), None)
            .await
            .unwrap();
        assert_eq!(stub.hit_count(), 1);
    }
}
