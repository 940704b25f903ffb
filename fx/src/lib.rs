//! Cambist FX Engine
//!
//! FX rate resolution and caching for currency-aware monetary values.
//!
//! # Features
//!
//! - Pluggable rate-source abstraction behind a swappable registry
//! - Historical ECB daily rates with a 24-hour on-disk cache
//! - Thread-safe on-demand refresh (one download per stale window)
//! - Backward date-walk fallback for gaps in the upstream data
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cambist_common::{Currency, Money};
//! use cambist_fx::{BackendRegistry, ConversionService, EcbBackend, FxConfig};
//!
//! let config = FxConfig::from_env();
//! let backend = Arc::new(EcbBackend::new(config.clone()).await?);
//! let registry = Arc::new(BackendRegistry::new(backend));
//! let service = ConversionService::new(registry, config);
//!
//! let eur = Money::from_str("100.00", Currency::eur())?;
//! let usd = service.convert(&eur, Currency::usd(), None).await?;
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod ecb;
pub mod error;
pub mod provider;
pub mod store;

#[cfg(test)]
mod testsupport;

pub use cache::CacheManager;
pub use config::{FallbackMode, FxConfig};
pub use conversion::ConversionService;
pub use ecb::EcbBackend;
pub use error::{FxError, FxResult};
pub use provider::{BackendRegistry, RateSource};
pub use store::RateTable;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
