//! On-disk rate cache: freshness checking, atomic refresh, table snapshots.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};
use crate::store::RateTable;

/// Cached data at least this old is re-downloaded before serving a lookup.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

// Refresh sections are interned per cache path: every manager pointing at
// the same file shares one critical section, so concurrent refreshes
// collapse into a single download even across backend instances.
static REFRESH_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>> = OnceLock::new();

fn refresh_lock_for(path: &Path) -> Arc<AsyncMutex<()>> {
    let locks = REFRESH_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut locks = locks.lock();
    if let Some(lock) = locks.get(path).and_then(Weak::upgrade) {
        return lock;
    }
    locks.retain(|_, weak| weak.strong_count() > 0);
    let lock = Arc::new(AsyncMutex::new(()));
    locks.insert(path.to_path_buf(), Arc::downgrade(&lock));
    lock
}

/// Owns the on-disk cache file and the in-memory [`RateTable`] snapshot.
///
/// Only the refresh path writes the file or replaces the snapshot, inside
/// the shared critical section with a double-checked freshness test. The
/// snapshot itself is immutable and swapped wholesale, so readers observe
/// either the old or the new table, never a partially-built one.
pub struct CacheManager {
    cache_file: PathBuf,
    endpoint: String,
    http: reqwest::Client,
    request_timeout: Duration,
    freshness_window: Duration,
    refresh: Arc<AsyncMutex<()>>,
    table: RwLock<Arc<RateTable>>,
}

impl CacheManager {
    /// Open a cache backed by `cache_file`, downloading from `endpoint`
    /// when stale. Performs the initial synchronization:
    ///
    /// - stale or absent file: one download attempt; a failure with a
    ///   readable file on disk degrades to the stale data with a warning,
    ///   a failure with no file fails construction;
    /// - the file is then parsed into the initial snapshot, and an
    ///   unreadable file fails construction.
    pub async fn open(
        cache_file: PathBuf,
        endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> FxResult<Self> {
        Self::open_with_window(cache_file, endpoint, request_timeout, FRESHNESS_WINDOW).await
    }

    /// [`CacheManager::open`] with a custom freshness window.
    pub async fn open_with_window(
        cache_file: PathBuf,
        endpoint: impl Into<String>,
        request_timeout: Duration,
        freshness_window: Duration,
    ) -> FxResult<Self> {
        if let Some(dir) = cache_file.parent() {
            fs::create_dir_all(dir).map_err(|source| FxError::CacheWrite {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let manager = Self {
            refresh: refresh_lock_for(&cache_file),
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
            request_timeout,
            freshness_window,
            table: RwLock::new(Arc::new(RateTable::default())),
            cache_file,
        };
        manager.initial_load().await?;
        Ok(manager)
    }

    /// Path of the on-disk cache file.
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Current table snapshot (cheap `Arc` clone).
    pub fn table(&self) -> Arc<RateTable> {
        self.table.read().clone()
    }

    /// Guarantee the snapshot reflects data younger than the freshness
    /// window, downloading and rebuilding it if not.
    ///
    /// Concurrent callers during a stale window collapse into one download:
    /// whoever enters the critical section first refreshes, the rest
    /// re-check freshness and observe the post-refresh state. A failed
    /// refresh propagates and leaves the previous file and snapshot
    /// untouched.
    pub async fn ensure_fresh(&self) -> FxResult<()> {
        if self.is_fresh() {
            return Ok(());
        }

        let _guard = self.refresh.lock().await;
        // Re-check: a caller we waited on may have already refreshed.
        if self.is_fresh() {
            return Ok(());
        }

        self.download().await?;
        self.reload()?;
        Ok(())
    }

    async fn initial_load(&self) -> FxResult<()> {
        let _guard = self.refresh.lock().await;
        if !self.is_fresh() {
            if let Err(err) = self.download().await {
                if !self.cache_file.is_file() {
                    return Err(err);
                }
                warn!(error = %err, "Rate download failed, serving stale cache");
            }
        }
        self.reload()
    }

    fn is_fresh(&self) -> bool {
        let age = fs::metadata(&self.cache_file)
            .and_then(|meta| meta.modified())
            .map(|mtime| mtime.elapsed());
        match age {
            Ok(Ok(age)) => age < self.freshness_window,
            // A modification time in the future means it was just written.
            Ok(Err(_)) => true,
            Err(_) => false,
        }
    }

    /// Download the full dataset and replace the cache file atomically.
    async fn download(&self) -> FxResult<()> {
        debug!(endpoint = %self.endpoint, "Downloading rate history");
        let response = self
            .http
            .get(&self.endpoint)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        // Write-then-rename: a failed write never clobbers the cache file.
        let staging = self.cache_file.with_extension("tmp");
        fs::write(&staging, &body).map_err(|source| FxError::CacheWrite {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.cache_file).map_err(|source| FxError::CacheWrite {
            path: self.cache_file.clone(),
            source,
        })?;
        Ok(())
    }

    fn reload(&self) -> FxResult<()> {
        let table = RateTable::load(&self.cache_file)?;
        info!(dates = table.len(), "Rebuilt rate table from cache");
        *self.table.write() = Arc::new(table);
        Ok(())
    }
}
