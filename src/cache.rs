//! The resolution cache.
//!
//! Completed resolutions — successful or not — are stored per host name so
//! repeat lookups stay off the network while their TTL lasts. A row is
//! either a list of address entries or a single failure entry carrying the
//! error that sank the resolution (negative caching). Rows are replaced
//! wholesale, never edited, so readers either see the old list or the new
//! one.
//!
//! The [`HostCache`] trait keeps the cache pluggable: the resolver is built
//! with an [`InMemoryCache`] by default, callers can swap in [`NoCache`] or
//! their own store, and individual calls can substitute a cache of their
//! own.
//!
//! Expiry is lazy. Entries carry their own deadline; reads filter out
//! anything past it and drop rows with nothing live left. Nothing sweeps in
//! the background, the capacity bound takes care of stragglers.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::error::ResolveError;
use crate::name::HostName;
use moka::future::Cache;
use std::fmt::Debug;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The default maximum number of rows kept by [`InMemoryCache`].
const DEF_CAPACITY: u64 = 1000;

//------------ CacheEntry ----------------------------------------------------

/// One element of a cache row.
///
/// A row for a host name holds either address entries only or exactly one
/// failure entry; the two never mix.
#[derive(Clone, Debug)]
pub enum CacheEntry {
    /// A resolved address.
    Addr {
        /// The address.
        addr: IpAddr,

        /// The moment this entry stops being served.
        valid_until: Instant,
    },

    /// A failed resolution, cached to absorb repeat lookups.
    Fail {
        /// The error the resolution ended with.
        cause: ResolveError,

        /// The moment this entry stops being served.
        valid_until: Instant,
    },
}

impl CacheEntry {
    /// Creates an address entry valid for `ttl` from now.
    pub fn addr(addr: IpAddr, ttl: Duration) -> Self {
        CacheEntry::Addr {
            addr,
            valid_until: Instant::now() + ttl,
        }
    }

    /// Creates a failure entry valid for `ttl` from now.
    pub fn fail(cause: ResolveError, ttl: Duration) -> Self {
        CacheEntry::Fail {
            cause,
            valid_until: Instant::now() + ttl,
        }
    }

    /// Returns the address if this is an address entry.
    pub fn to_addr(&self) -> Option<IpAddr> {
        match self {
            CacheEntry::Addr { addr, .. } => Some(*addr),
            CacheEntry::Fail { .. } => None,
        }
    }

    /// Returns the failure cause if this is a failure entry.
    pub fn cause(&self) -> Option<&ResolveError> {
        match self {
            CacheEntry::Addr { .. } => None,
            CacheEntry::Fail { cause, .. } => Some(cause),
        }
    }

    /// Returns the moment this entry stops being served.
    pub fn valid_until(&self) -> Instant {
        match self {
            CacheEntry::Addr { valid_until, .. } => *valid_until,
            CacheEntry::Fail { valid_until, .. } => *valid_until,
        }
    }

    /// Returns whether the entry is still live at the given moment.
    fn is_live(&self, now: Instant) -> bool {
        now < self.valid_until()
    }
}

//------------ HostCache -----------------------------------------------------

/// A store of completed resolutions keyed by host name.
///
/// Implementations must serve concurrent readers and writers; a `put` for a
/// host replaces that host's row atomically from the readers' perspective.
/// The engine never mutates an entry list after handing it over.
pub trait HostCache: Debug + Send + Sync {
    /// Returns the live entries for a host.
    ///
    /// An empty vec means no row; expired entries are never returned.
    fn get<'a>(
        &'a self,
        host: &'a HostName,
    ) -> Pin<Box<dyn Future<Output = Vec<CacheEntry>> + Send + 'a>>;

    /// Stores the row for a host, replacing any previous row.
    ///
    /// `ttl` bounds the retention of the row as a whole; the entries carry
    /// their own finer-grained deadlines.
    fn put<'a>(
        &'a self,
        host: &'a HostName,
        entries: Arc<[CacheEntry]>,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    /// Drops every row.
    fn clear<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

//------------ InMemoryCache -------------------------------------------------

/// The default in-memory cache.
///
/// Rows live in a bounded concurrent map; the bound evicts least-recently
/// used rows, while reads weed out rows whose time has run out.
#[derive(Clone, Debug)]
pub struct InMemoryCache {
    /// The row store.
    cache: Cache<HostName, Arc<Row>>,
}

/// A stored cache row.
#[derive(Debug)]
struct Row {
    /// The entries of the row.
    entries: Arc<[CacheEntry]>,

    /// The moment the row as a whole stops being served.
    valid_until: Instant,
}

impl InMemoryCache {
    /// Creates a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEF_CAPACITY)
    }

    /// Creates a cache bounded to the given number of rows.
    pub fn with_capacity(max_rows: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_rows).build(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCache for InMemoryCache {
    fn get<'a>(
        &'a self,
        host: &'a HostName,
    ) -> Pin<Box<dyn Future<Output = Vec<CacheEntry>> + Send + 'a>> {
        Box::pin(async move {
            let Some(row) = self.cache.get(host).await else {
                return Vec::new();
            };
            let now = Instant::now();
            if now >= row.valid_until {
                self.cache.invalidate(host).await;
                return Vec::new();
            }
            let live: Vec<CacheEntry> = row
                .entries
                .iter()
                .filter(|entry| entry.is_live(now))
                .cloned()
                .collect();
            if live.is_empty() {
                self.cache.invalidate(host).await;
            }
            live
        })
    }

    fn put<'a>(
        &'a self,
        host: &'a HostName,
        entries: Arc<[CacheEntry]>,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let row = Arc::new(Row {
                entries,
                valid_until: Instant::now() + ttl,
            });
            self.cache.insert(host.clone(), row).await;
        })
    }

    fn clear<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.cache.invalidate_all();
        })
    }
}

//------------ NoCache -------------------------------------------------------

/// A cache that remembers nothing.
///
/// Substituting this turns caching off for a resolver or a single call.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl HostCache for NoCache {
    fn get<'a>(
        &'a self,
        _host: &'a HostName,
    ) -> Pin<Box<dyn Future<Output = Vec<CacheEntry>> + Send + 'a>> {
        Box::pin(async { Vec::new() })
    }

    fn put<'a>(
        &'a self,
        _host: &'a HostName,
        _entries: Arc<[CacheEntry]>,
        _ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }

    fn clear<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{ResolveError, UnknownHost};
    use std::time::Duration;

    fn host(s: &str) -> HostName {
        HostName::from_user(s).unwrap()
    }

    fn addrs(entries: &[CacheEntry]) -> Vec<IpAddr> {
        entries.iter().filter_map(CacheEntry::to_addr).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn put_get_roundtrip() {
        let cache = InMemoryCache::new();
        let name = host("one.example");
        let entries: Arc<[CacheEntry]> = vec![
            CacheEntry::addr(
                "192.0.2.1".parse().unwrap(),
                Duration::from_secs(60),
            ),
            CacheEntry::addr(
                "2001:db8::1".parse().unwrap(),
                Duration::from_secs(60),
            ),
        ]
        .into();
        cache.put(&name, entries, Duration::from_secs(60)).await;
        let got = cache.get(&name).await;
        assert_eq!(
            addrs(&got),
            [
                "192.0.2.1".parse::<IpAddr>().unwrap(),
                "2001:db8::1".parse::<IpAddr>().unwrap()
            ]
        );
        assert!(cache.get(&host("other.example")).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_independently() {
        let cache = InMemoryCache::new();
        let name = host("mixed.example");
        let entries: Arc<[CacheEntry]> = vec![
            CacheEntry::addr(
                "192.0.2.1".parse().unwrap(),
                Duration::from_secs(10),
            ),
            CacheEntry::addr(
                "192.0.2.2".parse().unwrap(),
                Duration::from_secs(60),
            ),
        ]
        .into();
        cache.put(&name, entries, Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        let got = cache.get(&name).await;
        assert_eq!(addrs(&got), ["192.0.2.2".parse::<IpAddr>().unwrap()]);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get(&name).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn row_ttl_caps_entries() {
        let cache = InMemoryCache::new();
        let name = host("capped.example");
        let entries: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "192.0.2.1".parse().unwrap(),
            Duration::from_secs(600),
        )]
        .into();
        cache.put(&name, entries, Duration::from_secs(30)).await;
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get(&name).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn put_replaces_whole_row() {
        let cache = InMemoryCache::new();
        let name = host("swap.example");
        let old: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "192.0.2.1".parse().unwrap(),
            Duration::from_secs(60),
        )]
        .into();
        let new: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "192.0.2.9".parse().unwrap(),
            Duration::from_secs(60),
        )]
        .into();
        cache.put(&name, old, Duration::from_secs(60)).await;
        cache.put(&name, new, Duration::from_secs(60)).await;
        let got = cache.get(&name).await;
        assert_eq!(addrs(&got), ["192.0.2.9".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_row_serves_its_cause() {
        let cache = InMemoryCache::new();
        let name = host("bad.example");
        let cause = ResolveError::from(UnknownHost::new(
            "bad.example",
            None,
            Vec::new(),
        ));
        let entries: Arc<[CacheEntry]> =
            vec![CacheEntry::fail(cause, Duration::from_secs(30))].into();
        cache.put(&name, entries, Duration::from_secs(30)).await;

        let got = cache.get(&name).await;
        assert_eq!(got.len(), 1);
        assert!(got[0].cause().unwrap().is_unknown_host());
        assert!(got[0].to_addr().is_none());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get(&name).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = InMemoryCache::new();
        let name = host("gone.example");
        let entries: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "192.0.2.1".parse().unwrap(),
            Duration::from_secs(60),
        )]
        .into();
        cache.put(&name, entries, Duration::from_secs(60)).await;
        cache.clear().await;
        assert!(cache.get(&name).await.is_empty());
    }

    #[tokio::test]
    async fn no_cache_is_inert() {
        let cache = NoCache;
        let name = host("any.example");
        let entries: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "192.0.2.1".parse().unwrap(),
            Duration::from_secs(60),
        )]
        .into();
        cache.put(&name, entries, Duration::from_secs(60)).await;
        assert!(cache.get(&name).await.is_empty());
    }
}
