//! The resolution engine.
//!
//! A [`Resolver`] turns host names into addresses. Each resolution walks
//! the same ladder: a literal IP address is returned as is; then the
//! hosts-file table is consulted, then the cache; only on a miss does the
//! engine query name servers, expanding the name across the configured
//! search domains, fanning out one query per preferred address family,
//! retrying across servers, and giving up once the configured query
//! ceiling is reached. Whatever the network round ends with — addresses
//! or a final failure — is written back to the cache.
//!
//! The resolver is a cheap handle over shared state and can be cloned
//! freely. Its transport must be spawned separately; see [`Resolver::new`].
//!
//! The single-address and all-addresses entry points share one state
//! machine parameterized by an aggregation mode, rather than being two
//! separate implementations: the mode only decides whether the first
//! usable answer completes the resolution or every matching address is
//! collected from the winning round.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::cache::{CacheEntry, HostCache, InMemoryCache};
use crate::conf::{AddressFamily, ResolverConf};
use crate::error::{Attempt, QueryError, ResolveError, UnknownHost};
use crate::hosts::{Hosts, HostsResolver};
use crate::name::{candidates, HostName};
use crate::servers::ServerList;
use crate::transport::{Answer, Channel, DgramEndpoint, Transport};
use bytes::Bytes;
use domain::base::iana::OptRcode;
use domain::base::{Message, Name, Question, ToName};
use domain::rdata::{A, Aaaa};
use futures_util::future::{BoxFuture, FutureExt, WeakShared};
use futures_util::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

//------------ Resolver ------------------------------------------------------

/// An asynchronous stub resolver over one shared UDP channel.
#[derive(Clone)]
pub struct Resolver {
    /// The state shared by all clones of the handle.
    inner: Arc<Inner>,
}

/// The shared state of a resolver.
struct Inner {
    /// The configuration the resolver was built with.
    conf: ResolverConf,

    /// The handle to the shared UDP channel.
    channel: Channel,

    /// The name servers to query.
    servers: ServerList,

    /// The hosts-file override table.
    hosts: Arc<dyn HostsResolver>,

    /// The resolution cache.
    cache: Arc<dyn HostCache>,

    /// Uncached resolutions currently under way.
    ///
    /// Concurrent lookups for the same host and mode against the
    /// resolver's own cache share the entry here, so the network is asked
    /// once and exactly one cache write happens. The handles are weak: the
    /// map must never keep a lookup alive on its own, so dropping the last
    /// caller drops the lookup and every query it has in flight.
    pending: Mutex<HashMap<(HostName, AggregationMode), WeakLookup>>,
}

/// The boxed future driving one deduplicated lookup.
type LookupFuture =
    BoxFuture<'static, Result<Arc<[CacheEntry]>, ResolveError>>;

/// The pending map's weak handle to a lookup in progress.
type WeakLookup = WeakShared<LookupFuture>;

impl Resolver {
    /// Creates a resolver from a configuration.
    ///
    /// Binds the shared UDP socket and returns the resolver together with
    /// its transport; the caller must spawn the transport's
    /// [`run`][Transport::run] future, typically via `tokio::spawn`. The
    /// resolver starts with an empty hosts table and a fresh in-memory
    /// cache.
    pub async fn new(
        conf: ResolverConf,
    ) -> Result<(Self, Transport), io::Error> {
        let socket = UdpSocket::bind(conf.local_addr()).await?;
        Ok(Self::with_endpoint(conf, Box::new(socket)))
    }

    /// Creates a resolver on a caller-supplied endpoint.
    pub fn with_endpoint(
        conf: ResolverConf,
        endpoint: Box<dyn DgramEndpoint>,
    ) -> (Self, Transport) {
        Self::with_parts(
            conf,
            endpoint,
            Arc::new(Hosts::new()),
            Arc::new(InMemoryCache::new()),
        )
    }

    /// Creates a resolver from all its parts.
    pub fn with_parts(
        conf: ResolverConf,
        endpoint: Box<dyn DgramEndpoint>,
        hosts: Arc<dyn HostsResolver>,
        cache: Arc<dyn HostCache>,
    ) -> (Self, Transport) {
        let (channel, transport) =
            Channel::new(&conf, endpoint, cache.clone());
        let servers = ServerList::new(conf.servers());
        let resolver = Resolver {
            inner: Arc::new(Inner {
                conf,
                channel,
                servers,
                hosts,
                cache,
                pending: Mutex::new(HashMap::new()),
            }),
        };
        (resolver, transport)
    }

    /// Returns the resolver's configuration.
    pub fn conf(&self) -> &ResolverConf {
        &self.inner.conf
    }

    /// Resolves a host name into a single address.
    ///
    /// The address is the first resolved one whose family comes earliest
    /// in the configured preference order. Dropping the returned future
    /// cancels the resolution and every query it has in flight.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        self.resolve_first(host, self.inner.cache.clone(), true).await
    }

    /// Resolves a single address using a caller-supplied cache.
    ///
    /// The given cache replaces the resolver's own for this call only.
    pub async fn resolve_with_cache(
        &self,
        host: &str,
        cache: Arc<dyn HostCache>,
    ) -> Result<IpAddr, ResolveError> {
        self.resolve_first(host, cache, false).await
    }

    /// Resolves a host name into every address of the preferred families.
    pub async fn resolve_all(
        &self,
        host: &str,
    ) -> Result<ResolvedAddrs, ResolveError> {
        self.resolve_every(host, self.inner.cache.clone(), true).await
    }

    /// Resolves all addresses using a caller-supplied cache.
    pub async fn resolve_all_with_cache(
        &self,
        host: &str,
        cache: Arc<dyn HostCache>,
    ) -> Result<ResolvedAddrs, ResolveError> {
        self.resolve_every(host, cache, false).await
    }

    /// Sends a raw question to the next server of the stream.
    ///
    /// This bypasses the hosts table and the cache entirely and performs
    /// exactly one query against one server.
    pub async fn query(
        &self,
        question: Question<Name<Bytes>>,
    ) -> Result<Answer, QueryError> {
        let mut cursor =
            self.inner.servers.cursor(self.inner.conf.rotate());
        let server = cursor.next().ok_or(QueryError::NoServers)?;
        self.inner.channel.query(server, question).await
    }

    /// Sends a raw question to a specific server.
    pub async fn query_server(
        &self,
        server: SocketAddr,
        question: Question<Name<Bytes>>,
    ) -> Result<Answer, QueryError> {
        self.inner.channel.query(server, question).await
    }

    /// The single-address resolution ladder.
    async fn resolve_first(
        &self,
        host: &str,
        cache: Arc<dyn HostCache>,
        share: bool,
    ) -> Result<IpAddr, ResolveError> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(addr);
        }
        let host = HostName::from_user(host)?;
        if let Some(addrs) = self.inner.hosts.lookup(&host) {
            if let Some(addr) = self.inner.first_by_pref(&addrs) {
                debug!("'{}': hosts file hit", host);
                return Ok(addr);
            }
            // Nothing of a preferred family listed; fall through.
        }
        let entries = self
            .lookup(host.clone(), AggregationMode::FirstMatch, cache, share)
            .await?;
        let addrs: Vec<_> =
            entries.iter().filter_map(CacheEntry::to_addr).collect();
        self.inner.first_by_pref(&addrs).ok_or_else(|| {
            UnknownHost::new(host.as_str(), None, Vec::new()).into()
        })
    }

    /// The all-addresses resolution ladder.
    async fn resolve_every(
        &self,
        host: &str,
        cache: Arc<dyn HostCache>,
        share: bool,
    ) -> Result<ResolvedAddrs, ResolveError> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(ResolvedAddrs { addrs: vec![addr] });
        }
        let host = HostName::from_user(host)?;
        if let Some(addrs) = self.inner.hosts.lookup(&host) {
            let addrs = self.inner.all_by_pref(&addrs);
            if !addrs.is_empty() {
                debug!("'{}': hosts file hit", host);
                return Ok(ResolvedAddrs { addrs });
            }
        }
        let entries = self
            .lookup(host.clone(), AggregationMode::AllMatches, cache, share)
            .await?;
        let addrs: Vec<_> =
            entries.iter().filter_map(CacheEntry::to_addr).collect();
        let addrs = self.inner.all_by_pref(&addrs);
        if addrs.is_empty() {
            return Err(UnknownHost::new(
                host.as_str(),
                None,
                Vec::new(),
            )
            .into());
        }
        Ok(ResolvedAddrs { addrs })
    }

    /// Runs or joins the cache-and-network part of a resolution.
    ///
    /// With `share`, concurrent lookups for the same key ride on one
    /// underlying future. Per-call caches never share: one caller's cache
    /// must not receive another caller's write.
    async fn lookup(
        &self,
        host: HostName,
        mode: AggregationMode,
        cache: Arc<dyn HostCache>,
        share: bool,
    ) -> Result<Arc<[CacheEntry]>, ResolveError> {
        if !share {
            return lookup_uncached(self.inner.clone(), host, mode, cache)
                .await;
        }
        let key = (host.clone(), mode);
        let shared = {
            let mut pending = self.inner.pending.lock();
            match pending.get(&key).and_then(|weak| weak.upgrade()) {
                Some(shared) => shared,
                None => {
                    let inner = self.inner.clone();
                    let guard = PendingGuard {
                        inner: inner.clone(),
                        key: key.clone(),
                    };
                    let fut = async move {
                        let _guard = guard;
                        lookup_uncached(inner, host, mode, cache).await
                    }
                    .boxed()
                    .shared();
                    if let Some(weak) = fut.downgrade() {
                        pending.insert(key, weak);
                    }
                    fut
                }
            }
        };
        shared.await
    }
}

//------------ PendingGuard --------------------------------------------------

/// Removes a lookup's pending-map entry when its future goes away.
///
/// The guard lives inside the lookup future, so the entry disappears both
/// on regular completion and when the last caller cancels by dropping out.
/// By the time a replacement entry can be inserted under the same key, the
/// old future and its guard are already gone.
struct PendingGuard {
    /// The shared state holding the pending map.
    inner: Arc<Inner>,

    /// The key the lookup is registered under.
    key: (HostName, AggregationMode),
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner.pending.lock().remove(&self.key);
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("conf", &self.inner.conf)
            .finish_non_exhaustive()
    }
}

/// Consults the cache and, on a miss, the network.
///
/// Both outcomes of an actual network round are written back: addresses
/// with their clamped TTLs, or a negative row carrying the failure. A
/// resolution cancelled before this point writes nothing.
async fn lookup_uncached(
    inner: Arc<Inner>,
    host: HostName,
    mode: AggregationMode,
    cache: Arc<dyn HostCache>,
) -> Result<Arc<[CacheEntry]>, ResolveError> {
    let row = cache.get(&host).await;
    if let Some(first) = row.first() {
        if let Some(cause) = first.cause() {
            debug!("'{}': cached failure", host);
            return Err(cause.clone());
        }
        if inner.row_matches_pref(&row) {
            debug!("'{}': cache hit", host);
            return Ok(row.into());
        }
        // A row without any preferred family is a miss.
    }
    match inner.query_loop(&host, mode).await {
        Ok(entries) => {
            cache.put(&host, entries.clone(), row_ttl(&entries)).await;
            Ok(entries)
        }
        Err(err) => {
            if matches!(err, ResolveError::UnknownHost(_)) {
                let ttl = inner.conf.negative_ttl();
                let entries: Arc<[CacheEntry]> =
                    vec![CacheEntry::fail(err.clone(), ttl)].into();
                cache.put(&host, entries, ttl).await;
            }
            Err(err)
        }
    }
}

/// Returns how long a freshly built row is worth keeping.
fn row_ttl(entries: &[CacheEntry]) -> Duration {
    let now = Instant::now();
    entries
        .iter()
        .map(|entry| entry.valid_until().duration_since(now))
        .max()
        .unwrap_or_default()
}

impl Inner {
    /// Returns the first address of the earliest preferred family.
    fn first_by_pref(&self, addrs: &[IpAddr]) -> Option<IpAddr> {
        self.conf.families().iter().find_map(|family| {
            addrs.iter().copied().find(|addr| family.matches(*addr))
        })
    }

    /// Returns all addresses of preferred families, preferred ones first.
    fn all_by_pref(&self, addrs: &[IpAddr]) -> Vec<IpAddr> {
        self.conf
            .families()
            .iter()
            .flat_map(|family| {
                addrs
                    .iter()
                    .copied()
                    .filter(|addr| family.matches(*addr))
            })
            .collect()
    }

    /// Returns whether a cached row holds any preferred-family address.
    fn row_matches_pref(&self, row: &[CacheEntry]) -> bool {
        row.iter().filter_map(CacheEntry::to_addr).any(|addr| {
            self.conf
                .families()
                .iter()
                .any(|family| family.matches(addr))
        })
    }

    /// Queries the network until an answer is found or every avenue fails.
    ///
    /// The walk is candidate name by candidate name; per candidate, server
    /// by server; per server, one concurrent query per preferred family.
    /// A usable answer ends the walk (in first-match mode the moment it
    /// arrives, cancelling the sibling family's query). NXDOMAIN or clean
    /// empty answers are decisive for the candidate name and move on to
    /// the next one; timeouts and server failures move on to the next
    /// server. Every datagram sent counts against the query ceiling.
    async fn query_loop(
        &self,
        host: &HostName,
        mode: AggregationMode,
    ) -> Result<Arc<[CacheEntry]>, ResolveError> {
        if self.servers.is_empty() {
            return Err(ResolveError::NoServers);
        }
        let max_queries = self.conf.max_queries();
        let mut sends = 0usize;
        let mut last_err: Option<QueryError> = None;
        let mut attempts: Vec<Attempt> = Vec::new();

        for qname in
            candidates(host, self.conf.search(), self.conf.ndots())
        {
            let Ok(wire) = qname.to_wire() else {
                // An expansion too long for the wire; skip it.
                continue;
            };
            let mut cursor = self.servers.cursor(self.conf.rotate());
            'servers: while let Some(server) = cursor.next() {
                let mut round = FuturesUnordered::new();
                for &family in self.conf.families() {
                    if sends >= max_queries {
                        if round.is_empty() {
                            return Err(ResolveError::TooManyQueries(
                                max_queries,
                            ));
                        }
                        break;
                    }
                    sends += 1;
                    let question =
                        Question::new_in(wire.clone(), family.rtype());
                    round.push(async move {
                        (family, self.channel.query(server, question).await)
                    });
                }

                let mut found: Vec<CacheEntry> = Vec::new();
                let mut dead = false;
                let mut retry = false;
                while let Some((family, res)) = round.next().await {
                    let err = match res {
                        Ok(answer) => match answer.rcode() {
                            OptRcode::NOERROR => {
                                match self.extract(&answer, family) {
                                    Ok(entries) if !entries.is_empty() => {
                                        found.extend(entries);
                                        if mode
                                            == AggregationMode::FirstMatch
                                        {
                                            break;
                                        }
                                        continue;
                                    }
                                    Ok(_) => continue,
                                    Err(err) => err,
                                }
                            }
                            OptRcode::NXDOMAIN => {
                                dead = true;
                                if mode == AggregationMode::FirstMatch {
                                    break;
                                }
                                continue;
                            }
                            rcode => QueryError::ServerFailure(rcode),
                        },
                        Err(err) => err,
                    };
                    debug!("'{}' @ {}: {}", qname, server, err);
                    if self.conf.trace() {
                        attempts.push(Attempt::new(
                            qname.as_str(),
                            server,
                            err.clone(),
                        ));
                    }
                    last_err = Some(err);
                    retry = true;
                }
                drop(round);

                if !found.is_empty() {
                    debug!(
                        "'{}': resolved via '{}' @ {}",
                        host, qname, server
                    );
                    return Ok(found.into());
                }
                if dead {
                    // The candidate name does not exist; no point in
                    // asking the remaining servers about it.
                    break 'servers;
                }
                if retry {
                    continue 'servers;
                }
                // Clean but empty answers: the name exists without any
                // usable address record.
                break 'servers;
            }
        }
        Err(UnknownHost::new(host.as_str(), last_err, attempts).into())
    }

    /// Extracts the cacheable address entries of one family from an answer.
    ///
    /// Records are filtered by the answer's canonical owner name, so a
    /// CNAME indirection yields the addresses of its target. TTLs are
    /// clamped into the configured window.
    fn extract(
        &self,
        answer: &Answer,
        family: AddressFamily,
    ) -> Result<Vec<CacheEntry>, QueryError> {
        let msg: &Message<Bytes> = answer.as_ref();
        let Some(canonical) = msg.canonical_name() else {
            return Err(QueryError::Malformed);
        };
        let section = msg.answer().map_err(|_| QueryError::Malformed)?;
        let mut entries = Vec::new();
        match family {
            AddressFamily::V4 => {
                for record in section.limit_to::<A>() {
                    let record =
                        record.map_err(|_| QueryError::Malformed)?;
                    if record.owner().name_eq(&canonical) {
                        entries.push(self.entry(
                            record.data().addr().into(),
                            record.ttl().as_secs(),
                        ));
                    }
                }
            }
            AddressFamily::V6 => {
                for record in section.limit_to::<Aaaa>() {
                    let record =
                        record.map_err(|_| QueryError::Malformed)?;
                    if record.owner().name_eq(&canonical) {
                        entries.push(self.entry(
                            record.data().addr().into(),
                            record.ttl().as_secs(),
                        ));
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Builds an address entry with its TTL clamped.
    fn entry(&self, addr: IpAddr, ttl_secs: u32) -> CacheEntry {
        let ttl =
            self.conf.clamp_ttl(Duration::from_secs(ttl_secs.into()));
        CacheEntry::addr(addr, ttl)
    }
}

//------------ AggregationMode -----------------------------------------------

/// How a resolution aggregates resolved addresses.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum AggregationMode {
    /// The first usable answer completes the resolution.
    FirstMatch,

    /// Every matching address of the winning round is collected.
    AllMatches,
}

//------------ ResolvedAddrs -------------------------------------------------

/// The addresses a host name resolved into.
///
/// Addresses are ordered by the configured family preference first and by
/// the answer's record order within a family.
#[derive(Clone, Debug)]
pub struct ResolvedAddrs {
    /// The resolved addresses.
    addrs: Vec<IpAddr>,
}

impl ResolvedAddrs {
    /// Returns the addresses as a slice.
    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// Returns an iterator over the addresses.
    pub fn iter(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.addrs.iter().copied()
    }

    /// Returns an iterator over socket addresses with the given port.
    pub fn port_iter(
        &self,
        port: u16,
    ) -> impl Iterator<Item = SocketAddr> + '_ {
        self.addrs
            .iter()
            .map(move |addr| SocketAddr::new(*addr, port))
    }

    /// Converts the value into the plain address list.
    pub fn into_vec(self) -> Vec<IpAddr> {
        self.addrs
    }
}

impl IntoIterator for ResolvedAddrs {
    type Item = IpAddr;
    type IntoIter = std::vec::IntoIter<IpAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::NoCache;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::yield_now;

    /// An endpoint that answers nothing and counts what was sent.
    #[derive(Debug, Default)]
    struct BlackHole {
        /// The number of datagrams sent into the void.
        sends: AtomicUsize,
    }

    impl DgramEndpoint for Arc<BlackHole> {
        fn send_to<'a>(
            &'a self,
            dgram: &'a [u8],
            _dest: SocketAddr,
        ) -> Pin<
            Box<dyn Future<Output = Result<usize, io::Error>> + Send + 'a>,
        > {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let len = dgram.len();
            Box::pin(async move { Ok(len) })
        }

        fn recv_from<'a>(
            &'a self,
            _buf: &'a mut [u8],
        ) -> Pin<
            Box<
                dyn Future<
                        Output = Result<(usize, SocketAddr), io::Error>,
                    > + Send
                    + 'a,
            >,
        > {
            Box::pin(std::future::pending())
        }
    }

    fn base_conf() -> ResolverConf {
        let mut conf = ResolverConf::new();
        conf.add_server("192.0.2.53:53".parse().unwrap());
        conf.set_query_timeout(Duration::from_millis(100));
        conf
    }

    fn black_hole_resolver(
        conf: ResolverConf,
    ) -> (Resolver, Arc<BlackHole>) {
        let endpoint = Arc::new(BlackHole::default());
        let (resolver, transport) =
            Resolver::with_endpoint(conf, Box::new(endpoint.clone()));
        tokio::spawn(transport.run());
        (resolver, endpoint)
    }

    #[tokio::test(start_paused = true)]
    async fn literal_ip_issues_no_queries() {
        let (resolver, endpoint) = black_hole_resolver(base_conf());
        assert_eq!(
            resolver.resolve("192.0.2.7").await.unwrap(),
            "192.0.2.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            resolver.resolve("2001:db8::7").await.unwrap(),
            "2001:db8::7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            resolver.resolve_all("192.0.2.7").await.unwrap().addrs(),
            ["192.0.2.7".parse::<IpAddr>().unwrap()]
        );
        assert_eq!(endpoint.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hosts_file_hit_issues_no_queries() {
        let mut hosts = Hosts::new();
        let name = HostName::from_user("printer.local").unwrap();
        hosts.add(&name, "192.0.2.40".parse().unwrap());
        let endpoint = Arc::new(BlackHole::default());
        let (resolver, transport) = Resolver::with_parts(
            base_conf(),
            Box::new(endpoint.clone()),
            Arc::new(hosts),
            Arc::new(InMemoryCache::new()),
        );
        tokio::spawn(transport.run());

        assert_eq!(
            resolver.resolve("printer.local").await.unwrap(),
            "192.0.2.40".parse::<IpAddr>().unwrap()
        );
        assert_eq!(endpoint.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_row_issues_no_queries() {
        let (resolver, endpoint) = black_hole_resolver(base_conf());
        let name = HostName::from_user("cached.test").unwrap();
        let entries: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "10.0.0.1".parse().unwrap(),
            Duration::from_secs(60),
        )]
        .into();
        resolver
            .inner
            .cache
            .put(&name, entries, Duration::from_secs(60))
            .await;

        assert_eq!(
            resolver.resolve("cached.test").await.unwrap(),
            "10.0.0.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(endpoint.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_failure_fails_without_queries() {
        let (resolver, endpoint) = black_hole_resolver(base_conf());
        let name = HostName::from_user("bad.test").unwrap();
        let cause: ResolveError =
            UnknownHost::new("bad.test", None, Vec::new()).into();
        let entries: Arc<[CacheEntry]> =
            vec![CacheEntry::fail(cause, Duration::from_secs(30))].into();
        resolver
            .inner
            .cache
            .put(&name, entries, Duration::from_secs(30))
            .await;

        let err = resolver.resolve("bad.test").await.unwrap_err();
        assert!(err.is_unknown_host());
        assert_eq!(endpoint.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_row_of_wrong_family_is_a_miss() {
        let mut conf = base_conf();
        conf.set_families(&[AddressFamily::V6]);
        conf.set_max_queries(1);
        let (resolver, endpoint) = black_hole_resolver(conf);
        let name = HostName::from_user("v4only.test").unwrap();
        let entries: Arc<[CacheEntry]> = vec![CacheEntry::addr(
            "10.0.0.1".parse().unwrap(),
            Duration::from_secs(60),
        )]
        .into();
        resolver
            .inner
            .cache
            .put(&name, entries, Duration::from_secs(60))
            .await;

        // The v4-only row must not satisfy a v6-only preference; the
        // resolver goes to the (dead) network instead.
        let err = resolver.resolve("v4only.test").await.unwrap_err();
        assert!(err.is_unknown_host());
        assert!(endpoint.sends.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn query_ceiling_is_a_hard_stop() {
        let mut conf = base_conf();
        conf.add_server("192.0.2.54:53".parse().unwrap());
        conf.set_families(&[AddressFamily::V4]);
        conf.set_max_queries(1);
        let (resolver, endpoint) =
            black_hole_resolver(conf);

        let err = resolver
            .resolve_with_cache("big.test", Arc::new(NoCache))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::TooManyQueries(1)));
        assert_eq!(endpoint.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_servers_fail_with_last_cause() {
        let mut conf = base_conf();
        conf.set_families(&[AddressFamily::V4]);
        let (resolver, endpoint) = black_hole_resolver(conf);

        let err = resolver
            .resolve_with_cache("slow.test", Arc::new(NoCache))
            .await
            .unwrap_err();
        let ResolveError::UnknownHost(err) = err else {
            panic!("expected unknown host, got {err:?}")
        };
        assert!(matches!(err.cause(), Some(QueryError::Timeout)));
        assert!(!err.attempts().is_empty());
        assert_eq!(endpoint.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_shared_lookup_releases_its_state() {
        let (resolver, endpoint) = black_hole_resolver(base_conf());
        let server: SocketAddr = "192.0.2.53:53".parse().unwrap();

        let mut lookup = Box::pin(resolver.resolve("leak.test"));
        // Drive the lookup until its first query hits the endpoint.
        loop {
            tokio::select! {
                biased;
                _ = &mut lookup => panic!("resolved against a black hole"),
                _ = yield_now() => {}
            }
            if endpoint.sends.load(Ordering::SeqCst) > 0 {
                break;
            }
        }
        assert!(!resolver.inner.pending.lock().is_empty());

        // Dropping the sole caller must synchronously release both the
        // deduplication entry and the query registration.
        drop(lookup);
        assert!(resolver.inner.pending.lock().is_empty());
        assert_eq!(resolver.inner.channel.outstanding(server), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_servers_is_an_immediate_failure() {
        let mut conf = ResolverConf::new();
        conf.set_query_timeout(Duration::from_millis(100));
        let (resolver, _endpoint) = black_hole_resolver(conf);
        let err = resolver.resolve("any.test").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoServers));
    }

    #[test]
    fn preference_order_governs_selection() {
        let mut conf = ResolverConf::new();
        conf.set_families(&[AddressFamily::V6, AddressFamily::V4]);
        let endpoint = Arc::new(BlackHole::default());
        let (resolver, _transport) =
            Resolver::with_endpoint(conf, Box::new(endpoint));

        let v4: IpAddr = "192.0.2.1".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(resolver.inner.first_by_pref(&[v4, v6]), Some(v6));
        assert_eq!(resolver.inner.all_by_pref(&[v4, v6]), [v6, v4]);
        assert_eq!(resolver.inner.first_by_pref(&[]), None);
    }
}
