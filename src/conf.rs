//! Resolver configuration.
//!
//! A [`ResolverConf`] collects everything a resolver needs to know before it
//! touches the network: the server endpoints, the search-domain list and
//! `ndots` threshold, timeouts and ceilings, the address-family preference
//! order, and cache TTL bounds. Nothing here is discovered from the host
//! system; whoever constructs the value injects the lot.
//!
//! Numeric and duration settings are clamped into sane ranges by their
//! setters, so a configuration can be built from untrusted input without
//! producing a resolver that spins or stalls.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::name::HostName;
use domain::base::Rtype;
use smallvec::{smallvec, SmallVec};
use std::cmp;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Configuration limits for the query timeout.
const QUERY_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(5),
    Duration::from_millis(1),
    Duration::from_secs(60),
);

/// Configuration limits for the query ceiling per resolution.
const MAX_QUERIES: DefMinMax<usize> = DefMinMax::new(8, 1, 64);

/// Configuration limits for the `ndots` threshold.
const NDOTS: DefMinMax<usize> = DefMinMax::new(1, 0, 15);

/// Configuration limits for the UDP payload size.
///
/// The default follows the flag-day recommendation for avoiding fragmented
/// UDP responses.
const MAX_PAYLOAD_SIZE: DefMinMax<u16> =
    DefMinMax::new(1232, 512, u16::MAX);

/// Configuration limits for the positive-entry TTL floor.
const MIN_TTL: DefMinMax<Duration> = DefMinMax::new(
    Duration::ZERO,
    Duration::ZERO,
    Duration::from_secs(3600),
);

/// Configuration limits for the positive-entry TTL cap.
const MAX_TTL: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(604800),
    Duration::from_secs(1),
    Duration::from_secs(30 * 24 * 3600),
);

/// Configuration limits for the negative-entry TTL.
const NEGATIVE_TTL: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(30),
    Duration::from_secs(1),
    Duration::from_secs(3600),
);

//------------ AddressFamily -------------------------------------------------

/// The address family of a resolved address.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressFamily {
    /// IPv4.
    V4,

    /// IPv6.
    V6,
}

impl AddressFamily {
    /// Returns whether the given address belongs to this family.
    ///
    /// The check is strict in both directions: a v4 address never satisfies
    /// a v6 preference and vice versa.
    pub fn matches(self, addr: IpAddr) -> bool {
        match self {
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }

    /// Returns the record type queried for this family.
    pub(crate) fn rtype(self) -> Rtype {
        match self {
            AddressFamily::V4 => Rtype::A,
            AddressFamily::V6 => Rtype::AAAA,
        }
    }
}

//------------ FamilyPref ----------------------------------------------------

/// The caller-ordered address-family preference list.
pub(crate) type FamilyPref = SmallVec<[AddressFamily; 2]>;

//------------ ResolverConf --------------------------------------------------

/// Configuration of a resolver.
#[derive(Clone, Debug)]
pub struct ResolverConf {
    /// The name servers to query, in configuration order.
    servers: Vec<SocketAddr>,

    /// The search-domain suffixes, in configuration order.
    search: Vec<HostName>,

    /// The dot-count threshold for search-domain expansion.
    ndots: usize,

    /// How long to wait for a response to a single query.
    query_timeout: Duration,

    /// The hard ceiling on queries sent for one resolution.
    max_queries: usize,

    /// The address families to resolve, most preferred first.
    families: FamilyPref,

    /// Whether queries ask the server to recurse.
    recursion_desired: bool,

    /// Whether the server list rotates between resolutions.
    rotate: bool,

    /// Whether failed resolutions carry a trace of every attempt.
    trace: bool,

    /// Whether queries advertise EDNS with our payload size.
    use_edns: bool,

    /// The UDP payload size: advertised via EDNS and used for receiving.
    max_payload_size: u16,

    /// The floor applied to record TTLs before caching.
    min_ttl: Duration,

    /// The cap applied to record TTLs before caching.
    max_ttl: Duration,

    /// The lifetime of negative cache entries.
    negative_ttl: Duration,

    /// The local address to bind the shared socket to.
    ///
    /// If `None`, an unspecified address of the first server's family is
    /// used with an ephemeral port.
    bind_addr: Option<SocketAddr>,
}

impl ResolverConf {
    /// Creates a new configuration with default values and no servers.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the configured name servers.
    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// Appends a name server.
    pub fn add_server(&mut self, addr: SocketAddr) {
        self.servers.push(addr);
    }

    /// Replaces the name server list.
    pub fn set_servers(&mut self, servers: Vec<SocketAddr>) {
        self.servers = servers;
    }

    /// Returns the search-domain suffixes.
    pub fn search(&self) -> &[HostName] {
        &self.search
    }

    /// Appends a search-domain suffix.
    pub fn add_search_domain(&mut self, suffix: HostName) {
        self.search.push(suffix);
    }

    /// Replaces the search-domain list.
    pub fn set_search(&mut self, search: Vec<HostName>) {
        self.search = search;
    }

    /// Returns the `ndots` threshold.
    pub fn ndots(&self) -> usize {
        self.ndots
    }

    /// Sets the `ndots` threshold.
    pub fn set_ndots(&mut self, value: usize) {
        self.ndots = NDOTS.limit(value)
    }

    /// Returns the per-query timeout.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Sets the per-query timeout.
    pub fn set_query_timeout(&mut self, value: Duration) {
        self.query_timeout = QUERY_TIMEOUT.limit(value)
    }

    /// Returns the query ceiling per resolution.
    pub fn max_queries(&self) -> usize {
        self.max_queries
    }

    /// Sets the query ceiling per resolution.
    pub fn set_max_queries(&mut self, value: usize) {
        self.max_queries = MAX_QUERIES.limit(value)
    }

    /// Returns the address-family preference order.
    pub fn families(&self) -> &[AddressFamily] {
        &self.families
    }

    /// Sets the address-family preference order.
    ///
    /// An empty slice restores the default of IPv4 before IPv6.
    pub fn set_families(&mut self, value: &[AddressFamily]) {
        if value.is_empty() {
            self.families = default_families();
        } else {
            self.families = value.into();
        }
    }

    /// Returns whether queries ask the server to recurse.
    pub fn recursion_desired(&self) -> bool {
        self.recursion_desired
    }

    /// Sets whether queries ask the server to recurse.
    pub fn set_recursion_desired(&mut self, value: bool) {
        self.recursion_desired = value
    }

    /// Returns whether the server list rotates between resolutions.
    pub fn rotate(&self) -> bool {
        self.rotate
    }

    /// Sets whether the server list rotates between resolutions.
    pub fn set_rotate(&mut self, value: bool) {
        self.rotate = value
    }

    /// Returns whether failed resolutions carry an attempt trace.
    pub fn trace(&self) -> bool {
        self.trace
    }

    /// Sets whether failed resolutions carry an attempt trace.
    pub fn set_trace(&mut self, value: bool) {
        self.trace = value
    }

    /// Returns whether queries advertise EDNS.
    pub fn use_edns(&self) -> bool {
        self.use_edns
    }

    /// Sets whether queries advertise EDNS.
    pub fn set_use_edns(&mut self, value: bool) {
        self.use_edns = value
    }

    /// Returns the UDP payload size.
    pub fn max_payload_size(&self) -> u16 {
        self.max_payload_size
    }

    /// Sets the UDP payload size.
    ///
    /// This is both the size advertised via EDNS and the size of the
    /// receive buffer, so responses up to this size can be accepted even
    /// when EDNS advertisement is off.
    pub fn set_max_payload_size(&mut self, value: u16) {
        self.max_payload_size = MAX_PAYLOAD_SIZE.limit(value)
    }

    /// Returns the TTL floor for positive cache entries.
    pub fn min_ttl(&self) -> Duration {
        self.min_ttl
    }

    /// Sets the TTL floor for positive cache entries.
    pub fn set_min_ttl(&mut self, value: Duration) {
        self.min_ttl = MIN_TTL.limit(value)
    }

    /// Returns the TTL cap for positive cache entries.
    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    /// Sets the TTL cap for positive cache entries.
    pub fn set_max_ttl(&mut self, value: Duration) {
        self.max_ttl = MAX_TTL.limit(value)
    }

    /// Returns the lifetime of negative cache entries.
    pub fn negative_ttl(&self) -> Duration {
        self.negative_ttl
    }

    /// Sets the lifetime of negative cache entries.
    pub fn set_negative_ttl(&mut self, value: Duration) {
        self.negative_ttl = NEGATIVE_TTL.limit(value)
    }

    /// Returns the explicit local bind address, if any.
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        self.bind_addr
    }

    /// Sets an explicit local bind address for the shared socket.
    pub fn set_bind_addr(&mut self, value: Option<SocketAddr>) {
        self.bind_addr = value
    }

    /// Clamps a record TTL into the configured window.
    pub(crate) fn clamp_ttl(&self, ttl: Duration) -> Duration {
        cmp::max(self.min_ttl, cmp::min(self.max_ttl, ttl))
    }

    /// Returns the local address the shared socket should bind to.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        if let Some(addr) = self.bind_addr {
            return addr;
        }
        match self.servers.first() {
            Some(addr) if addr.is_ipv6() => ([0u16; 8], 0).into(),
            _ => ([0u8; 4], 0).into(),
        }
    }
}

//--- Default

impl Default for ResolverConf {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            search: Vec::new(),
            ndots: NDOTS.default(),
            query_timeout: QUERY_TIMEOUT.default(),
            max_queries: MAX_QUERIES.default(),
            families: default_families(),
            recursion_desired: true,
            rotate: false,
            trace: true,
            use_edns: true,
            max_payload_size: MAX_PAYLOAD_SIZE.default(),
            min_ttl: MIN_TTL.default(),
            max_ttl: MAX_TTL.default(),
            negative_ttl: NEGATIVE_TTL.default(),
            bind_addr: None,
        }
    }
}

/// Returns the default family preference order.
fn default_families() -> FamilyPref {
    smallvec![AddressFamily::V4, AddressFamily::V6]
}

//------------ DefMinMax -----------------------------------------------------

/// The default, minimum, and maximum values for a config setting.
#[derive(Clone, Copy)]
struct DefMinMax<T> {
    /// The default value.
    def: T,

    /// The smallest acceptable value.
    min: T,

    /// The largest acceptable value.
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new triple.
    const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit between the minimum and maximum.
    fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//============ Tests =========================================================
