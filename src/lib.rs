//! An asynchronous stub resolver for host-name resolution.
//!
//! This crate turns host names into IP addresses by asking recursive name
//! servers over UDP, the way a stub resolver does. It does not recurse
//! itself and it does not read system configuration; everything a resolver
//! needs is handed to it in a [`ResolverConf`].
//!
//! A resolution walks a fixed ladder. A literal IP address is returned
//! without any I/O. A hosts-file style override table is consulted next,
//! then a TTL-bounded cache that remembers failures as well as addresses.
//! Only on a miss does the engine query servers: the name is expanded
//! across the configured search domains, each candidate name is tried
//! against each server in turn with one query per preferred address
//! family, and the whole resolution is bounded by a hard query ceiling.
//! All queries of all resolutions share a single UDP socket and are told
//! apart by transaction ID.
//!
//! # Example
//!
//! ```no_run
//! use aresolv::{Resolver, ResolverConf};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conf = ResolverConf::new();
//! conf.add_server("192.0.2.53:53".parse()?);
//! let (resolver, transport) = Resolver::new(conf).await?;
//! tokio::spawn(transport.run());
//!
//! let addr = resolver.resolve("www.example.com").await?;
//! println!("{addr}");
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! * [`conf`] holds the configuration types,
//! * [`resolver`] the resolution engine itself,
//! * [`transport`] the shared UDP channel underneath it,
//! * [`cache`] and [`hosts`] the pluggable cache and override table,
//! * [`name`] the normalized host-name type,
//! * [`servers`] the rotating server list, and
//! * [`error`] everything that can go wrong.
//!
//! The items an application typically needs are re-exported at the crate
//! root.

#![warn(missing_docs)]

pub mod cache;
pub mod conf;
pub mod error;
pub mod hosts;
pub mod name;
pub mod resolver;
pub mod servers;
pub mod transport;

pub use self::cache::{CacheEntry, HostCache, InMemoryCache, NoCache};
pub use self::conf::{AddressFamily, ResolverConf};
pub use self::error::{
    Attempt, InvalidName, QueryError, ResolveError, UnknownHost,
};
pub use self::hosts::{Hosts, HostsResolver, NoHosts};
pub use self::name::HostName;
pub use self::resolver::{ResolvedAddrs, Resolver};
pub use self::servers::{ServerCursor, ServerList};
pub use self::transport::{Answer, Channel, DgramEndpoint, Transport};
