//! The hosts-file override table.
//!
//! Before any server is asked, a resolution consults a static table mapping
//! host names to addresses, in the manner of `/etc/hosts`. The table is
//! never discovered from the system by the engine itself; whoever builds
//! the resolver parses a file or reader of their choosing into a [`Hosts`]
//! value and hands it over.
//!
//! The [`HostsResolver`] trait keeps the table pluggable, with [`NoHosts`]
//! as the empty substitute.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::name::HostName;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

//------------ HostsResolver -------------------------------------------------

/// A static host-name-to-address table consulted before the network.
pub trait HostsResolver: Debug + Send + Sync {
    /// Returns the addresses listed for a host, in listing order.
    ///
    /// `None` means the table has no opinion and resolution moves on to
    /// the cache and the network.
    fn lookup(&self, host: &HostName) -> Option<Vec<IpAddr>>;
}

//------------ Hosts ---------------------------------------------------------

/// A host table in the format of the `/etc/hosts` file.
///
/// A name may be listed on several lines and with addresses of both
/// families; lookups return every address in the order the lines gave
/// them.
#[derive(Clone, Debug, Default)]
pub struct Hosts {
    /// Maps a host name to its listed addresses.
    ///
    /// Keys are stored without a trailing dot so that a fully qualified
    /// lookup still finds the row.
    forward: HashMap<Box<str>, Vec<IpAddr>>,
}

impl Hosts {
    /// Creates a new, empty host table.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a table from the hosts listed in a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, io::Error> {
        let mut res = Self::new();
        res.parse(&mut fs::File::open(path)?)?;
        Ok(res)
    }

    /// Adds an address for a host.
    pub fn add(&mut self, host: &HostName, addr: IpAddr) {
        self.forward
            .entry(Self::key(host).into())
            .or_default()
            .push(addr)
    }

    /// Reads hosts from a reader and adds them.
    ///
    /// The format is that of the `/etc/hosts` file. Lines that do not
    /// parse are skipped rather than failing the whole table.
    pub fn parse<R: io::Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<(), io::Error> {
        use std::io::BufRead;

        for line in io::BufReader::new(reader).lines() {
            self.parse_line(&line?);
        }
        Ok(())
    }

    /// Parses a single line, quietly dropping anything malformed.
    fn parse_line(&mut self, line: &str) {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let mut words = line.split_whitespace();
        let Some(addr) = words.next() else { return };
        let Ok(addr) = IpAddr::from_str(addr) else { return };
        for word in words {
            if let Ok(host) = HostName::from_user(word) {
                self.add(&host, addr);
            }
        }
    }

    /// Returns the lookup key for a host name.
    fn key(host: &HostName) -> &str {
        host.as_str().strip_suffix('.').unwrap_or(host.as_str())
    }
}

impl HostsResolver for Hosts {
    fn lookup(&self, host: &HostName) -> Option<Vec<IpAddr>> {
        self.forward.get(Self::key(host)).cloned()
    }
}

//------------ NoHosts -------------------------------------------------------

/// A host table without any entries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHosts;

impl HostsResolver for NoHosts {
    fn lookup(&self, _host: &HostName) -> Option<Vec<IpAddr>> {
        None
    }
}

//============ Tests =========================================================
