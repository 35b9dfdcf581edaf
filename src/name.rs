//! Host names as the resolution engine sees them.
//!
//! The engine keys its cache, hosts table, and search-domain machinery on
//! plain ASCII host names rather than on wire-format domain names. The
//! [`HostName`] type holds such a name in normalized form: IDN labels are
//! encoded to their ASCII form, everything is folded to lower case, and a
//! trailing dot — the one piece of user intent that distinguishes a fully
//! qualified name from one open to search-domain expansion — is preserved
//! exactly as given.
//!
//! Conversion into the wire-format [`Name`] of the codec happens only at the
//! point a question is built.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::error::InvalidName;
use bytes::Bytes;
use domain::base::Name;
use std::fmt;
use std::sync::Arc;

/// The longest acceptable name, sans trailing dot.
const MAX_NAME_LEN: usize = 253;

/// The longest acceptable single label.
const MAX_LABEL_LEN: usize = 63;

//------------ HostName ------------------------------------------------------

/// An ASCII-normalized host name.
///
/// Values are immutable and cheap to clone. Two host names compare equal
/// exactly when their normalized forms are byte-identical, which makes the
/// type directly usable as a cache key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct HostName {
    /// The normalized name, trailing dot preserved if the input had one.
    name: Arc<str>,
}

impl HostName {
    /// Creates a host name from user input.
    ///
    /// The input is IDN-encoded to ASCII and folded to lower case. A
    /// trailing dot survives normalization; it marks the name as fully
    /// qualified and exempts it from search-domain expansion.
    pub fn from_user(input: &str) -> Result<Self, InvalidName> {
        let trailing_dot = input.ends_with('.');
        let mut name = idna::domain_to_ascii(input)
            .map_err(|_| InvalidName::new(input))?;
        if name.is_empty() || name == "." {
            return Err(InvalidName::new(input));
        }
        if trailing_dot && !name.ends_with('.') {
            name.push('.');
        }
        let relative = name.strip_suffix('.').unwrap_or(&name);
        if relative.len() > MAX_NAME_LEN {
            return Err(InvalidName::new(input));
        }
        for label in relative.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(InvalidName::new(input));
            }
        }
        Ok(Self { name: name.into() })
    }

    /// Returns the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns whether the name carries a trailing dot.
    pub fn is_fully_qualified(&self) -> bool {
        self.name.ends_with('.')
    }

    /// Returns the number of dots in the name.
    ///
    /// A trailing dot does not count; this is the dot count the `ndots`
    /// threshold is compared against.
    pub fn dots(&self) -> usize {
        let relative = self.name.strip_suffix('.').unwrap_or(&self.name);
        relative.chars().filter(|&ch| ch == '.').count()
    }

    /// Appends a search suffix, producing the expanded candidate name.
    pub(crate) fn join(&self, suffix: &HostName) -> HostName {
        let head = self.name.strip_suffix('.').unwrap_or(&self.name);
        HostName {
            name: format!("{}.{}", head, suffix.name).into(),
        }
    }

    /// Converts the name into the codec's wire-format name.
    pub(crate) fn to_wire(&self) -> Result<Name<Bytes>, InvalidName> {
        Name::bytes_from_str(&self.name)
            .map_err(|_| InvalidName::new(self.as_str()))
    }
}

//--- Display

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

//--- AsRef

impl AsRef<str> for HostName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

//------------ Candidate expansion -------------------------------------------

/// Produces the names to query for a host, in order.
///
/// A fully qualified name is queried as given and nothing else. Otherwise
/// the dot count decides the order: a name with fewer dots than `ndots` is
/// likely a bare local name, so the search suffixes come first and the name
/// itself last; a name at or above the threshold is tried as given before
/// any suffix is appended.
pub(crate) fn candidates(
    host: &HostName,
    search: &[HostName],
    ndots: usize,
) -> Vec<HostName> {
    if host.is_fully_qualified() || search.is_empty() {
        return vec![host.clone()];
    }
    let bare_first = host.dots() >= ndots;
    let mut out = Vec::with_capacity(search.len() + 1);
    if bare_first {
        out.push(host.clone());
    }
    for suffix in search {
        out.push(host.join(suffix));
    }
    if !bare_first {
        out.push(host.clone());
    }
    out
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn host(s: &str) -> HostName {
        HostName::from_user(s).unwrap()
    }

    #[test]
    fn normalizes_case_and_idn() {
        assert_eq!(host("EXAMPLE.Com").as_str(), "example.com");
        assert_eq!(
            host("bücher.example").as_str(),
            "xn--bcher-kva.example"
        );
    }

    #[test]
    fn trailing_dot_is_preserved() {
        let name = host("example.com.");
        assert!(name.is_fully_qualified());
        assert_eq!(name.as_str(), "example.com.");
        assert!(!host("example.com").is_fully_qualified());
    }

    #[test]
    fn dots_ignore_the_trailing_one() {
        assert_eq!(host("host").dots(), 0);
        assert_eq!(host("a.b.c").dots(), 2);
        assert_eq!(host("a.b.c.").dots(), 2);
    }

    #[test]
    fn rejects_nonsense() {
        assert!(HostName::from_user("").is_err());
        assert!(HostName::from_user(".").is_err());
        assert!(HostName::from_user("a..b").is_err());
        let long_label = "a".repeat(64);
        assert!(HostName::from_user(&long_label).is_err());
        let long_name =
            (0..64).map(|_| "abc").collect::<Vec<_>>().join(".");
        assert!(HostName::from_user(&long_name).is_err());
    }

    #[test]
    fn join_handles_suffix_forms() {
        assert_eq!(
            host("web").join(&host("corp.example")).as_str(),
            "web.corp.example"
        );
        assert_eq!(
            host("web").join(&host("corp.example.")).as_str(),
            "web.corp.example."
        );
    }

    #[test]
    fn candidates_suffix_first_below_ndots() {
        let search = [host("corp.example"), host("example")];
        let list = candidates(&host("web"), &search, 1);
        let strs: Vec<_> =
            list.iter().map(|name| name.as_str().to_owned()).collect();
        assert_eq!(strs, ["web.corp.example", "web.example", "web"]);
    }

    #[test]
    fn candidates_bare_first_at_ndots() {
        let search = [host("corp.example")];
        let list = candidates(&host("db.internal"), &search, 1);
        let strs: Vec<_> =
            list.iter().map(|name| name.as_str().to_owned()).collect();
        assert_eq!(strs, ["db.internal", "db.internal.corp.example"]);
    }

    #[test]
    fn candidates_fqdn_is_alone() {
        let search = [host("corp.example")];
        let list = candidates(&host("web.example."), &search, 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].as_str(), "web.example.");
    }

    #[test]
    fn wire_conversion_accepts_both_forms() {
        assert!(host("example.com").to_wire().is_ok());
        assert!(host("example.com.").to_wire().is_ok());
    }
}
