//! Errors produced by the resolution engine.
//!
//! Two layers of errors exist. [`QueryError`] describes the fate of a single
//! query against a single server: it timed out, the server answered with an
//! error code, the answer could not be used, or the transport fell over.
//! [`ResolveError`] describes the outcome of a whole resolution, which may
//! have run many queries; when every avenue fails, the last per-query error
//! survives as the cause inside [`UnknownHost`].
//!
//! All error types here are cheap to clone. Shared ownership matters because
//! a failed resolution is stored in the cache as a negative entry and may be
//! handed to several concurrent callers at once, so I/O causes live behind
//! an [`Arc`].

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use domain::base::iana::OptRcode;
use std::error;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

//------------ QueryError ----------------------------------------------------

/// Failure of one query against one name server.
#[derive(Clone, Debug)]
pub enum QueryError {
    /// No response arrived within the configured query timeout.
    Timeout,

    /// The response carried a server-side error code.
    ServerFailure(OptRcode),

    /// The response could not be interpreted.
    ///
    /// The message itself parsed (otherwise it would never have been matched
    /// to the query), but its answer section did not.
    Malformed,

    /// No server was available to send the query to.
    NoServers,

    /// Sending or receiving on the shared channel failed.
    Channel(Arc<std::io::Error>),

    /// The transport ran down before the query completed.
    ChannelClosed,

    /// No transaction ID could be allocated for the target server.
    ///
    /// Half the 16-bit ID space for a single server is already in flight,
    /// which in practice means the caller is not harvesting results.
    TooManyOutstanding,
}

impl QueryError {
    /// Creates a channel error from an I/O error.
    pub(crate) fn channel(err: std::io::Error) -> Self {
        QueryError::Channel(Arc::new(err))
    }
}

//--- From

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::channel(err)
    }
}

//--- Display and Error

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Timeout => write!(f, "request timed out"),
            QueryError::ServerFailure(rcode) => {
                write!(f, "server failure: {rcode}")
            }
            QueryError::Malformed => write!(f, "malformed response"),
            QueryError::NoServers => write!(f, "no servers available"),
            QueryError::Channel(_) => write!(f, "channel error"),
            QueryError::ChannelClosed => write!(f, "channel closed"),
            QueryError::TooManyOutstanding => {
                write!(f, "too many outstanding queries")
            }
        }
    }
}

impl error::Error for QueryError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            QueryError::Channel(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

//------------ ResolveError --------------------------------------------------

/// Failure of a whole hostname resolution.
#[derive(Clone, Debug)]
pub enum ResolveError {
    /// The input could not be turned into a queryable host name.
    InvalidName(InvalidName),

    /// The resolver has no servers configured.
    NoServers,

    /// The resolution hit its query ceiling before completing.
    ///
    /// Carries the configured maximum number of queries per resolution.
    TooManyQueries(usize),

    /// No address was found after exhausting every avenue.
    UnknownHost(Arc<UnknownHost>),
}

impl ResolveError {
    /// Returns whether this is an unknown-host outcome.
    pub fn is_unknown_host(&self) -> bool {
        matches!(self, ResolveError::UnknownHost(_))
    }
}

//--- From

impl From<InvalidName> for ResolveError {
    fn from(err: InvalidName) -> Self {
        ResolveError::InvalidName(err)
    }
}

//--- Display and Error

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidName(err) => err.fmt(f),
            ResolveError::NoServers => write!(f, "no servers available"),
            ResolveError::TooManyQueries(limit) => {
                write!(f, "query limit of {limit} per resolution exceeded")
            }
            ResolveError::UnknownHost(err) => err.fmt(f),
        }
    }
}

impl error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ResolveError::UnknownHost(err) => {
                // Through the inherent method; `Error::cause` on the `Arc`
                // itself returns a too-short borrow.
                err.as_ref().cause().map(|cause| cause as _)
            }
            _ => None,
        }
    }
}

//------------ UnknownHost ---------------------------------------------------

/// Details of a resolution that produced no address.
///
/// The last per-query error, if any query ran at all, survives as the cause.
/// When the resolver runs with tracing of attempts enabled, every failed
/// attempt is kept as well.
#[derive(Clone, Debug)]
pub struct UnknownHost {
    /// The hostname that failed to resolve.
    hostname: Box<str>,

    /// The last underlying per-query error.
    ///
    /// `None` if the resolution failed without any query completing, e.g.
    /// because the answer held no record of an acceptable family.
    cause: Option<QueryError>,

    /// Every failed attempt, in order, if attempt tracing was enabled.
    attempts: Vec<Attempt>,
}

impl UnknownHost {
    /// Creates a new unknown-host error.
    pub(crate) fn new(
        hostname: impl Into<Box<str>>,
        cause: Option<QueryError>,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            cause,
            attempts,
        }
    }

    /// Returns the hostname that failed to resolve.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the last underlying per-query error.
    pub fn cause(&self) -> Option<&QueryError> {
        self.cause.as_ref()
    }

    /// Returns the recorded attempts.
    ///
    /// Empty unless the resolver traces attempts.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }
}

impl From<UnknownHost> for ResolveError {
    fn from(err: UnknownHost) -> Self {
        ResolveError::UnknownHost(Arc::new(err))
    }
}

impl fmt::Display for UnknownHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to resolve '{}'", self.hostname)?;
        match self.cause {
            Some(ref cause) => write!(f, ": {cause}")?,
            None => write!(f, ": no usable address records")?,
        }
        if !self.attempts.is_empty() {
            write!(f, " after {} attempts [", self.attempts.len())?;
            for (i, attempt) in self.attempts.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                attempt.fmt(f)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl error::Error for UnknownHost {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.cause().map(|cause| cause as _)
    }
}

//------------ Attempt -------------------------------------------------------

/// One failed query attempt recorded for attempt tracing.
#[derive(Clone, Debug)]
pub struct Attempt {
    /// The name actually queried, possibly a search-domain expansion.
    qname: Box<str>,

    /// The server the query went to.
    server: SocketAddr,

    /// Why the attempt failed.
    cause: QueryError,
}

impl Attempt {
    /// Creates a new attempt record.
    pub(crate) fn new(
        qname: impl Into<Box<str>>,
        server: SocketAddr,
        cause: QueryError,
    ) -> Self {
        Self {
            qname: qname.into(),
            server,
            cause,
        }
    }

    /// Returns the name actually queried.
    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Returns the server the query went to.
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Returns why the attempt failed.
    pub fn cause(&self) -> &QueryError {
        &self.cause
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' @ {}: {}", self.qname, self.server, self.cause)
    }
}

//------------ InvalidName ---------------------------------------------------

/// A string that cannot serve as a host name.
#[derive(Clone, Debug)]
pub struct InvalidName {
    /// The offending input.
    input: Box<str>,
}

impl InvalidName {
    /// Creates a new invalid-name error for the given input.
    pub(crate) fn new(input: impl Into<Box<str>>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the offending input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for InvalidName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid host name '{}'", self.input)
    }
}

impl error::Error for InvalidName {}

//============ Tests =========================================================
