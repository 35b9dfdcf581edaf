//! The name server address stream.
//!
//! A resolver holds one shared [`ServerList`] of endpoints in configuration
//! order. Each resolution attempt obtains its own [`ServerCursor`] from the
//! list and advances it as its retry mechanism; cursors are independent, so
//! concurrent attempts never contend on a shared position. With rotation
//! enabled, the list's starting point moves forward for every cursor handed
//! out, spreading load across all configured servers.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

//------------ ServerList ----------------------------------------------------

/// The shared, ordered list of name server endpoints.
#[derive(Clone, Debug)]
pub struct ServerList {
    /// The actual servers.
    servers: Arc<[SocketAddr]>,

    /// Where the next cursor starts.
    ///
    /// In rotate mode this keeps growing and is used modulo the list
    /// length. It will eventually wrap around the end of usize's range
    /// with a jump in rotation; since that happens only oh-so-often, we
    /// accept it in favour of simpler code.
    start: Arc<AtomicUsize>,
}

impl ServerList {
    /// Creates a list from the given endpoints in order.
    pub fn new(servers: &[SocketAddr]) -> Self {
        ServerList {
            servers: servers.into(),
            start: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns whether the list has no servers at all.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Returns the number of servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns a cursor over one round of the list.
    ///
    /// With `rotate`, the starting point of subsequent cursors moves one
    /// server forward.
    pub fn cursor(&self, rotate: bool) -> ServerCursor {
        let res = ServerCursor::new(self);
        if rotate {
            self.start.fetch_add(1, Ordering::SeqCst);
        }
        res
    }
}

//------------ ServerCursor --------------------------------------------------

/// A per-attempt cursor over the server list.
///
/// The cursor yields every server exactly once, beginning at the list's
/// current starting point. A fresh cursor is obtained for every round of
/// retries, so semantics do not depend on how many cursors exist at once.
#[derive(Clone, Debug)]
pub struct ServerCursor {
    /// The servers the cursor walks over.
    servers: Arc<[SocketAddr]>,

    /// The current position.
    cur: usize,

    /// The position at which the round is over.
    end: usize,
}

impl ServerCursor {
    /// Creates a cursor positioned at the list's starting point.
    fn new(list: &ServerList) -> Self {
        if list.servers.is_empty() {
            return ServerCursor {
                servers: list.servers.clone(),
                cur: 0,
                end: 0,
            };
        }
        // Modulo here keeps positions small towards the end of usize's
        // range.
        let start = list.start.load(Ordering::Relaxed) % list.servers.len();
        ServerCursor {
            servers: list.servers.clone(),
            cur: start,
            end: start + list.servers.len(),
        }
    }

    /// Returns the next server of the round, if one is left.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<SocketAddr> {
        if self.cur >= self.end {
            return None;
        }
        let res = self.servers[self.cur % self.servers.len()];
        self.cur += 1;
        Some(res)
    }
}

//============ Tests =========================================================
