//! The shared UDP channel and the query bookkeeping around it.
//!
//! All queries of a resolver travel over one datagram socket. A [`Channel`]
//! is the cheaply cloneable caller-side handle: its [`query`][Channel::query]
//! method registers the query under `(server, transaction id)`, hands the
//! encoded datagram to the I/O task, and waits for the matching response or
//! the timeout, whichever comes first. The [`Transport`] returned alongside
//! the channel is the run future of that I/O task; it owns the socket,
//! performs all sends, and dispatches every received datagram back to the
//! registered query.
//!
//! Responses are matched strictly by sender address and transaction ID, and
//! then checked against the question that was asked. Anything that does not
//! match — stale duplicates for completed transactions, spoofed datagrams,
//! responses to questions we never posed — is logged and dropped without
//! side effects.
//!
//! When the transport winds down, because every channel handle was dropped
//! or the socket failed, all outstanding queries fail with a channel error
//! and the resolver's cache is cleared, on the assumption that results
//! obtained over a dead channel are not safe to keep.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::cache::HostCache;
use crate::conf::ResolverConf;
use crate::error::QueryError;
use bytes::Bytes;
use domain::base::iana::{OptRcode, Rcode};
use domain::base::{Message, MessageBuilder, Name, Question, ToName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::ops;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// The most queries that may be in flight towards a single server.
///
/// Transaction IDs are drawn from a 16-bit space per server; refusing new
/// registrations at half of it keeps random allocation cheap.
const MAX_IN_FLIGHT: usize = 0x8000;

//------------ DgramEndpoint -------------------------------------------------

/// A datagram-capable endpoint the transport can run on.
///
/// The shipped implementation is [`UdpSocket`]; tests substitute scripted
/// endpoints. Both methods must be cancellation safe, since the transport
/// races them against each other in its run loop.
pub trait DgramEndpoint: fmt::Debug + Send + Sync {
    /// Sends a datagram to the given destination.
    fn send_to<'a>(
        &'a self,
        dgram: &'a [u8],
        dest: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = Result<usize, io::Error>> + Send + 'a>>;

    /// Receives a datagram, returning its length and sender.
    fn recv_from<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<(usize, SocketAddr), io::Error>>
                + Send
                + 'a,
        >,
    >;
}

impl DgramEndpoint for UdpSocket {
    fn send_to<'a>(
        &'a self,
        dgram: &'a [u8],
        dest: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = Result<usize, io::Error>> + Send + 'a>>
    {
        Box::pin(UdpSocket::send_to(self, dgram, dest))
    }

    fn recv_from<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<(usize, SocketAddr), io::Error>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(UdpSocket::recv_from(self, buf))
    }
}

//------------ Channel -------------------------------------------------------

/// The caller-side handle of the shared UDP channel.
#[derive(Clone, Debug)]
pub struct Channel {
    /// Hands outbound datagrams to the I/O task.
    sender: mpsc::UnboundedSender<OutDgram>,

    /// The in-flight query table shared with the I/O task.
    manager: Arc<QueryManager>,

    /// How long to wait for a response to a single query.
    query_timeout: Duration,

    /// Whether queries ask the server to recurse.
    recursion_desired: bool,

    /// The payload size advertised via EDNS, if advertised at all.
    udp_payload_size: Option<u16>,
}

impl Channel {
    /// Creates a channel and the transport that will serve it.
    ///
    /// The transport must be spawned by the caller; until its run future is
    /// polled, queries go nowhere. The given cache is cleared when the
    /// transport winds down.
    pub fn new(
        conf: &ResolverConf,
        endpoint: Box<dyn DgramEndpoint>,
        cache: Arc<dyn HostCache>,
    ) -> (Self, Transport) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let manager = Arc::new(QueryManager::default());
        let channel = Channel {
            sender,
            manager: manager.clone(),
            query_timeout: conf.query_timeout(),
            recursion_desired: conf.recursion_desired(),
            udp_payload_size: conf
                .use_edns()
                .then(|| conf.max_payload_size()),
        };
        let transport = Transport {
            endpoint,
            receiver,
            manager,
            cache,
            recv_size: usize::from(conf.max_payload_size()),
        };
        (channel, transport)
    }

    /// Runs one query against one server.
    ///
    /// The returned future is the whole lifecycle of the query: it
    /// registers the transaction, sends the datagram, and resolves exactly
    /// once with the matched response, a failure, or [`QueryError::Timeout`].
    /// Dropping the future is cancellation; it synchronously removes the
    /// registration, and a response arriving afterwards is dropped at
    /// dispatch like any other stale datagram.
    pub async fn query(
        &self,
        server: SocketAddr,
        question: Question<Name<Bytes>>,
    ) -> Result<Answer, QueryError> {
        let (id, receiver) =
            self.manager.register(server, question.clone())?;
        let _guard = RegGuard {
            manager: self.manager.clone(),
            server,
            id,
        };
        let dgram = self.encode(id, question);
        debug!("sending query {:04x} to {}", id, server);
        if self.sender.send(OutDgram { server, id, dgram }).is_err() {
            return Err(QueryError::ChannelClosed);
        }
        match timeout(self.query_timeout, receiver).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(QueryError::ChannelClosed),
            Err(_) => {
                debug!("query {:04x} to {} timed out", id, server);
                Err(QueryError::Timeout)
            }
        }
    }

    /// Encodes the question into a request datagram.
    fn encode(
        &self,
        id: u16,
        question: Question<Name<Bytes>>,
    ) -> Vec<u8> {
        let mut msg = MessageBuilder::new_vec();
        msg.header_mut().set_id(id);
        msg.header_mut().set_rd(self.recursion_desired);
        let mut msg = msg.question();
        msg.push(question).expect("vec target never runs short");
        let mut msg = msg.additional();
        if let Some(size) = self.udp_payload_size {
            msg.opt(|opt| {
                opt.set_udp_payload_size(size);
                Ok(())
            })
            .expect("vec target never runs short");
        }
        msg.finish()
    }

    /// Returns the number of queries in flight towards a server.
    #[cfg(test)]
    pub(crate) fn outstanding(&self, server: SocketAddr) -> usize {
        self.manager.outstanding(server)
    }
}

//------------ RegGuard ------------------------------------------------------

/// Removes a query registration when its future goes away.
///
/// After regular completion the registration is already gone and the
/// removal here is the manager's defined no-op; the guard matters for
/// timeouts and for callers dropping the query future early.
struct RegGuard {
    /// The manager holding the registration.
    manager: Arc<QueryManager>,

    /// The server part of the registration key.
    server: SocketAddr,

    /// The transaction ID part of the registration key.
    id: u16,
}

impl Drop for RegGuard {
    fn drop(&mut self) {
        self.manager.deregister(self.server, self.id);
    }
}

//------------ OutDgram ------------------------------------------------------

/// An outbound request datagram on its way to the I/O task.
#[derive(Debug)]
struct OutDgram {
    /// Where the datagram goes.
    server: SocketAddr,

    /// The transaction ID, for failing the query if the send fails.
    id: u16,

    /// The encoded request.
    dgram: Vec<u8>,
}

//------------ QueryManager --------------------------------------------------

/// The table of in-flight queries, keyed by server and transaction ID.
///
/// Whoever removes an entry first — response dispatch, timeout, or
/// cancellation — owns its completion; everyone else's removal attempt is
/// a no-op. The lock is only ever held for table operations, never across
/// await points.
#[derive(Debug, Default)]
pub(crate) struct QueryManager {
    /// Per-server tables of in-flight queries.
    tables: Mutex<HashMap<SocketAddr, HashMap<u16, Pending>>>,
}

/// An in-flight query waiting for its response.
#[derive(Debug)]
struct Pending {
    /// The question that was asked, for matching the response against.
    question: Question<Name<Bytes>>,

    /// Resolves the caller-side query future.
    sender: oneshot::Sender<Result<Answer, QueryError>>,
}

impl QueryManager {
    /// Registers a new query, allocating a transaction ID for it.
    ///
    /// The ID is drawn at random from the IDs not currently in flight
    /// towards this server. Registration is refused only when half the ID
    /// space for the server is taken.
    fn register(
        &self,
        server: SocketAddr,
        question: Question<Name<Bytes>>,
    ) -> Result<
        (u16, oneshot::Receiver<Result<Answer, QueryError>>),
        QueryError,
    > {
        let (sender, receiver) = oneshot::channel();
        let mut tables = self.tables.lock();
        let table = tables.entry(server).or_default();
        if table.len() >= MAX_IN_FLIGHT {
            return Err(QueryError::TooManyOutstanding);
        }
        let mut id = rand::random::<u16>();
        while table.contains_key(&id) {
            id = rand::random();
        }
        table.insert(id, Pending { question, sender });
        Ok((id, receiver))
    }

    /// Removes a registration if it still exists.
    ///
    /// Unknown keys are a defined no-op: the query completed or was failed
    /// through another path first.
    fn deregister(&self, server: SocketAddr, id: u16) {
        let mut tables = self.tables.lock();
        if let Some(table) = tables.get_mut(&server) {
            table.remove(&id);
            if table.is_empty() {
                tables.remove(&server);
            }
        }
    }

    /// Routes a received response to the query it answers.
    ///
    /// A response that matches no registration, or whose question section
    /// does not match the registered question despite a matching ID, is
    /// logged and dropped. In the latter case the registration stays put;
    /// the timer bounds the remaining wait.
    fn dispatch(&self, server: SocketAddr, msg: Message<Bytes>) {
        let id = msg.header().id();
        let mut tables = self.tables.lock();
        let Some(table) = tables.get_mut(&server) else {
            warn!("dropping response from unknown server {}", server);
            return;
        };
        let Some(pending) = table.get(&id) else {
            warn!(
                "dropping response {:04x} from {} matching no query",
                id, server
            );
            return;
        };
        if !is_response_to(&msg, &pending.question) {
            warn!(
                "dropping response {:04x} from {} with foreign question",
                id, server
            );
            return;
        }
        let Some(pending) = table.remove(&id) else {
            return;
        };
        if table.is_empty() {
            tables.remove(&server);
        }
        drop(tables);
        trace!("response {:04x} from {} matched", id, server);
        let _ = pending.sender.send(Ok(Answer::from(msg)));
    }

    /// Fails a single registered query.
    fn fail(&self, server: SocketAddr, id: u16, err: QueryError) {
        let removed = {
            let mut tables = self.tables.lock();
            let Some(table) = tables.get_mut(&server) else { return };
            let removed = table.remove(&id);
            if table.is_empty() {
                tables.remove(&server);
            }
            removed
        };
        if let Some(pending) = removed {
            let _ = pending.sender.send(Err(err));
        }
    }

    /// Fails every registered query with the given error.
    fn drain(&self, err: QueryError) {
        let tables = mem::take(&mut *self.tables.lock());
        for table in tables.into_values() {
            for pending in table.into_values() {
                let _ = pending.sender.send(Err(err.clone()));
            }
        }
    }

    /// Returns the number of queries in flight towards a server.
    #[cfg(test)]
    fn outstanding(&self, server: SocketAddr) -> usize {
        self.tables
            .lock()
            .get(&server)
            .map_or(0, |table| table.len())
    }
}

/// Checks that a response answers the given question.
///
/// Errors and truncated replies are accepted without a question section as
/// long as all other sections are empty as well; everything else must echo
/// the question it answers.
fn is_response_to(
    msg: &Message<Bytes>,
    question: &Question<Name<Bytes>>,
) -> bool {
    let counts = msg.header_counts();
    if counts.qdcount() == 0 {
        return (msg.header().tc()
            || msg.header().rcode() != Rcode::NOERROR)
            && counts.ancount() == 0
            && counts.nscount() == 0
            && counts.arcount() == 0;
    }
    match msg.first_question() {
        Some(q) => {
            q.qtype() == question.qtype()
                && q.qclass() == question.qclass()
                && q.qname().name_eq(question.qname())
        }
        None => false,
    }
}

//------------ Transport -----------------------------------------------------

/// The run future of the shared UDP channel.
///
/// All sends and the receive-dispatch loop run serially inside this one
/// future; callers hand their datagrams over through the channel handle.
#[derive(Debug)]
pub struct Transport {
    /// The socket, or a test substitute.
    endpoint: Box<dyn DgramEndpoint>,

    /// Outbound datagrams from the channel handles.
    receiver: mpsc::UnboundedReceiver<OutDgram>,

    /// The in-flight query table shared with the channel handles.
    manager: Arc<QueryManager>,

    /// The cache to clear when the channel closes.
    cache: Arc<dyn HostCache>,

    /// The size of the receive buffer.
    recv_size: usize,
}

impl Transport {
    /// Runs the transport until every channel handle is gone or the
    /// endpoint fails.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; self.recv_size];
        loop {
            tokio::select! {
                biased;
                req = self.receiver.recv() => {
                    match req {
                        Some(out) => {
                            if let Err(err) = self
                                .endpoint
                                .send_to(&out.dgram, out.server)
                                .await
                            {
                                self.manager.fail(
                                    out.server,
                                    out.id,
                                    QueryError::channel(err),
                                );
                            }
                        }
                        None => break,
                    }
                }
                res = self.endpoint.recv_from(&mut buf) => {
                    match res {
                        Ok((len, sender)) => {
                            self.dispatch(&buf[..len], sender)
                        }
                        Err(err) => {
                            debug!("udp channel failed: {}", err);
                            self.manager.drain(QueryError::channel(err));
                            self.cache.clear().await;
                            return;
                        }
                    }
                }
            }
        }
        debug!("udp channel closing");
        self.manager.drain(QueryError::ChannelClosed);
        self.cache.clear().await;
    }

    /// Decodes a received datagram and hands it to the query table.
    fn dispatch(&self, dgram: &[u8], sender: SocketAddr) {
        trace!("received {} octets from {}", dgram.len(), sender);
        let msg =
            match Message::from_octets(Bytes::copy_from_slice(dgram)) {
                Ok(msg) => msg,
                Err(_) => {
                    warn!(
                        "dropping undecodable datagram from {}",
                        sender
                    );
                    return;
                }
            };
        if !msg.header().qr() {
            warn!("dropping non-response datagram from {}", sender);
            return;
        }
        self.manager.dispatch(sender, msg);
    }
}

//------------ Answer --------------------------------------------------------

/// A matched response to a query.
///
/// This wraps the decoded DNS message and adds the few judgements the
/// resolver needs to make about it.
#[derive(Clone)]
pub struct Answer {
    /// The response message.
    message: Message<Bytes>,
}

impl Answer {
    /// Returns the extended response code.
    pub fn rcode(&self) -> OptRcode {
        self.message.opt_rcode()
    }

    /// Returns whether the response was truncated.
    pub fn is_truncated(&self) -> bool {
        self.message.header().tc()
    }

    /// Converts the answer into the response message.
    pub fn into_message(self) -> Message<Bytes> {
        self.message
    }
}

impl From<Message<Bytes>> for Answer {
    fn from(message: Message<Bytes>) -> Self {
        Answer { message }
    }
}

impl ops::Deref for Answer {
    type Target = Message<Bytes>;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl AsRef<Message<Bytes>> for Answer {
    fn as_ref(&self) -> &Message<Bytes> {
        &self.message
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Answer")
            .field("id", &self.message.header().id())
            .field("rcode", &self.rcode())
            .finish_non_exhaustive()
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::NoCache;
    use domain::base::iana::Class;
    use domain::base::{Name, Rtype, Ttl};
    use domain::rdata::A;
    use std::net::IpAddr;
    use tokio::sync::Mutex as AsyncMutex;
    use tokio::task::yield_now;

    /// An endpoint that scripts responses and counts sends.
    #[derive(Debug)]
    struct Script {
        /// Outbound datagrams captured from the transport.
        sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,

        /// Datagrams the test injects as received.
        inject: AsyncMutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    }

    fn script() -> (
        Arc<Script>,
        mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Script {
                sent: Mutex::new(Vec::new()),
                inject: AsyncMutex::new(rx),
            }),
            tx,
        )
    }

    impl DgramEndpoint for Arc<Script> {
        fn send_to<'a>(
            &'a self,
            dgram: &'a [u8],
            dest: SocketAddr,
        ) -> Pin<
            Box<dyn Future<Output = Result<usize, io::Error>> + Send + 'a>,
        > {
            Box::pin(async move {
                self.sent.lock().push((dest, dgram.to_vec()));
                Ok(dgram.len())
            })
        }

        fn recv_from<'a>(
            &'a self,
            buf: &'a mut [u8],
        ) -> Pin<
            Box<
                dyn Future<
                        Output = Result<(usize, SocketAddr), io::Error>,
                    > + Send
                    + 'a,
            >,
        > {
            Box::pin(async move {
                match self.inject.lock().await.recv().await {
                    Some((dgram, sender)) => {
                        buf[..dgram.len()].copy_from_slice(&dgram);
                        Ok((dgram.len(), sender))
                    }
                    None => Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "script over",
                    )),
                }
            })
        }
    }

    fn server() -> SocketAddr {
        "192.0.2.53:53".parse().unwrap()
    }

    fn question(name: &str) -> Question<Name<Bytes>> {
        Question::new_in(Name::bytes_from_str(name).unwrap(), Rtype::A)
    }

    /// Builds a NOERROR response to the given request datagram.
    fn answer_to(request: &[u8], addr: IpAddr) -> Vec<u8> {
        let request = Message::from_octets(request.to_vec()).unwrap();
        let mut msg = MessageBuilder::new_vec()
            .start_answer(&request, Rcode::NOERROR)
            .unwrap();
        let question = request.first_question().unwrap();
        let IpAddr::V4(addr) = addr else {
            panic!("test builds A answers only")
        };
        msg.push((
            question.qname(),
            Class::IN,
            Ttl::from_secs(60),
            A::new(addr),
        ))
        .unwrap();
        msg.finish()
    }

    fn channel(conf: &ResolverConf, endpoint: Arc<Script>) -> Channel {
        let (channel, transport) =
            Channel::new(conf, Box::new(endpoint), Arc::new(NoCache));
        tokio::spawn(transport.run());
        channel
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn response_completes_query() {
        let (endpoint, inject) = script();
        let conf = ResolverConf::new();
        let channel = channel(&conf, endpoint.clone());

        let mut query =
            Box::pin(channel.query(server(), question("one.example")));

        // Drive the query until the send shows up at the endpoint.
        let sent = loop {
            tokio::select! {
                biased;
                _ = &mut query => panic!("completed without response"),
                _ = yield_now() => {}
            }
            if let Some(sent) = endpoint.sent.lock().last().cloned() {
                break sent;
            }
        };
        assert_eq!(sent.0, server());

        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        inject.send((answer_to(&sent.1, addr), server())).unwrap();
        let answer = query.await.unwrap();
        assert_eq!(answer.rcode(), OptRcode::NOERROR);
        assert_eq!(answer.header_counts().ancount(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_and_deregisters() {
        let (endpoint, _inject) = script();
        let mut conf = ResolverConf::new();
        conf.set_query_timeout(Duration::from_millis(100));
        let channel = channel(&conf, endpoint);
        let manager = channel.manager.clone();

        let res = channel.query(server(), question("slow.example")).await;
        assert!(matches!(res, Err(QueryError::Timeout)));
        assert_eq!(manager.outstanding(server()), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_the_query_deregisters_synchronously() {
        let (endpoint, _inject) = script();
        let conf = ResolverConf::new();
        let channel = channel(&conf, endpoint);
        let manager = channel.manager.clone();

        let mut query =
            Box::pin(channel.query(server(), question("gone.example")));
        // Poll once so the query registers and sends.
        tokio::select! {
            biased;
            _ = &mut query => panic!("completed"),
            _ = yield_now() => {}
        }
        assert_eq!(manager.outstanding(server()), 1);
        drop(query);
        assert_eq!(manager.outstanding(server()), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn late_duplicate_is_dropped() {
        let (endpoint, inject) = script();
        let conf = ResolverConf::new();
        let channel = channel(&conf, endpoint.clone());
        let manager = channel.manager.clone();

        let mut query =
            Box::pin(channel.query(server(), question("dup.example")));
        let sent = loop {
            tokio::select! {
                biased;
                _ = &mut query => panic!("completed without response"),
                _ = yield_now() => {}
            }
            if let Some(sent) = endpoint.sent.lock().last().cloned() {
                break sent;
            }
        };

        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        let dgram = answer_to(&sent.1, addr);
        inject.send((dgram.clone(), server())).unwrap();
        assert!(query.await.is_ok());
        assert_eq!(manager.outstanding(server()), 0);

        // The same datagram again matches nothing and must change nothing.
        inject.send((dgram, server())).unwrap();
        yield_now().await;
        assert_eq!(manager.outstanding(server()), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mismatched_question_keeps_registration() {
        let (endpoint, inject) = script();
        let conf = ResolverConf::new();
        let channel = channel(&conf, endpoint.clone());
        let manager = channel.manager.clone();

        let mut query =
            Box::pin(channel.query(server(), question("real.example")));
        let sent = loop {
            tokio::select! {
                biased;
                _ = &mut query => panic!("completed without response"),
                _ = yield_now() => {}
            }
            if let Some(sent) = endpoint.sent.lock().last().cloned() {
                break sent;
            }
        };

        // Forge a response with the right ID but a different question.
        let request = Message::from_octets(sent.1.clone()).unwrap();
        let mut forged = MessageBuilder::new_vec();
        forged.header_mut().set_id(request.header().id());
        forged.header_mut().set_qr(true);
        let mut forged = forged.question();
        forged.push(question("forged.example")).unwrap();
        inject.send((forged.finish(), server())).unwrap();

        yield_now().await;
        assert_eq!(manager.outstanding(server()), 1);

        // The real response still completes the query.
        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        inject.send((answer_to(&sent.1, addr), server())).unwrap();
        assert!(query.await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn endpoint_error_drains_queries() {
        let (endpoint, inject) = script();
        let conf = ResolverConf::new();
        let channel = channel(&conf, endpoint);

        let mut query =
            Box::pin(channel.query(server(), question("doomed.example")));
        tokio::select! {
            biased;
            _ = &mut query => panic!("completed"),
            _ = yield_now() => {}
        }
        // Closing the inject side makes the next recv fail.
        drop(inject);
        let res = query.await;
        assert!(matches!(res, Err(QueryError::Channel(_))));
    }

    #[test]
    fn ids_are_unique_per_server() {
        let manager = QueryManager::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..512 {
            let (id, _rx) =
                manager.register(server(), question("many.example")).unwrap();
            assert!(seen.insert(id));
        }
        assert_eq!(manager.outstanding(server()), 512);
    }
}
