use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gtpv2_config::EngineConfig;
use gtpv2_core::{GtpError, Ie, Message, PacketConn, Result, GTP_VERSION_2, MAX_SEQUENCE};
use gtpv2_dict::{describe_message, MessageType};
use gtpv2_metrics::{
    CORRELATION_TIMEOUTS_TOTAL, DECODE_ERRORS_TOTAL, DISPATCH_LATENCY_SECONDS,
    HANDLER_ERRORS_TOTAL, MESSAGES_RECEIVED_TOTAL, MESSAGES_SENT_TOTAL,
    VALIDATION_FAILURES_TOTAL,
};
use gtpv2_session::{Bearer, Session, Subscriber};
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::allocator::{allocate, FTeidLease};
use crate::handler::{default_handlers, HandlerFn, HandlerTable};
use crate::hook::{DispatchFailure, ErrorHook};
use crate::registry::SessionRegistry;

const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_TEID_ATTEMPTS: usize = 16;
const DEFAULT_RECV_BUFFER: usize = 1500;

/// Consecutive receive errors after which the loop gives up
pub const MAX_RECV_ERRORS: u32 = 8;
const RECV_BACKOFF_BASE: Duration = Duration::from_millis(5);
const RECV_BACKOFF_MAX: Duration = Duration::from_millis(200);

/// Pause after the `failures`-th consecutive receive error, doubling each time
fn recv_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    RECV_BACKOFF_BASE.saturating_mul(factor).min(RECV_BACKOFF_MAX)
}

/// One GTPv2-C endpoint: a packet socket, its handler table and the
/// Sessions created over it.
///
/// Handlers receive the Connection as `Arc<Connection>`, so it is normally
/// built, configured and then wrapped in an `Arc` before serving.
pub struct Connection {
    local_addr: SocketAddr,
    restart_counter: AtomicU8,
    conn: RwLock<Option<Arc<dyn PacketConn>>>,
    handlers: HandlerTable,
    registry: Arc<SessionRegistry>,
    sequence: AtomicU32,
    validation: AtomicBool,
    error_hook: RwLock<Option<ErrorHook>>,
    closed: CancellationToken,
    echo_timeout: Duration,
    teid_allocation_attempts: usize,
    recv_buffer_size: usize,
}

impl Connection {
    /// Create a Connection with the default handler set; no socket is bound yet
    pub fn new(local_addr: SocketAddr, restart_counter: u8, indexed_interface_types: Vec<u8>) -> Self {
        Self::with_handlers(
            local_addr,
            restart_counter,
            indexed_interface_types,
            default_handlers(),
        )
    }

    /// Create a Connection seeded with an explicit default handler set
    pub fn with_handlers(
        local_addr: SocketAddr,
        restart_counter: u8,
        indexed_interface_types: Vec<u8>,
        defaults: HashMap<u8, HandlerFn>,
    ) -> Self {
        Self {
            local_addr,
            restart_counter: AtomicU8::new(restart_counter),
            conn: RwLock::new(None),
            handlers: HandlerTable::new(defaults),
            registry: Arc::new(SessionRegistry::new(indexed_interface_types)),
            sequence: AtomicU32::new(0),
            validation: AtomicBool::new(true),
            error_hook: RwLock::new(None),
            closed: CancellationToken::new(),
            echo_timeout: DEFAULT_ECHO_TIMEOUT,
            teid_allocation_attempts: DEFAULT_TEID_ATTEMPTS,
            recv_buffer_size: DEFAULT_RECV_BUFFER,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut conn = Self::new(
            config.local_addr,
            config.restart_counter,
            config.indexed_interface_types.clone(),
        );
        conn.validation = AtomicBool::new(config.validation);
        conn.echo_timeout = config.echo_timeout();
        conn.teid_allocation_attempts = config.teid_allocation_attempts;
        conn.recv_buffer_size = config.recv_buffer_size;
        conn
    }

    pub fn with_echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    // ========================================
    // Socket lifecycle
    // ========================================

    /// Bind a UDP socket on the configured local address and return the bound address
    pub async fn bind(&self) -> Result<SocketAddr> {
        let socket = UdpSocket::bind(self.local_addr).await?;
        let addr = socket.local_addr()?;
        self.attach(Arc::new(socket));
        info!(%addr, "GTPv2-C connection bound");
        Ok(addr)
    }

    /// Use an already open packet socket
    pub fn attach(&self, conn: Arc<dyn PacketConn>) {
        *self.conn.write() = Some(conn);
    }

    fn packet_conn(&self) -> Result<Arc<dyn PacketConn>> {
        self.conn.read().clone().ok_or(GtpError::NotBound)
    }

    /// Address of the bound socket, or the configured one before binding
    pub fn local_addr(&self) -> SocketAddr {
        self.packet_conn()
            .and_then(|c| c.local_addr())
            .unwrap_or(self.local_addr)
    }

    /// Bind and run the receive loop until `cancel` fires or the Connection closes
    pub async fn listen_and_serve(self: &Arc<Self>, cancel: CancellationToken) -> Result<()> {
        self.bind().await?;
        self.serve(cancel).await
    }

    /// Bind, confirm `remote` answers an Echo Request, then serve in the background.
    ///
    /// Fails with `Timeout` when no Echo Response arrives within the echo timeout.
    pub async fn dial(self: &Arc<Self>, remote: SocketAddr, cancel: CancellationToken) -> Result<()> {
        self.bind().await?;
        let conn = self.packet_conn()?;
        self.echo_request(remote).await?;

        let mut buf = vec![0u8; self.recv_buffer_size];
        let wait = async {
            loop {
                let (n, peer) = conn.recv_from(&mut buf).await?;
                let msg = match Message::parse(&buf[..n]) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(%peer, "Dropping undecodable datagram while dialing: {}", e);
                        continue;
                    }
                };
                let is_echo = peer == remote
                    && msg.message_type() == MessageType::EchoResponse as u8;
                self.handle_message(peer, msg).await;
                if is_echo {
                    return Ok::<(), GtpError>(());
                }
            }
        };

        match tokio::time::timeout(self.echo_timeout, wait).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%remote, "Peer did not answer Echo Request");
                return Err(GtpError::Timeout(self.echo_timeout));
            }
        }
        info!(%remote, "Peer answered Echo Request");

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.serve(cancel).await {
                error!("Receive loop ended: {}", e);
            }
        });
        Ok(())
    }

    /// Receive loop: one spawned task per datagram.
    ///
    /// Receive errors are retried with a growing pause; after
    /// [`MAX_RECV_ERRORS`] in a row the last one is returned.
    pub async fn serve(self: &Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let conn = self.packet_conn()?;
        let mut buf = vec![0u8; self.recv_buffer_size];
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Receive loop cancelled");
                    return Ok(());
                }
                _ = self.closed.cancelled() => {
                    debug!("Receive loop stopped by close");
                    return Ok(());
                }
                received = conn.recv_from(&mut buf) => match received {
                    Ok((n, peer)) => {
                        failures = 0;
                        let data = buf[..n].to_vec();
                        let this = self.clone();
                        tokio::spawn(async move {
                            this.process_datagram(peer, &data).await;
                        });
                    }
                    Err(e) => {
                        failures += 1;
                        if failures >= MAX_RECV_ERRORS {
                            error!(failures, "Giving up after repeated receive errors: {}", e);
                            return Err(e);
                        }
                        let pause = recv_backoff(failures);
                        warn!(failures, ?pause, "Receive error: {}", e);
                        tokio::time::sleep(pause).await;
                    }
                },
            }
        }
    }

    /// Stop the receive loop, drop the socket and reset handler and restart state.
    ///
    /// Closing twice is harmless.
    pub fn close(&self) {
        if self.closed.is_cancelled() {
            debug!("Connection already closed");
            return;
        }
        self.closed.cancel();
        *self.conn.write() = None;
        self.handlers.reset();
        self.restart_counter.store(0, Ordering::Relaxed);
        info!(addr = %self.local_addr, "GTPv2-C connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    // ========================================
    // Inbound path
    // ========================================

    async fn process_datagram(self: &Arc<Self>, peer: SocketAddr, data: &[u8]) {
        match Message::parse(data) {
            Ok(msg) => self.handle_message(peer, msg).await,
            Err(e) => {
                DECODE_ERRORS_TOTAL.inc();
                warn!(%peer, len = data.len(), "Failed to decode message: {}", e);
                self.notify(&DispatchFailure::Decode { peer, error: e });
            }
        }
    }

    /// Validate and dispatch one decoded message.
    ///
    /// Handler errors are logged, counted and passed to the error hook; they
    /// are not returned.
    pub async fn handle_message(self: &Arc<Self>, peer: SocketAddr, msg: Message) {
        let message_type = msg.message_type();
        let name = describe_message(message_type);
        MESSAGES_RECEIVED_TOTAL.with_label_values(&[name.as_str()]).inc();
        debug!(%peer, msg_type = %name, seq = msg.sequence(), teid = ?msg.teid(), "Received message");

        if self.validation.load(Ordering::Relaxed) {
            if msg.version() != GTP_VERSION_2 {
                VALIDATION_FAILURES_TOTAL.with_label_values(&["version"]).inc();
                warn!(%peer, version = msg.version(), "Unsupported GTP version");
                let vns = Message::version_not_supported(None, msg.sequence());
                if let Err(e) = self.send_raw(&vns, peer).await {
                    error!(%peer, "Failed to send Version Not Supported Indication: {}", e);
                }
                self.notify(&DispatchFailure::UnsupportedVersion {
                    peer,
                    version: msg.version(),
                });
                return;
            }

            if let Some(teid) = msg.teid().filter(|t| *t != 0) {
                if let Err(e) = self.registry.get_by_teid(teid, peer) {
                    VALIDATION_FAILURES_TOTAL.with_label_values(&["teid"]).inc();
                    warn!(%peer, teid, msg_type = %name, "Invalid TEID: {}", e);
                    self.notify(&DispatchFailure::InvalidTeid { peer, teid, error: e });
                }
            }
        }

        let Some(handler) = self.handlers.get(message_type) else {
            warn!(%peer, msg_type = %name, "No handler registered");
            self.notify(&DispatchFailure::NoHandler { peer, message_type });
            return;
        };

        let timer = DISPATCH_LATENCY_SECONDS.start_timer();
        let result = handler(self.clone(), peer, msg).await;
        timer.observe_duration();

        if let Err(e) = result {
            HANDLER_ERRORS_TOTAL.with_label_values(&[name.as_str()]).inc();
            if e.is_timeout() {
                CORRELATION_TIMEOUTS_TOTAL.inc();
            }
            error!(%peer, msg_type = %name, severity = %e.severity(), "Handler failed: {}", e);
            self.notify(&DispatchFailure::Handler {
                peer,
                message_type,
                error: e,
            });
        }
    }

    fn notify(&self, failure: &DispatchFailure) {
        let hook = self.error_hook.read().clone();
        if let Some(hook) = hook {
            hook(failure);
        }
    }

    // ========================================
    // Configuration of the receive path
    // ========================================

    pub fn add_handler(&self, message_type: u8, handler: HandlerFn) {
        self.handlers.register(message_type, handler);
    }

    pub fn add_handlers(&self, handlers: impl IntoIterator<Item = (u8, HandlerFn)>) {
        self.handlers.register_all(handlers);
    }

    pub fn has_handler(&self, message_type: u8) -> bool {
        self.handlers.contains(message_type)
    }

    /// Observe receive-path failures in addition to logs and metrics
    pub fn set_error_hook(&self, hook: impl Fn(&DispatchFailure) + Send + Sync + 'static) {
        *self.error_hook.write() = Some(Arc::new(hook));
    }

    pub fn enable_validation(&self) {
        self.validation.store(true, Ordering::Relaxed);
    }

    pub fn disable_validation(&self) {
        self.validation.store(false, Ordering::Relaxed);
    }

    pub fn restart_counter(&self) -> u8 {
        self.restart_counter.load(Ordering::Relaxed)
    }

    // ========================================
    // Sequence numbers
    // ========================================

    /// Advance the 24-bit counter and return the new value
    pub fn next_sequence(&self) -> u32 {
        let prev = self
            .sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                Some(if s >= MAX_SEQUENCE { 0 } else { s + 1 })
            })
            .unwrap_or_else(|s| s);
        if prev >= MAX_SEQUENCE {
            0
        } else {
            prev + 1
        }
    }

    fn rewind_sequence(&self) {
        let _ = self
            .sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                Some(if s == 0 { MAX_SEQUENCE } else { s - 1 })
            });
    }

    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire)
    }

    // ========================================
    // Outbound path
    // ========================================

    async fn send_raw(&self, msg: &Message, to: SocketAddr) -> Result<()> {
        let conn = self.packet_conn()?;
        conn.send_to(&msg.serialize()?, to).await?;
        let name = describe_message(msg.message_type());
        MESSAGES_SENT_TOTAL.with_label_values(&[name.as_str()]).inc();
        debug!(peer = %to, msg_type = msg.name(), seq = msg.sequence(), "Sent message");
        Ok(())
    }

    /// Stamp a fresh sequence number on `msg` and send it; returns the number used
    pub async fn send_message_to(&self, mut msg: Message, to: SocketAddr) -> Result<u32> {
        let seq = self.next_sequence();
        msg.set_sequence(seq);
        if let Err(e) = self.send_raw(&msg, to).await {
            self.rewind_sequence();
            return Err(e);
        }
        Ok(seq)
    }

    /// Send `response` carrying the sequence number of `request`
    pub async fn respond_to(&self, to: SocketAddr, request: &Message, mut response: Message) -> Result<()> {
        response.set_sequence(request.sequence());
        self.send_raw(&response, to).await
    }

    pub async fn echo_request(&self, to: SocketAddr) -> Result<u32> {
        let msg = Message::echo_request(0, self.restart_counter(), vec![]);
        self.send_message_to(msg, to).await
    }

    pub async fn echo_response(&self, to: SocketAddr, request: &Message) -> Result<()> {
        let msg = Message::echo_response(request.sequence(), self.restart_counter(), vec![]);
        self.respond_to(to, request, msg).await
    }

    /// Send a Create Session Request built from `ies` and register the Session it creates.
    ///
    /// The Session is registered before sending so a fast response finds it;
    /// a failed send unregisters it again.
    pub async fn create_session(&self, to: SocketAddr, ies: Vec<Ie>) -> Result<(Arc<Session>, u32)> {
        let session = Arc::new(Session::new(to, Subscriber::default(), Bearer::default()));
        session.update_from_ies(&ies)?;
        self.registry.add(session.clone())?;

        let msg = Message::create_session_request(0, 0, ies);
        match self.send_message_to(msg, to).await {
            Ok(seq) => {
                info!(imsi = %session.imsi(), peer = %to, seq, "Create Session Request sent");
                Ok((session, seq))
            }
            Err(e) => {
                self.registry.remove(&session);
                Err(e)
            }
        }
    }

    /// Send a Delete Session Request for `session` to its peer
    pub async fn delete_session(&self, teid: u32, session: &Session, ies: Vec<Ie>) -> Result<u32> {
        let msg = Message::delete_session_request(teid, 0, ies);
        self.send_message_to(msg, session.peer_addr()).await
    }

    /// Send a Modify Bearer Request for `session` to its peer
    pub async fn modify_bearer(&self, teid: u32, session: &Session, ies: Vec<Ie>) -> Result<u32> {
        let msg = Message::modify_bearer_request(teid, 0, ies);
        self.send_message_to(msg, session.peer_addr()).await
    }

    /// Send a Delete Bearer Request for `session` to its peer
    pub async fn delete_bearer(&self, teid: u32, session: &Session, ies: Vec<Ie>) -> Result<u32> {
        let msg = Message::delete_bearer_request(teid, 0, ies);
        self.send_message_to(msg, session.peer_addr()).await
    }

    /// Wait on `session` for the message answering `sequence`
    pub async fn wait_response(&self, session: &Session, sequence: u32, timeout: Duration) -> Result<Message> {
        let result = session.wait_message(sequence, timeout).await;
        if matches!(result, Err(GtpError::Timeout(_))) {
            CORRELATION_TIMEOUTS_TOTAL.inc();
            warn!(imsi = %session.imsi(), seq = sequence, "Timed out waiting for response");
        }
        result
    }

    // ========================================
    // TEIDs and Sessions
    // ========================================

    /// Reserve a fresh TEID and wrap it in an F-TEID IE
    pub fn new_fteid(
        &self,
        interface_type: u8,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Result<FTeidLease> {
        allocate(
            &self.registry,
            interface_type,
            ipv4,
            ipv6,
            self.teid_allocation_attempts,
        )
    }

    /// Reserve a TEID advertised with the address of the bound socket
    pub fn new_local_fteid(&self, interface_type: u8) -> Result<FTeidLease> {
        match self.local_addr().ip() {
            IpAddr::V4(v4) => self.new_fteid(interface_type, Some(v4), None),
            IpAddr::V6(v6) => self.new_fteid(interface_type, None, Some(v6)),
        }
    }

    /// Register a Session; fails when it has no IMSI
    pub fn add_session(&self, session: Arc<Session>) -> Result<()> {
        self.registry.add(session)
    }

    pub fn remove_session(&self, session: &Arc<Session>) {
        self.registry.remove(session);
    }

    pub fn get_session_by_teid(&self, teid: u32, peer: SocketAddr) -> Result<Arc<Session>> {
        self.registry.get_by_teid(teid, peer)
    }

    pub fn get_session_by_imsi(&self, imsi: &str) -> Result<Arc<Session>> {
        self.registry.get_by_imsi(imsi)
    }

    pub fn session_count(&self) -> usize {
        self.registry.count()
    }

    pub fn bearer_count(&self) -> usize {
        self.registry.bearer_count()
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.registry.sessions()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("local_addr", &self.local_addr())
            .field("restart_counter", &self.restart_counter())
            .field("sessions", &self.session_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
