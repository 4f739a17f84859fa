//! Broadcast relay.
//!
//! Provides [`Relay`], a single-task server that forwards every frame it
//! receives from one peer to all other connected peers. The relay never
//! decrypts: bodies are forwarded exactly as received.
//!
//! Each iteration runs four steps:
//!
//! 1. **Accept** - take every pending connection without blocking.
//! 2. **Poll** - one readiness check across all live peers, bounded by
//!    `poll_timeout`.
//! 3. **Dispatch** - read ready peers, reassemble frames, queue each frame for
//!    every other live peer and flush the queues.
//! 4. **Sweep** - purge connections marked dead.
//!
//! When nothing was ready the loop sleeps for `idle_delay` before the next
//! pass. The registry is only mutated between polls, so no locking is needed.

use std::io;
use std::net::SocketAddr;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, trace, warn};

use super::registry::{Connection, ConnectionId, ConnectionRegistry, RegistryError};
use crate::core::{
    ConfigError, DEFAULT_IDLE_DELAY, DEFAULT_MAX_PEERS, DEFAULT_MAX_PENDING_BYTES,
    DEFAULT_POLL_TIMEOUT, DEFAULT_READ_BUDGET, MAX_FRAME_SIZE, READ_CHUNK_SIZE,
};
use crate::transport::{Frame, FrameReassembler, ShutdownSignal, TransportError};

/// Errors that can occur in the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Failed to bind the listening socket.
    #[error("bind failed: {0}")]
    BindFailed(io::Error),

    /// Registry rejected a connection.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,

    /// Sleep between iterations in which nothing was ready.
    pub idle_delay: Duration,

    /// Upper bound on one readiness poll.
    pub poll_timeout: Duration,

    /// Maximum number of registered peers. Further connections are refused.
    pub max_peers: usize,

    /// Outbound bytes a peer may have queued before it is dropped.
    pub max_pending_bytes: usize,

    /// Bytes read from a single peer per dispatch pass.
    pub read_budget: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            idle_delay: DEFAULT_IDLE_DELAY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_peers: DEFAULT_MAX_PEERS,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
            read_budget: DEFAULT_READ_BUDGET,
        }
    }
}

impl RelayConfig {
    /// Check that the values can drive the relay loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_timeout",
                reason: "must be non-zero",
            });
        }
        if self.max_peers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_peers",
                reason: "must allow at least one peer",
            });
        }
        if self.max_pending_bytes < MAX_FRAME_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "max_pending_bytes",
                reason: "must hold at least one maximum-size frame",
            });
        }
        if self.read_budget == 0 {
            return Err(ConfigError::InvalidValue {
                field: "read_budget",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

/// Builder for creating a [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    /// Set the listen address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Listen on all interfaces at `port`.
    pub fn port(mut self, port: u16) -> Self {
        self.config.bind_addr.set_port(port);
        self
    }

    /// Set the idle delay.
    pub fn idle_delay(mut self, delay: Duration) -> Self {
        self.config.idle_delay = delay;
        self
    }

    /// Set the poll timeout.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Set the maximum number of peers.
    pub fn max_peers(mut self, max: usize) -> Self {
        self.config.max_peers = max;
        self
    }

    /// Set the per-peer outbound queue limit.
    pub fn max_pending_bytes(mut self, max: usize) -> Self {
        self.config.max_pending_bytes = max;
        self
    }

    /// Set the per-peer read budget.
    pub fn read_budget(mut self, budget: usize) -> Self {
        self.config.read_budget = budget;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<RelayConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RelayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters describing what the relay has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Connections accepted and registered.
    pub accepted: u64,
    /// Connections refused because the relay was full.
    pub refused: u64,
    /// Connections purged after closing or failing.
    pub disconnected: u64,
    /// Frames received and queued for other peers.
    pub frames_forwarded: u64,
    /// Frame bytes queued for other peers, summed over recipients.
    pub bytes_forwarded: u64,
}

/// Per-peer transport state.
#[derive(Debug)]
struct PeerLink {
    stream: TcpStream,
    inbound: FrameReassembler,
    outbound: BytesMut,
}

impl PeerLink {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            inbound: FrameReassembler::new(),
            outbound: BytesMut::new(),
        }
    }
}

/// Readiness reported for one connection by a poll.
#[derive(Debug, Clone, Copy)]
struct PollEvent {
    id: ConnectionId,
    readable: bool,
    writable: bool,
    failed: bool,
}

/// Frames read from one peer, plus how the read ended.
#[derive(Debug, Default)]
struct ReadOutcome {
    frames: Vec<Frame>,
    end: Option<TransportError>,
}

/// A broadcast relay.
///
/// # Example
///
/// ```ignore
/// use relaychat::server::{Relay, RelayConfigBuilder};
/// use relaychat::transport::Shutdown;
///
/// let config = RelayConfigBuilder::new().port(4040).build()?;
/// let relay = Relay::bind(config).await?;
///
/// let shutdown = Shutdown::new();
/// relay.run(shutdown.signal()).await?;
/// ```
#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    listener: TcpListener,
    registry: ConnectionRegistry<PeerLink>,
    next_id: u64,
    stats: RelayStats,
}

impl Relay {
    /// Bind the listening socket.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(RelayError::BindFailed)?;

        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            registry: ConnectionRegistry::new(),
            next_id: 0,
            stats: RelayStats::default(),
        })
    }

    /// Get the address the relay is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Number of live peers.
    pub fn peer_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Run until `shutdown` fires.
    ///
    /// Pass [`ShutdownSignal::never`] to run for the life of the process.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<RelayStats, RelayError> {
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            if !self.step().await {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = tokio::time::sleep(self.config.idle_delay) => {}
                }
            }
        }

        info!(
            peers = self.registry.len(),
            frames = self.stats.frames_forwarded,
            "Relay stopped"
        );
        Ok(self.stats)
    }

    /// Run one accept, poll, dispatch and sweep pass.
    ///
    /// Returns `true` if a connection was accepted or a peer was ready.
    pub async fn step(&mut self) -> bool {
        let accepted = self.accept_pending();
        let events = self.poll_ready().await;

        self.dispatch(&events);
        self.flush();
        self.sweep();

        accepted > 0 || !events.is_empty()
    }

    /// Accept every pending connection without waiting.
    fn accept_pending(&mut self) -> usize {
        let mut cx = Context::from_waker(Waker::noop());
        let mut accepted = 0;

        loop {
            match self.listener.poll_accept(&mut cx) {
                Poll::Pending => break,
                Poll::Ready(Ok((stream, peer))) => {
                    if self.register(stream, peer) {
                        accepted += 1;
                    }
                }
                Poll::Ready(Err(e)) => {
                    // Accept failures never stop the relay
                    warn!("accept() failed: {}", e);
                    break;
                }
            }
        }

        accepted
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) -> bool {
        if self.registry.len() >= self.config.max_peers {
            warn!(%peer, max = self.config.max_peers, "Relay full, refusing peer");
            self.stats.refused += 1;
            return false;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, "set_nodelay failed: {}", e);
        }

        self.next_id += 1;
        let id = ConnectionId::new(self.next_id);
        match self
            .registry
            .register(Connection::new(id, peer, PeerLink::new(stream)))
        {
            Ok(()) => {
                info!(%id, address = %peer.ip(), port = peer.port(), "Accepted peer");
                self.stats.accepted += 1;
                true
            }
            Err(e) => {
                warn!(%peer, "{}", e);
                false
            }
        }
    }

    /// Wait until at least one live peer is readable, writable with queued
    /// output, or failed; or until `poll_timeout` passes.
    async fn poll_ready(&self) -> Vec<PollEvent> {
        let registry = &self.registry;

        let wait = std::future::poll_fn(|cx| {
            let mut events = Vec::new();

            for conn in registry.iter_live() {
                let link = conn.transport();
                let mut event = PollEvent {
                    id: conn.id(),
                    readable: false,
                    writable: false,
                    failed: false,
                };

                match link.stream.poll_read_ready(cx) {
                    Poll::Ready(Ok(())) => event.readable = true,
                    Poll::Ready(Err(_)) => event.failed = true,
                    Poll::Pending => {}
                }

                if !link.outbound.is_empty() {
                    match link.stream.poll_write_ready(cx) {
                        Poll::Ready(Ok(())) => event.writable = true,
                        Poll::Ready(Err(_)) => event.failed = true,
                        Poll::Pending => {}
                    }
                }

                if event.readable || event.writable || event.failed {
                    events.push(event);
                }
            }

            if events.is_empty() {
                Poll::Pending
            } else {
                Poll::Ready(events)
            }
        });

        tokio::time::timeout(self.config.poll_timeout, wait)
            .await
            .unwrap_or_default()
    }

    fn dispatch(&mut self, events: &[PollEvent]) {
        for event in events {
            if event.failed {
                debug!(id = %event.id, "Peer hung up or errored");
                self.registry.mark_dead(event.id);
                continue;
            }

            // May have been marked dead by an earlier broadcast in this pass
            let live = self.registry.get(event.id).is_some_and(Connection::is_live);
            if !event.readable || !live {
                continue;
            }

            let outcome = self.read_frames(event.id);

            for frame in &outcome.frames {
                self.broadcast(event.id, frame);
            }

            if let Some(end) = outcome.end {
                if end.is_graceful_close() {
                    debug!(id = %event.id, "Peer closed connection");
                } else {
                    warn!(id = %event.id, "Read failed: {}", end);
                }
                self.registry.mark_dead(event.id);
            }
        }
    }

    /// Read what is available from one peer and split it into frames.
    fn read_frames(&mut self, id: ConnectionId) -> ReadOutcome {
        let budget = self.config.read_budget;
        let Some(conn) = self.registry.get_mut(id) else {
            return ReadOutcome::default();
        };
        let link = conn.transport_mut();

        let mut outcome = ReadOutcome::default();
        let mut read = 0;

        while read < budget {
            let buf = link.inbound.read_buf(READ_CHUNK_SIZE);
            match link.stream.try_read_buf(buf) {
                Ok(0) => {
                    outcome.end = Some(TransportError::ConnectionClosed);
                    break;
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // WouldBlock ends this pass without ending the connection
                    let err = TransportError::Io(e);
                    if err.is_fatal() {
                        outcome.end = Some(err);
                    }
                    break;
                }
            }
        }

        trace!(%id, read, buffered = link.inbound.buffered(), "Read from peer");

        match link.inbound.drain_frames() {
            Ok(frames) => outcome.frames = frames,
            Err(e) => {
                outcome.end.get_or_insert(TransportError::Frame(e));
            }
        }

        outcome
    }

    /// Queue `frame` for every live peer except `origin`, then flush.
    fn broadcast(&mut self, origin: ConnectionId, frame: &Frame) {
        let bytes = frame.to_bytes();
        let limit = self.config.max_pending_bytes;
        let mut recipients = 0u64;

        self.registry.for_each_except(origin, |conn| {
            let pending = conn.transport().outbound.len();
            if pending + bytes.len() > limit {
                let err = TransportError::PeerTooSlow { pending, limit };
                warn!(id = %conn.id(), peer = %conn.peer(), "{}", err);
                conn.mark_dead();
                return;
            }
            conn.transport_mut().outbound.extend_from_slice(&bytes);
            recipients += 1;
        });

        self.stats.frames_forwarded += 1;
        self.stats.bytes_forwarded += recipients * bytes.len() as u64;
        debug!(
            from = %origin,
            nonce = frame.nonce,
            len = frame.body.len(),
            recipients,
            "Forwarded frame"
        );

        self.flush();
    }

    /// Write as much queued output as each peer accepts without blocking.
    fn flush(&mut self) {
        for conn in self.registry.iter_live_mut() {
            let link = conn.transport_mut();
            let mut failure = None;

            while !link.outbound.is_empty() {
                match link.stream.try_write(&link.outbound) {
                    Ok(0) => {
                        failure = Some(TransportError::Io(io::ErrorKind::WriteZero.into()));
                        break;
                    }
                    Ok(n) => link.outbound.advance(n),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let err = TransportError::Io(e);
                        if err.is_fatal() {
                            failure = Some(err);
                        }
                        break;
                    }
                }
            }

            if let Some(e) = failure {
                warn!(id = %conn.id(), peer = %conn.peer(), "send() failed: {}", e);
                conn.mark_dead();
            }
        }
    }

    fn sweep(&mut self) {
        let removed = self.registry.purge_dead();
        self.stats.disconnected += removed.len() as u64;
    }
}
