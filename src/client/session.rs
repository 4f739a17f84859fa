//! Peer session.
//!
//! A [`PeerSession`] holds one connection to a relay, the shared passphrase,
//! a running nonce and the sender tag chosen at startup. Outgoing text is
//! truncated if needed, encrypted and framed; incoming frames are reassembled
//! and decrypted with the nonce carried in each frame.
//!
//! The cipher and framing state lives in [`SessionState`], which does no I/O
//! and can be driven directly.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::message::{IncomingMessage, MessageSink};
use crate::core::{
    CipherError, ConfigError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUDGET, MAX_BODY_LEN,
    READ_CHUNK_SIZE,
};
use crate::crypto::{Passphrase, decrypt, encrypt};
use crate::transport::{
    AddressParseError, Frame, FrameError, FrameHeader, FrameReassembler, FrameType, PeerAddress,
    SenderTag, ShutdownSignal,
};

/// Errors that can occur in a peer session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Passphrase is empty.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] CipherError),

    /// Relay address literal is malformed.
    #[error(transparent)]
    AddressParse(#[from] AddressParseError),

    /// Failed to connect to the relay.
    #[error("connection failed: {0}")]
    ConnectFailed(io::Error),

    /// Connecting took longer than the configured timeout.
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The relay closed the connection.
    #[error("connection closed by relay")]
    Closed,

    /// I/O error on the session's connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed data from the relay.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay to connect to.
    pub server_addr: PeerAddress,

    /// Shared passphrase.
    pub passphrase: Passphrase,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl SessionConfig {
    /// Validate a relay address literal and a passphrase.
    ///
    /// Both are checked here, before any connection is attempted. The
    /// passphrase is checked first.
    pub fn new(addr: &str, passphrase: impl Into<Vec<u8>>) -> Result<Self, SessionError> {
        let passphrase = Passphrase::new(passphrase)?;
        let server_addr = addr.parse::<PeerAddress>()?;

        Ok(Self::with_address(server_addr, passphrase))
    }

    /// Build from an already parsed address and passphrase.
    pub fn with_address(server_addr: PeerAddress, passphrase: Passphrase) -> Self {
        Self {
            server_addr,
            passphrase,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check the configured values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

/// Cipher and framing state of a session.
#[derive(Debug, Clone)]
pub struct SessionState {
    passphrase: Passphrase,
    tag: SenderTag,
    nonce: u8,
}

impl SessionState {
    /// Create state with the nonce counter at zero.
    pub fn new(passphrase: Passphrase, tag: SenderTag) -> Self {
        Self {
            passphrase,
            tag,
            nonce: 0,
        }
    }

    /// This session's sender tag.
    pub fn tag(&self) -> SenderTag {
        self.tag
    }

    /// Nonce of the last sealed message (0 before the first).
    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    /// Encrypt and frame one outgoing message.
    ///
    /// Text longer than the maximum body is truncated with a warning. The
    /// nonce is advanced first, so the first message carries nonce 1.
    pub fn seal(&mut self, plaintext: &[u8]) -> Frame {
        let text = if plaintext.len() > MAX_BODY_LEN {
            warn!(
                len = plaintext.len(),
                max = MAX_BODY_LEN,
                "Message too long, truncating"
            );
            &plaintext[..MAX_BODY_LEN]
        } else {
            plaintext
        };

        self.nonce = self.nonce.wrapping_add(1);

        let mut body = text.to_vec();
        encrypt(&mut body, &self.passphrase, self.nonce);

        Frame {
            frame_type: FrameType::UserMessage.as_byte(),
            nonce: self.nonce,
            sender: self.tag,
            body: body.into(),
        }
    }

    /// Decrypt an incoming frame.
    ///
    /// Returns `None` for frame types other than user messages.
    pub fn open(&self, frame: &Frame) -> Option<IncomingMessage> {
        if frame.kind() != Some(FrameType::UserMessage) {
            debug!(
                frame_type = frame.frame_type,
                sender = %frame.sender,
                "Ignoring non-message frame"
            );
            return None;
        }

        let mut text = frame.body.to_vec();
        decrypt(&mut text, &self.passphrase, frame.nonce);

        Some(IncomingMessage {
            sender: frame.sender,
            nonce: frame.nonce,
            text,
        })
    }
}

/// What woke the interactive loop.
enum Wake {
    Stop,
    Line(Vec<u8>),
    InputClosed,
    Readable(io::Result<()>),
}

/// A connected peer session.
///
/// # Example
///
/// ```ignore
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use relaychat::client::{PeerSession, SessionConfig};
/// use relaychat::transport::SenderTag;
///
/// let config = SessionConfig::new("127.0.0.1:4040", "secret")?;
/// let mut rng = StdRng::from_entropy();
/// let mut session = PeerSession::connect(config, SenderTag::generate(&mut rng)).await?;
///
/// session.send(b"hello").await?;
/// for message in session.poll_incoming()? {
///     println!("{}", message);
/// }
/// ```
#[derive(Debug)]
pub struct PeerSession {
    stream: TcpStream,
    reassembler: FrameReassembler,
    state: SessionState,
    server_addr: PeerAddress,
    closed: bool,
}

impl PeerSession {
    /// Connect to the relay.
    pub async fn connect(config: SessionConfig, tag: SenderTag) -> Result<Self, SessionError> {
        config.validate()?;

        let target = config.server_addr.socket_addr();
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(target))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(SessionError::ConnectFailed(e)),
            Err(_) => return Err(SessionError::ConnectTimeout(config.connect_timeout)),
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }

        info!(relay = %config.server_addr, %tag, "Connected to relay");

        Ok(Self {
            stream,
            reassembler: FrameReassembler::new(),
            state: SessionState::new(config.passphrase, tag),
            server_addr: config.server_addr,
            closed: false,
        })
    }

    /// This session's sender tag.
    pub fn tag(&self) -> SenderTag {
        self.state.tag()
    }

    /// Relay address this session is connected to.
    pub fn server_addr(&self) -> PeerAddress {
        self.server_addr
    }

    /// Nonce of the last sent message.
    pub fn nonce(&self) -> u8 {
        self.state.nonce()
    }

    /// Encrypt, frame and write one message.
    ///
    /// Returns the header that was sent.
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<FrameHeader, SessionError> {
        let frame = self.state.seal(plaintext);
        self.stream.write_all(&frame.to_bytes()).await?;
        Ok(frame.header())
    }

    /// Collect every message that has fully arrived, without waiting.
    ///
    /// Returns an empty list when nothing is ready. Once the relay has
    /// closed the connection, messages that arrived before the close are
    /// returned first and later calls fail with [`SessionError::Closed`].
    pub fn poll_incoming(&mut self) -> Result<Vec<IncomingMessage>, SessionError> {
        let mut read = 0;
        while !self.closed && read < DEFAULT_READ_BUDGET {
            let buf = self.reassembler.read_buf(READ_CHUNK_SIZE);
            match self.stream.try_read_buf(buf) {
                Ok(0) => {
                    debug!(relay = %self.server_addr, "Relay closed connection");
                    self.closed = true;
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let messages: Vec<_> = self
            .reassembler
            .drain_frames()?
            .iter()
            .filter_map(|frame| self.state.open(frame))
            .collect();

        if self.closed && messages.is_empty() {
            return Err(SessionError::Closed);
        }
        Ok(messages)
    }

    /// Drive the session until `shutdown` fires or `outgoing` is closed.
    ///
    /// Each pass checks the stop signal, hands every ready message to
    /// `sink`, then waits for an outgoing line, incoming data or the stop
    /// signal. Empty lines are not sent.
    pub async fn run<S>(
        &mut self,
        outgoing: &mut mpsc::Receiver<Vec<u8>>,
        sink: &mut S,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), SessionError>
    where
        S: MessageSink + ?Sized,
    {
        loop {
            if shutdown.is_shutdown() {
                return Ok(());
            }

            for message in self.poll_incoming()? {
                sink.deliver(message);
            }

            let wake = tokio::select! {
                _ = shutdown.wait() => Wake::Stop,
                line = outgoing.recv() => match line {
                    Some(line) => Wake::Line(line),
                    None => Wake::InputClosed,
                },
                ready = self.stream.readable() => Wake::Readable(ready),
            };

            match wake {
                Wake::Stop => return Ok(()),
                Wake::InputClosed => {
                    debug!("Input closed, ending session");
                    return Ok(());
                }
                Wake::Line(line) if line.is_empty() => {}
                Wake::Line(line) => {
                    self.send(&line).await?;
                }
                Wake::Readable(ready) => ready?,
            }
        }
    }
}
