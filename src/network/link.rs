use std::io;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::core::{BdAddr, Error, Result};
use crate::protocol::{Message, WatchCodec};

/// Default bound on a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Opens byte streams to an accessory
pub trait Connector: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Starts one connection attempt
    fn connect(&self, address: BdAddr) -> BoxFuture<'static, io::Result<Self::Stream>>;
}

/// Byte stream a [`Link`] can run over
pub trait LinkStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LinkStream for T {}

/// Connector with its stream type erased
pub type DynConnector = Box<dyn Connector<Stream = Box<dyn LinkStream>>>;

impl<C: Connector + ?Sized> Connector for Box<C> {
    type Stream = C::Stream;

    fn connect(&self, address: BdAddr) -> BoxFuture<'static, io::Result<Self::Stream>> {
        (**self).connect(address)
    }
}

struct Erased<C>(C);

impl<C: Connector> Connector for Erased<C> {
    type Stream = Box<dyn LinkStream>;

    fn connect(&self, address: BdAddr) -> BoxFuture<'static, io::Result<Self::Stream>> {
        let attempt = self.0.connect(address);
        Box::pin(async move {
            let stream = attempt.await?;
            Ok(Box::new(stream) as Box<dyn LinkStream>)
        })
    }
}

/// Erases the stream type of `connector`
pub fn boxed<C: Connector>(connector: C) -> DynConnector {
    Box::new(Erased(connector))
}

/// What happened on the link
#[derive(Debug)]
pub enum LinkEvent {
    /// The pending connection attempt succeeded
    Connected,
    /// A complete, checksum-verified message arrived
    Message(Message),
    /// The attempt failed or the socket broke; the link is now down
    Error(io::Error),
    /// The peer closed the stream; the link is now down
    Closed,
}

enum LinkState<S> {
    Disconnected,
    Connecting(BoxFuture<'static, io::Result<S>>),
    Connected(Framed<S, WatchCodec>),
}

/// One framed byte-stream connection to an accessory
pub struct Link<C: Connector> {
    connector: C,
    address: BdAddr,
    connect_timeout: Duration,
    state: LinkState<C::Stream>,
}

impl<C: Connector> Link<C> {
    /// Creates a disconnected link
    pub fn new(connector: C, address: BdAddr) -> Self {
        Link {
            connector,
            address,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            state: LinkState::Disconnected,
        }
    }

    /// Bounds each connection attempt by `timeout`
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> BdAddr {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected(_))
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.state, LinkState::Connecting(_))
    }

    /// Frames dropped by the decoder on the current connection
    pub fn dropped_frames(&self) -> u64 {
        match &self.state {
            LinkState::Connected(framed) => framed.codec().dropped_frames(),
            _ => 0,
        }
    }

    /// Begins a connection attempt, abandoning any current connection.
    ///
    /// The outcome is reported by [`Link::next_event`].
    pub fn connect(&mut self) {
        debug!(address = %self.address, "opening link");
        let attempt = self.connector.connect(self.address);
        let timeout = self.connect_timeout;
        self.state = LinkState::Connecting(Box::pin(async move {
            match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connection attempt timed out")),
            }
        }));
    }

    /// Drops the connection or pending attempt; does nothing if already down
    pub fn disconnect(&mut self) {
        if !matches!(self.state, LinkState::Disconnected) {
            debug!(address = %self.address, "closing link");
        }
        self.state = LinkState::Disconnected;
    }

    /// Writes one message; rejected unless connected
    pub async fn send(&mut self, message: Message) -> Result<()> {
        match &mut self.state {
            LinkState::Connected(framed) => {
                trace!(msg_type = message.msg_type, "sending message");
                framed.send(message).await
            }
            _ => Err(Error::NotConnected),
        }
    }

    /// Waits for the next link event.
    ///
    /// Pending forever while disconnected. Cancel safe: progress of a pending
    /// attempt and partially received frames are kept by the link.
    pub async fn next_event(&mut self) -> LinkEvent {
        match &mut self.state {
            LinkState::Disconnected => futures::future::pending().await,
            LinkState::Connecting(attempt) => match attempt.as_mut().await {
                Ok(stream) => {
                    self.state = LinkState::Connected(Framed::new(stream, WatchCodec::new()));
                    LinkEvent::Connected
                }
                Err(e) => {
                    self.state = LinkState::Disconnected;
                    LinkEvent::Error(e)
                }
            },
            LinkState::Connected(framed) => match framed.next().await {
                Some(Ok(message)) => LinkEvent::Message(message),
                Some(Err(Error::Io(e))) => {
                    self.state = LinkState::Disconnected;
                    LinkEvent::Error(e)
                }
                Some(Err(e)) => {
                    self.state = LinkState::Disconnected;
                    LinkEvent::Error(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
                }
                None => {
                    self.state = LinkState::Disconnected;
                    LinkEvent::Closed
                }
            },
        }
    }
}
