//! Bluetooth RFCOMM stream sockets.
//!
//! The standard library has no Bluetooth address family, so the socket is
//! created through `libc` and driven by tokio's [`AsyncFd`] readiness API.

use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::future::BoxFuture;
use nix::sys::socket::{getsockopt, shutdown, sockopt, Shutdown};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::core::{BdAddr, DEFAULT_RFCOMM_CHANNEL};
use super::link::Connector;

const BTPROTO_RFCOMM: libc::c_int = 3;

/// `struct sockaddr_rc` from the kernel's Bluetooth headers
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// Connects to the accessory's serial port profile channel
#[derive(Debug, Clone, Copy)]
pub struct RfcommConnector {
    channel: u8,
}

impl RfcommConnector {
    pub fn new(channel: u8) -> Self {
        RfcommConnector { channel }
    }
}

impl Default for RfcommConnector {
    fn default() -> Self {
        Self::new(DEFAULT_RFCOMM_CHANNEL)
    }
}

impl Connector for RfcommConnector {
    type Stream = RfcommStream;

    fn connect(&self, address: BdAddr) -> BoxFuture<'static, io::Result<RfcommStream>> {
        let channel = self.channel;
        Box::pin(async move { RfcommStream::connect(address, channel).await })
    }
}

/// A connected, non-blocking RFCOMM socket
pub struct RfcommStream {
    fd: AsyncFd<OwnedFd>,
}

impl RfcommStream {
    /// Connects to `channel` on `address` without blocking the runtime
    pub async fn connect(address: BdAddr, channel: u8) -> io::Result<Self> {
        let raw = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // bdaddr_t is little-endian
        let mut bdaddr = address.0;
        bdaddr.reverse();
        let sockaddr = SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: bdaddr,
            rc_channel: channel,
        };

        debug!(%address, channel, "connecting rfcomm socket");
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &sockaddr as *const SockaddrRc as *const libc::sockaddr,
                mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINPROGRESS) {
                return Err(err);
            }
        }

        let fd = AsyncFd::new(fd)?;
        drop(fd.writable().await?);
        match getsockopt(fd.as_raw_fd(), sockopt::SocketError)? {
            0 => Ok(RfcommStream { fd }),
            errno => Err(io::Error::from_raw_os_error(errno)),
        }
    }
}

impl AsRawFd for RfcommStream {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsyncRead for RfcommStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                nix::unistd::read(inner.as_raw_fd(), unfilled).map_err(io::Error::from)
            }) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for RfcommStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                nix::unistd::write(inner.as_raw_fd(), buf).map_err(io::Error::from)
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(shutdown(self.fd.as_raw_fd(), Shutdown::Write).map_err(io::Error::from))
    }
}
