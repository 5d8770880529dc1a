use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::Result;

/// A connected router stream.
///
/// Wraps a TCP stream with `TCP_NODELAY` set; AMS frames are small and latency
/// matters more than throughput.
pub struct AmsStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl AmsStream {
    pub(crate) fn from_tcp(inner: TcpStream) -> Result<Self> {
        inner.set_nodelay(true)?;
        let peer = inner.peer_addr()?;
        Ok(Self { inner, peer })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Split into independently owned read and write halves.
    ///
    /// The read half goes to the dispatch loop, the write half to the send path.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.inner.into_split()
    }

    /// Consume and return the underlying TCP stream.
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }
}

impl std::fmt::Debug for AmsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmsStream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
