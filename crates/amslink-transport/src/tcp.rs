use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::AmsStream;

/// Default TCP port of an AMS router.
pub const DEFAULT_ROUTER_PORT: u16 = 48898;

/// Client side of the TCP transport.
pub struct TcpTransport;

impl TcpTransport {
    /// Connect to a router, bounding the TCP handshake by `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<AmsStream> {
        let addr = format!("{host}:{port}");
        let connect = tokio::net::TcpStream::connect(&addr);
        let stream = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => return Err(TransportError::ConnectTimeout { addr, timeout }),
        };
        debug!(%addr, "connected to router");
        AmsStream::from_tcp(stream)
    }
}

/// Listening side, used when acting as a device (simulator, tests).
pub struct TcpListener {
    listener: tokio::net::TcpListener,
    addr: SocketAddr,
}

impl TcpListener {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:0`).
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|source| TransportError::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening for router connections");
        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> Result<AmsStream> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        AmsStream::from_tcp(stream)
    }

    /// The bound address (resolves port 0 to the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn connect_and_exchange_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().port();

        let server = tokio::spawn(async move {
            let stream = listener.accept().await.unwrap();
            let (mut rd, mut wr) = stream.into_split();
            let mut buf = [0u8; 4];
            rd.read_exact(&mut buf).await.unwrap();
            wr.write_all(&buf).await.unwrap();
        });

        let stream = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().port(), port);

        let (mut rd, mut wr) = stream.into_split();
        wr.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        rd.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_reports_address() {
        // Bind then drop to obtain a port with nothing listening.
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };

        let err = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap_err();
        match err {
            TransportError::Connect { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn bind_rejects_invalid_address() {
        let err = TcpListener::bind("not-an-address").await.err().unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[tokio::test]
    async fn debug_output_names_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let stream = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        let rendered = format!("{stream:?}");
        assert!(rendered.contains("tcp"));
        let _server_side = accept.await.unwrap();
    }
}
