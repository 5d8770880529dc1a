//! One AMS connection: a single send path and a dedicated dispatch task.
//!
//! The socket is split on open. The write half sits behind an async mutex so
//! a frame from one caller is never interleaved with another. The read half is
//! owned by the dispatch task, which routes every response to its waiter
//! through the [`InvokeRegistry`]. A second task sweeps expired invocations.
//!
//! A `Connection` is single-use. Once it reaches `Disconnected` it stays
//! there; [`Client`](crate::Client) opens a fresh one to reconnect.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use amslink_frame::{
    AmsAddress, AmsCodec, AmsHeader, CommandId, Frame, FrameConfig, FrameError,
};
use amslink_transport::TcpTransport;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::registry::{InvokeRegistry, Waiter};
use crate::state::ConnectionState;

type FrameSink = FramedWrite<OwnedWriteHalf, AmsCodec>;
type FrameSource = FramedRead<OwnedReadHalf, AmsCodec>;

/// Shared between the connection handle and its background tasks.
struct Shared {
    registry: InvokeRegistry,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl Shared {
    /// Transport failure: everything pending learns about it, nothing new
    /// is accepted.
    fn fail(&self, reason: &str) {
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        let cancelled = self.registry.cancel_all(reason);
        self.cancel.cancel();
        if previous != ConnectionState::Disconnected {
            warn!(reason, cancelled, "connection lost");
        }
    }
}

/// A live connection to one AMS router.
pub struct Connection {
    config: ClientConfig,
    peer: SocketAddr,
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<FrameSink>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    /// Connect to the router named by `config.endpoint` and start the
    /// dispatch and sweeper tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = &config.endpoint;
        info!(
            target_addr = %endpoint.address,
            router = %endpoint.socket_target(),
            "connecting"
        );

        let stream = TcpTransport::connect(&endpoint.host, endpoint.port, config.connect_timeout)
            .await
            .map_err(|source| ClientError::ConnectFailed {
                target: endpoint.socket_target(),
                source,
            })?;
        let peer = stream.peer_addr();

        let codec = AmsCodec::new(FrameConfig {
            max_payload_size: config.max_payload_size,
        });
        let (read_half, write_half) = stream.into_split();
        let source = FramedRead::new(read_half, codec.clone());
        let sink = FramedWrite::new(write_half, codec);

        let (state, _) = watch::channel(ConnectionState::Connected);
        let shared = Arc::new(Shared {
            registry: InvokeRegistry::new(),
            state,
            cancel: CancellationToken::new(),
        });

        let dispatch = tokio::spawn(dispatch_loop(source, Arc::clone(&shared), config.source));
        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&shared), config.sweep_interval));

        info!(%peer, target_addr = %config.endpoint.address, "connected");
        Ok(Self {
            config,
            peer,
            shared,
            writer: tokio::sync::Mutex::new(Some(sink)),
            tasks: Mutex::new(vec![dispatch, sweeper]),
        })
    }

    /// Send one request and return the waiter for its response.
    ///
    /// The frame is fully written before this returns. The deadline starts
    /// when the invoke id is allocated. A write that does not finish within
    /// the request timeout leaves a partial frame on the wire, so it fails
    /// the connection.
    pub async fn request(&self, command: CommandId, payload: Bytes) -> Result<Waiter> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        command.ensure_supported()?;

        let (invoke_id, waiter) = self.shared.registry.register(self.config.request_timeout)?;
        let header = AmsHeader::request(
            self.config.endpoint.address,
            self.config.source,
            command,
            invoke_id,
        );
        let frame = Frame::new(header, payload);

        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            self.shared.registry.forget(invoke_id);
            return Err(ClientError::NotConnected);
        };

        debug!(invoke_id, %command, length = frame.payload.len(), "sending request");
        let sent = tokio::time::timeout(self.config.request_timeout, sink.send(frame)).await;
        let reason = match sent {
            Ok(Ok(())) => return Ok(waiter),
            Ok(Err(FrameError::Io(err))) => format!("write failed: {err}"),
            Ok(Err(err)) => {
                self.shared.registry.forget(invoke_id);
                return Err(err.into());
            }
            Err(_) => "write timed out".to_string(),
        };

        self.shared.registry.forget(invoke_id);
        writer.take();
        drop(writer);
        self.shared.fail(&reason);
        Err(ClientError::ConnectionLost(reason))
    }

    /// Send a request and wait for its response frame.
    pub async fn call(&self, command: CommandId, payload: Bytes) -> Result<Frame> {
        self.request(command, payload).await?.wait().await
    }

    /// Close the connection. Pending requests fail with `ConnectionLost`.
    ///
    /// Safe to call more than once, and after the peer already went away.
    pub async fn disconnect(&self) {
        let was_connected = self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });
        if was_connected {
            info!(peer = %self.peer, "disconnecting");
        }

        self.shared.cancel.cancel();
        if let Some(mut sink) = self.writer.lock().await.take() {
            match tokio::time::timeout(self.config.request_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(error = %err, "error shutting down write half"),
                Err(_) => debug!("timed out flushing write half"),
            }
        }
        let cancelled = self.shared.registry.cancel_all("disconnected by client");
        if cancelled > 0 {
            debug!(cancelled, "cancelled pending requests");
        }
        self.shared.state.send_replace(ConnectionState::Disconnected);

        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions, including the drop to `Disconnected` when
    /// the peer goes away.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Number of requests waiting for a response.
    pub fn pending(&self) -> usize {
        self.shared.registry.pending()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn target(&self) -> AmsAddress {
        self.config.endpoint.address
    }

    pub fn source(&self) -> AmsAddress {
        self.config.source
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.shared.registry.cancel_all("connection dropped");
        self.shared.state.send_replace(ConnectionState::Disconnected);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("target", &self.config.endpoint.address)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

async fn dispatch_loop(mut frames: FrameSource, shared: Arc<Shared>, local: AmsAddress) {
    let reason = loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            next = frames.next() => next,
        };
        match next {
            Some(Ok(frame)) => route(frame, &shared.registry, local),
            Some(Err(err)) => break format!("read failed: {err}"),
            None => break "connection closed by peer".to_string(),
        }
    };
    shared.fail(&reason);
}

fn route(frame: Frame, registry: &InvokeRegistry, local: AmsAddress) {
    let header = &frame.header;
    if header.command == CommandId::Notification {
        debug!(invoke_id = header.invoke_id, "discarding device notification");
        return;
    }
    if !header.is_response() {
        warn!(
            command = %header.command,
            invoke_id = header.invoke_id,
            "discarding unsolicited request from device"
        );
        return;
    }
    if header.target != local {
        warn!(
            target_addr = %header.target,
            expected = %local,
            invoke_id = header.invoke_id,
            "discarding response addressed elsewhere"
        );
        return;
    }

    debug!(
        invoke_id = header.invoke_id,
        command = %header.command,
        length = header.length,
        error_code = header.error_code,
        "response received"
    );
    let invoke_id = header.invoke_id;
    registry.resolve(invoke_id, Ok(frame));
}

async fn sweep_loop(shared: Arc<Shared>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {
                shared.registry.expire(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use amslink_frame::{encode_read_state_request, encode_read_state_response, ReadStateResponse};
    use amslink_transport::TcpListener;
    use tokio_util::codec::Framed;

    use super::*;
    use crate::config::Endpoint;

    fn config_for(addr: SocketAddr) -> ClientConfig {
        ClientConfig::new(
            Endpoint::new("10.0.0.1.1.1:851".parse().unwrap(), "127.0.0.1", addr.port()),
            "10.0.0.2.1.1:32905".parse().unwrap(),
        )
        .with_request_timeout(Duration::from_secs(2))
        .with_sweep_interval(Duration::from_millis(10))
    }

    async fn peer() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = config_for(listener.local_addr());
        (listener, config)
    }

    async fn accept(listener: &TcpListener) -> Framed<tokio::net::TcpStream, AmsCodec> {
        let stream = listener.accept().await.unwrap();
        Framed::new(stream.into_inner(), AmsCodec::default())
    }

    #[tokio::test]
    async fn open_reports_connect_failure() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr()
        };
        let err = Connection::open(config_for(addr)).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn open_rejects_invalid_config() {
        let config = ClientConfig::default().with_request_timeout(Duration::ZERO);
        let err = Connection::open(config).await.unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn request_roundtrip_through_dispatch() {
        let (listener, config) = peer().await;
        let (conn, mut device) = tokio::join!(Connection::open(config), accept(&listener));
        let conn = conn.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);

        let waiter = conn
            .request(CommandId::ReadState, encode_read_state_request())
            .await
            .unwrap();
        assert_eq!(conn.pending(), 1);

        let request = device.next().await.unwrap().unwrap();
        assert_eq!(request.header.command, CommandId::ReadState);
        assert_eq!(request.header.invoke_id, waiter.invoke_id());
        assert_eq!(request.header.target, conn.target());
        assert_eq!(request.header.source, conn.source());

        let state = ReadStateResponse {
            ads_state: 5,
            device_state: 0,
        };
        device
            .send(Frame::new(
                request.header.response_to(0),
                encode_read_state_response(0, state),
            ))
            .await
            .unwrap();

        let response = waiter.wait().await.unwrap();
        assert_eq!(response.header.invoke_id, request.header.invoke_id);
        assert_eq!(conn.pending(), 0);
    }

    #[tokio::test]
    async fn notifications_and_unsolicited_requests_are_ignored() {
        let (listener, config) = peer().await;
        let (conn, mut device) = tokio::join!(Connection::open(config), accept(&listener));
        let conn = conn.unwrap();

        let waiter = conn
            .request(CommandId::ReadState, encode_read_state_request())
            .await
            .unwrap();
        let request = device.next().await.unwrap().unwrap();

        let mut notification = request.header.response_to(0);
        notification.command = CommandId::Notification;
        device.send(Frame::new(notification, vec![0u8; 12])).await.unwrap();

        let unsolicited = AmsHeader::request(conn.source(), conn.target(), CommandId::Read, 77);
        device.send(Frame::new(unsolicited, bytes::Bytes::new())).await.unwrap();

        let state = ReadStateResponse {
            ads_state: 6,
            device_state: 1,
        };
        device
            .send(Frame::new(
                request.header.response_to(0),
                encode_read_state_response(0, state),
            ))
            .await
            .unwrap();

        assert!(waiter.wait().await.is_ok());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn unsupported_command_is_rejected_before_send() {
        let (listener, config) = peer().await;
        let (conn, _device) = tokio::join!(Connection::open(config), accept(&listener));
        let conn = conn.unwrap();

        let err = conn
            .request(CommandId::AddNotification, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Frame(FrameError::UnsupportedCommand(CommandId::AddNotification))
        ));
        assert_eq!(conn.pending(), 0);
    }

    #[tokio::test]
    async fn timeout_leaves_connection_usable() {
        let (listener, config) = peer().await;
        let config = config.with_request_timeout(Duration::from_millis(50));
        let (conn, mut device) = tokio::join!(Connection::open(config), accept(&listener));
        let conn = conn.unwrap();

        let err = conn
            .call(CommandId::ReadState, encode_read_state_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.pending(), 0);

        // The device answers late; the response is dropped without harm.
        let stale = device.next().await.unwrap().unwrap();
        device
            .send(Frame::new(stale.header.response_to(0), bytes::Bytes::new()))
            .await
            .unwrap();
        assert!(conn
            .request(CommandId::ReadState, encode_read_state_request())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn stalled_write_fails_connection_within_timeout() {
        let (listener, config) = peer().await;
        let timeout = Duration::from_millis(200);
        let config = config.with_request_timeout(timeout);
        // The device accepts but never reads, so socket buffers fill up.
        let (conn, _device) = tokio::join!(Connection::open(config), listener.accept());
        let conn = conn.unwrap();
        let blob = Bytes::from(vec![0xA5u8; 900 * 1024]);

        let mut lost = None;
        for _ in 0..256 {
            let started = Instant::now();
            let sent = tokio::time::timeout(
                Duration::from_secs(3),
                conn.request(CommandId::Write, blob.clone()),
            )
            .await
            .expect("request blocked past its timeout");
            assert!(started.elapsed() < timeout + Duration::from_secs(1));
            if let Err(err) = sent {
                lost = Some(err);
                break;
            }
        }

        let err = lost.expect("writes never stalled");
        assert!(
            matches!(err, ClientError::ConnectionLost(ref r) if r == "write timed out"),
            "{err}"
        );
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.pending(), 0);

        let err = conn
            .request(CommandId::ReadState, encode_read_state_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        tokio::time::timeout(Duration::from_secs(3), conn.disconnect())
            .await
            .expect("disconnect blocked");
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_fails_pending() {
        let (listener, config) = peer().await;
        let (conn, _device) = tokio::join!(Connection::open(config), accept(&listener));
        let conn = conn.unwrap();
        let mut states = conn.subscribe();

        let waiter = conn
            .request(CommandId::ReadState, encode_read_state_request())
            .await
            .unwrap();

        conn.disconnect().await;
        conn.disconnect().await;

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionLost(ref r) if r == "disconnected by client"));

        let err = conn
            .request(CommandId::ReadState, encode_read_state_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn peer_close_drops_to_disconnected() {
        let (listener, config) = peer().await;
        let (conn, device) = tokio::join!(Connection::open(config), accept(&listener));
        let conn = conn.unwrap();
        let mut states = conn.subscribe();

        drop(device);
        while *states.borrow_and_update() != ConnectionState::Disconnected {
            states.changed().await.unwrap();
        }
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
