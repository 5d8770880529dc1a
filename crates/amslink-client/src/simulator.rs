//! In-process ADS device for tests and local development.
//!
//! Speaks the same codec as the client over real TCP. It answers ReadState
//! with a configurable state and serves symbolic reads and writes from an
//! in-memory symbol table. Anything else gets `ServiceNotSupported`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use amslink_frame::{
    decode_symbolic_read_request, decode_symbolic_write_request, encode_read_response,
    encode_read_state_response, encode_write_response, AmsCodec, CommandId, Frame,
    ReadStateResponse,
};
use amslink_transport::{AmsStream, TcpListener};
use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device_error::DeviceError;
use crate::state::{AdsState, DeviceStatus};

/// Variables served by a simulator, by name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Define or replace a variable.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Overwrite an existing variable. Returns false if it is not defined.
    pub fn update(&self, name: &str, value: &[u8]) -> bool {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        match values.get_mut(name) {
            Some(slot) => {
                *slot = value.to_vec();
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A simulated device, bound but not yet serving.
pub struct Simulator {
    listener: TcpListener,
    symbols: SymbolTable,
    status: DeviceStatus,
}

impl Simulator {
    /// Bind the device's TCP listener. Use port 0 for an ephemeral port.
    pub async fn bind(addr: &str) -> amslink_transport::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            symbols: SymbolTable::new(),
            status: DeviceStatus {
                ads_state: AdsState::Run,
                device_state: 0,
            },
        })
    }

    pub fn with_symbol(self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.symbols.insert(name, value);
        self
    }

    pub fn with_state(mut self, ads_state: AdsState, device_state: u16) -> Self {
        self.status = DeviceStatus {
            ads_state,
            device_state,
        };
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Start serving connections on the current tokio runtime.
    pub fn spawn(self) -> SimulatorHandle {
        let addr = self.listener.local_addr();
        let device = Arc::new(Device {
            symbols: self.symbols,
            status: RwLock::new(self.status),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            self.listener,
            Arc::clone(&device),
            cancel.clone(),
        ));
        info!(%addr, symbols = device.symbols.len(), "simulator listening");
        SimulatorHandle {
            addr,
            device,
            cancel,
            task: Some(task),
        }
    }
}

/// A running simulator. Dropping the handle stops it.
pub struct SimulatorHandle {
    addr: SocketAddr,
    device: Arc<Device>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SimulatorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Live symbol table; writes from clients are visible here.
    pub fn symbols(&self) -> &SymbolTable {
        &self.device.symbols
    }

    pub fn set_state(&self, ads_state: AdsState, device_state: u16) {
        *self
            .device
            .status
            .write()
            .unwrap_or_else(PoisonError::into_inner) = DeviceStatus {
            ads_state,
            device_state,
        };
    }

    /// Stop accepting and close every open connection.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(addr = %self.addr, "simulator stopped");
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Device {
    symbols: SymbolTable,
    status: RwLock<DeviceStatus>,
}

impl Device {
    fn status(&self) -> DeviceStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Response for one request frame, or `None` if nothing should be sent.
    fn handle(&self, request: &Frame) -> Option<Frame> {
        let header = &request.header;
        if header.is_response() {
            debug!(invoke_id = header.invoke_id, "simulator ignoring response frame");
            return None;
        }

        let fail = |err: DeviceError| {
            Some(Frame::new(header.response_to(err.code()), bytes::Bytes::new()))
        };
        match header.command {
            CommandId::ReadState => {
                let status = self.status();
                let state = ReadStateResponse {
                    ads_state: status.ads_state.as_u16(),
                    device_state: status.device_state,
                };
                Some(Frame::new(header.response_to(0), encode_read_state_response(0, state)))
            }
            CommandId::Read => {
                let Ok(name) = decode_symbolic_read_request(&request.payload) else {
                    return fail(DeviceError::InvalidParameter);
                };
                match self.symbols.get(name.as_str()) {
                    Some(value) => {
                        debug!(symbol = %name, length = value.len(), "simulator read");
                        match encode_read_response(0, &value) {
                            Ok(payload) => Some(Frame::new(header.response_to(0), payload)),
                            Err(_) => fail(DeviceError::InvalidSize),
                        }
                    }
                    None => fail(DeviceError::SymbolNotFound),
                }
            }
            CommandId::Write => {
                let Ok(write) = decode_symbolic_write_request(&request.payload) else {
                    return fail(DeviceError::InvalidParameter);
                };
                if self.symbols.update(write.name.as_str(), &write.value) {
                    debug!(symbol = %write.name, length = write.value.len(), "simulator write");
                    Some(Frame::new(header.response_to(0), encode_write_response(0)))
                } else {
                    fail(DeviceError::SymbolNotFound)
                }
            }
            CommandId::Notification => None,
            other => {
                debug!(command = %other, "simulator rejecting unsupported command");
                fail(DeviceError::ServiceNotSupported)
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, device: Arc<Device>, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok(stream) => {
                tokio::spawn(serve(stream, Arc::clone(&device), cancel.child_token()));
            }
            Err(err) => warn!(error = %err, "simulator accept failed"),
        }
    }
}

async fn serve(stream: AmsStream, device: Arc<Device>, cancel: CancellationToken) {
    let peer = stream.peer_addr();
    debug!(%peer, "simulator client connected");
    let mut framed = Framed::new(stream.into_inner(), AmsCodec::default());
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = framed.next() => next,
        };
        let request = match next {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(%peer, error = %err, "simulator read failed");
                break;
            }
            None => break,
        };
        if let Some(response) = device.handle(&request) {
            if let Err(err) = framed.send(response).await {
                warn!(%peer, error = %err, "simulator write failed");
                break;
            }
        }
    }
    debug!(%peer, "simulator client disconnected");
}
