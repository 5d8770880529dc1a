//! Typed façade over a [`Connection`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use amslink_frame::{
    decode_read_response, decode_read_state_response, decode_write_response,
    encode_read_state_request, encode_symbolic_read_request, encode_symbolic_write_request,
    CommandId, SymbolName,
};
use bytes::Bytes;
use futures_util::future::join_all;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, Result};
use crate::state::{ConnectionState, DeviceStatus};
use crate::value::{PlcValue, ValueKind};

/// ADS client for one PLC.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and any number
/// of tasks may issue requests concurrently over the one connection.
///
/// ```no_run
/// # async fn demo() -> amslink_client::Result<()> {
/// use amslink_client::{Client, ClientConfig};
///
/// let client = Client::new(ClientConfig::default());
/// client.connect().await?;
/// let status = client.read_state().await?;
/// println!("PLC is {}", status.ads_state);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    connection: RwLock<Option<Arc<Connection>>>,
    connecting: AtomicBool,
    connect_lock: tokio::sync::Mutex<()>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
            connecting: AtomicBool::new(false),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect, or do nothing if already connected.
    ///
    /// A connection that was lost is replaced by a fresh one.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        if let Some(conn) = self.current() {
            if conn.state() == ConnectionState::Connected {
                return Ok(());
            }
        }

        self.connecting.store(true, Ordering::SeqCst);
        let opened = Connection::open(self.config.clone()).await;
        self.connecting.store(false, Ordering::SeqCst);
        let conn = Arc::new(opened?);

        let previous = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(conn);
        if let Some(previous) = previous {
            previous.disconnect().await;
        }
        Ok(())
    }

    /// Close the connection. Outstanding requests fail with `ConnectionLost`.
    pub async fn disconnect(&self) {
        let conn = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(conn) = conn {
            conn.disconnect().await;
            info!(target_addr = %self.config.endpoint.address, "disconnected");
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.connecting.load(Ordering::SeqCst) {
            return ConnectionState::Connecting;
        }
        self.current()
            .map(|conn| conn.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Current connection, if one was opened and not yet replaced.
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.current()
    }

    /// Read the controller's ADS state and device state.
    pub async fn read_state(&self) -> Result<DeviceStatus> {
        let conn = self.active()?;
        let frame = conn
            .call(CommandId::ReadState, encode_read_state_request())
            .await?;
        let status = DeviceStatus::from(decode_read_state_response(&frame)?);
        debug!(ads_state = %status.ads_state, device_state = status.device_state, "read state");
        Ok(status)
    }

    /// Read a variable by name. Returns the raw value bytes.
    pub async fn read_by_name(&self, name: &str) -> Result<Bytes> {
        let name = SymbolName::new(name)?;
        let conn = self.active()?;
        let frame = conn
            .call(CommandId::Read, encode_symbolic_read_request(&name))
            .await?;
        let data = decode_read_response(&frame)?;
        debug!(symbol = %name, length = data.len(), "read by name");
        Ok(data)
    }

    /// Read a variable by name and interpret it as `kind`.
    pub async fn read_value(&self, name: &str, kind: ValueKind) -> Result<PlcValue> {
        let data = self.read_by_name(name).await?;
        kind.decode(&data)
    }

    /// Read several variables concurrently over the one connection.
    ///
    /// Results come back in input order; each name succeeds or fails on its
    /// own.
    pub async fn read_many<S: AsRef<str>>(&self, names: &[S]) -> Vec<(String, Result<Bytes>)> {
        join_all(names.iter().map(|name| async move {
            let name = name.as_ref();
            (name.to_string(), self.read_by_name(name).await)
        }))
        .await
    }

    /// Write a typed value to a variable by name.
    pub async fn write_by_name(&self, name: &str, value: &PlcValue) -> Result<()> {
        let bytes = value.encode()?;
        self.write_raw(name, &bytes).await
    }

    /// Write raw bytes to a variable by name.
    pub async fn write_raw(&self, name: &str, value: &[u8]) -> Result<()> {
        let name = SymbolName::new(name)?;
        let conn = self.active()?;
        let frame = conn
            .call(CommandId::Write, encode_symbolic_write_request(&name, value))
            .await?;
        decode_write_response(&frame)?;
        debug!(symbol = %name, length = value.len(), "write by name");
        Ok(())
    }

    fn current(&self) -> Option<Arc<Connection>> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn active(&self) -> Result<Arc<Connection>> {
        match self.current() {
            Some(conn) if conn.state() == ConnectionState::Connected => Ok(conn),
            _ => Err(ClientError::NotConnected),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("target", &self.config.endpoint.address)
            .field("router", &self.config.endpoint.socket_target())
            .field("state", &self.state())
            .finish()
    }
}
