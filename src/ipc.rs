//! IPC infrastructure for daemon communication
//!
//! Provides Unix socket-based IPC for CLI commands to communicate with the daemon.
//! Uses length-prefixed JSON messages for protocol framing.

use color_eyre::eyre::{self, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::pulse::{DeviceDescriptor, Role};

// ============================================================================
// Message Types
// ============================================================================

/// Requests sent from CLI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Query daemon status
    Status,
    /// Get the device lists from the last refresh
    ListDevices,
    /// Make a listed device the preference for its role
    ///
    /// `device` is matched against description, node name, then index.
    Select { role: Role, device: String },
    /// Remove the preference for a role
    Clear { role: Role },
    /// Turn automatic switching on or off
    SetMonitoring { enabled: bool },
    /// Re-enumerate devices without switching
    Refresh,
    /// Gracefully shutdown the daemon
    Shutdown,
}

/// Responses sent from daemon to CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Status information
    Status {
        version: String,
        uptime_secs: u64,
        monitoring: bool,
        preferred_output: Option<String>,
        preferred_source: Option<String>,
        passes: u64,
        switches: u64,
        last_warning: Option<String>,
    },
    /// Current device lists
    Devices {
        outputs: Vec<DeviceDescriptor>,
        sources: Vec<DeviceDescriptor>,
    },
    /// Generic success response
    Ok { message: String },
    /// Error response
    Error { message: String },
}

// ============================================================================
// Socket Path Management
// ============================================================================

/// Get the IPC socket path
///
/// Prefers `$XDG_RUNTIME_DIR/plugsw.sock`, falls back to `/tmp/plugsw-$UID.sock`.
#[must_use]
pub fn get_socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(runtime_dir) if !runtime_dir.is_empty() => {
            PathBuf::from(runtime_dir).join("plugsw.sock")
        }
        _ => PathBuf::from(format!("/tmp/plugsw-{}.sock", users::get_current_uid())),
    }
}

/// Check whether a daemon is accepting connections
pub async fn is_daemon_running() -> bool {
    is_socket_alive(&get_socket_path()).await
}

async fn is_socket_alive(socket_path: &Path) -> bool {
    matches!(
        tokio::time::timeout(Duration::from_millis(100), UnixStream::connect(socket_path)).await,
        Ok(Ok(_))
    )
}

/// Remove the socket file if no daemon answers on it
///
/// # Errors
/// Returns an error if another daemon is live on the socket or the stale file cannot be removed.
pub async fn cleanup_stale_socket(socket_path: &Path) -> Result<()> {
    if !socket_path.exists() {
        return Ok(());
    }

    if is_socket_alive(socket_path).await {
        eyre::bail!("Another plugsw daemon is already running (socket: {socket_path:?})");
    }

    debug!("Removing stale socket: {:?}", socket_path);
    std::fs::remove_file(socket_path)
        .wrap_err_with(|| format!("Failed to remove stale socket: {socket_path:?}"))
}

// ============================================================================
// Protocol Helpers
// ============================================================================

const MAX_MESSAGE_SIZE: usize = 1024 * 1024; // 1MB max message size
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Read a length-prefixed JSON message from a stream
async fn read_message<T, S>(stream: &mut S) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    S: AsyncRead + Unpin,
{
    // Read 4-byte big-endian length prefix
    let mut len_buf = [0u8; 4];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut len_buf))
        .await
        .wrap_err("Timeout reading message length")?
        .wrap_err("Failed to read message length")?;

    let msg_len = u32::from_be_bytes(len_buf) as usize;

    if msg_len > MAX_MESSAGE_SIZE {
        eyre::bail!("Message too large: {} bytes (max: {})", msg_len, MAX_MESSAGE_SIZE);
    }

    let mut msg_buf = vec![0u8; msg_len];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut msg_buf))
        .await
        .wrap_err("Timeout reading message payload")?
        .wrap_err("Failed to read message payload")?;

    serde_json::from_slice(&msg_buf).wrap_err("Failed to deserialize message")
}

/// Write a length-prefixed JSON message to a stream
async fn write_message<T, S>(stream: &mut S, message: &T) -> Result<()>
where
    T: Serialize,
    S: AsyncWrite + Unpin,
{
    let json = serde_json::to_vec(message).wrap_err("Failed to serialize message")?;

    if json.len() > MAX_MESSAGE_SIZE {
        eyre::bail!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE);
    }

    let len = (json.len() as u32).to_be_bytes();
    stream
        .write_all(&len)
        .await
        .wrap_err("Failed to write message length")?;

    stream
        .write_all(&json)
        .await
        .wrap_err("Failed to write message payload")?;

    stream.flush().await.wrap_err("Failed to flush stream")?;

    Ok(())
}

// ============================================================================
// IPC Client (for CLI commands)
// ============================================================================

/// Send a request to the daemon and wait for response
///
/// # Errors
/// Returns an error if the daemon cannot be reached or the exchange fails.
pub async fn send_request(request: Request) -> Result<Response> {
    let socket_path = get_socket_path();

    let mut stream = tokio::time::timeout(Duration::from_secs(5), UnixStream::connect(&socket_path))
        .await
        .wrap_err("Timeout connecting to daemon")?
        .wrap_err_with(|| {
            format!("Failed to connect to daemon. Is the daemon running?\nSocket: {socket_path:?}")
        })?;

    debug!("Connected to daemon at {:?}", socket_path);

    write_message(&mut stream, &request).await?;
    read_message(&mut stream).await
}

// ============================================================================
// IPC Server (for daemon)
// ============================================================================

/// Handle for the IPC server running in the daemon
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Bind at the default socket path
    ///
    /// # Errors
    /// Returns an error if a daemon is already running or the socket cannot be bound.
    pub async fn bind() -> Result<Self> {
        Self::bind_at(get_socket_path()).await
    }

    /// Bind at an explicit socket path
    ///
    /// # Errors
    /// Returns an error if a daemon is already running or the socket cannot be bound.
    pub async fn bind_at(socket_path: PathBuf) -> Result<Self> {
        cleanup_stale_socket(&socket_path).await?;

        let listener = UnixListener::bind(&socket_path)
            .wrap_err_with(|| format!("Failed to bind IPC socket: {socket_path:?}"))?;

        debug!("IPC server listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept the next incoming connection
    /// Returns None if accept fails (non-fatal)
    pub async fn accept(&self) -> Option<UnixStream> {
        match self.listener.accept().await {
            Ok((stream, _addr)) => Some(stream),
            Err(e) => {
                error!("Failed to accept IPC connection: {}", e);
                None
            }
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!("Failed to remove IPC socket on shutdown: {}", e);
        } else {
            debug!("Removed IPC socket: {:?}", self.socket_path);
        }
    }
}

/// Read a request from a client connection
///
/// # Errors
/// Returns an error on timeout, oversize frames, or invalid JSON.
pub async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Request> {
    read_message(stream).await
}

/// Write a response to a client connection
///
/// # Errors
/// Returns an error if the response cannot be serialized or written.
pub async fn write_response<S: AsyncWrite + Unpin>(stream: &mut S, response: &Response) -> Result<()> {
    write_message(stream, response).await
}
