//! Biometric terminal adapters.
//!
//! A terminal is driven through the [`Device`] capability: connect, stop
//! accepting punches, read the whole attendance log, accept punches again and
//! disconnect. [`pull`] runs that sequence with a timeout on every step and
//! always hands the terminal back to its users, whatever fails in between.
//!
//! Two adapters are provided:
//! - [`HttpDevice`]: a terminal exposed through a JSON bridge over HTTP
//! - [`ExportFileDevice`]: an `attlog` dump copied off the terminal

mod export;
mod http;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use att_core::DevicePunch;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use export::{ExportFileDevice, parse_attlog};
pub use http::HttpDevice;

/// Timestamp layout terminals use for wall-clock times.
const DEVICE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A step of the pull sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Disable,
    Fetch,
    Enable,
    Disconnect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Disable => "disable",
            Self::Fetch => "fetch",
            Self::Enable => "enable",
            Self::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

/// Terminal errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A terminal step did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The bridge answered with an error status.
    #[error("{operation} rejected with status {status}: {body}")]
    Status {
        operation: Operation,
        status: u16,
        body: String,
    },
    /// The device URL could not be used.
    #[error("invalid device url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Failed to read an export file.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The terminal returned data that could not be parsed.
    #[error("invalid attendance record at line {line}: {message}")]
    InvalidRecord { line: usize, message: String },
    /// The adapter was used before [`Device::connect`].
    #[error("device is not connected")]
    NotConnected,
}

/// The capability of reading punches off a terminal.
#[allow(async_fn_in_trait)]
pub trait Device {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), DeviceError>;

    /// Stops the terminal from accepting punches while it is read.
    async fn disable(&mut self) -> Result<(), DeviceError>;

    /// Reads the full attendance log.
    async fn fetch_all(&mut self) -> Result<Vec<DevicePunch>, DeviceError>;

    async fn enable(&mut self) -> Result<(), DeviceError>;

    async fn disconnect(&mut self) -> Result<(), DeviceError>;
}

async fn step<T>(
    operation: Operation,
    limit: Duration,
    future: impl Future<Output = Result<T, DeviceError>>,
) -> Result<T, DeviceError> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| DeviceError::Timeout {
            operation,
            after: limit,
        })?
}

/// Reads every punch from `device`.
///
/// Once connected, the terminal is re-enabled and disconnected on every exit
/// path, including failures and timeouts of earlier steps. Each step is
/// bounded by `limit`.
pub async fn pull<D: Device>(device: &mut D, limit: Duration) -> Result<Vec<DevicePunch>, DeviceError> {
    connect(device, limit).await?;

    let fetched = read_disabled(device, limit).await;
    let disconnected = step(Operation::Disconnect, limit, device.disconnect()).await;

    if let Err(err) = disconnected {
        tracing::warn!(device = device.name(), error = %err, "failed to disconnect from terminal");
    }
    let punches = fetched?;
    tracing::info!(device = device.name(), punches = punches.len(), "pulled attendance log");
    Ok(punches)
}

/// Checks that `device` accepts a connection, then disconnects.
pub async fn probe<D: Device>(device: &mut D, limit: Duration) -> Result<(), DeviceError> {
    connect(device, limit).await?;
    step(Operation::Disconnect, limit, device.disconnect()).await
}

/// Connects to `device`. A connect that times out may have left a session
/// half open on the terminal, so a disconnect is attempted before returning.
async fn connect<D: Device>(device: &mut D, limit: Duration) -> Result<(), DeviceError> {
    let err = match step(Operation::Connect, limit, device.connect()).await {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if matches!(err, DeviceError::Timeout { .. }) {
        if let Err(disconnect_err) = step(Operation::Disconnect, limit, device.disconnect()).await {
            tracing::warn!(device = device.name(), error = %disconnect_err, "failed to disconnect after connect timeout");
        }
    }
    Err(err)
}

async fn read_disabled<D: Device>(
    device: &mut D,
    limit: Duration,
) -> Result<Vec<DevicePunch>, DeviceError> {
    // A failed or timed out disable may still have taken effect on the
    // terminal, so enable runs regardless.
    let disabled = step(Operation::Disable, limit, device.disable()).await;
    let fetched = match disabled {
        Ok(()) => Some(step(Operation::Fetch, limit, device.fetch_all()).await),
        Err(_) => None,
    };
    let enabled = step(Operation::Enable, limit, device.enable()).await;
    if let Err(err) = &enabled {
        tracing::warn!(device = device.name(), error = %err, "terminal could not be re-enabled");
    }
    disabled?;
    let punches = fetched.transpose()?.unwrap_or_default();
    enabled?;
    Ok(punches)
}

/// Parses a terminal wall-clock timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` and the ISO 8601 `T` separator.
pub fn parse_device_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, DEVICE_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Either adapter, selected by configuration.
#[derive(Debug)]
pub enum AnyDevice {
    Http(HttpDevice),
    ExportFile(ExportFileDevice),
}

impl Device for AnyDevice {
    fn name(&self) -> &str {
        match self {
            Self::Http(device) => device.name(),
            Self::ExportFile(device) => device.name(),
        }
    }

    async fn connect(&mut self) -> Result<(), DeviceError> {
        match self {
            Self::Http(device) => device.connect().await,
            Self::ExportFile(device) => device.connect().await,
        }
    }

    async fn disable(&mut self) -> Result<(), DeviceError> {
        match self {
            Self::Http(device) => device.disable().await,
            Self::ExportFile(device) => device.disable().await,
        }
    }

    async fn fetch_all(&mut self) -> Result<Vec<DevicePunch>, DeviceError> {
        match self {
            Self::Http(device) => device.fetch_all().await,
            Self::ExportFile(device) => device.fetch_all().await,
        }
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        match self {
            Self::Http(device) => device.enable().await,
            Self::ExportFile(device) => device.enable().await,
        }
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        match self {
            Self::Http(device) => device.disconnect().await,
            Self::ExportFile(device) => device.disconnect().await,
        }
    }
}
