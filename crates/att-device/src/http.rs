//! Terminals reached through a JSON bridge.
//!
//! The bridge exposes:
//! - `GET  /status` - reachability check
//! - `POST /disable` / `POST /enable` - stop and resume accepting punches
//! - `GET  /attendance` - the full log as a JSON array of
//!   `{"user_id": "15", "timestamp": "2025-03-03 08:59:12", "status": 1, "punch": 0}`

use std::fmt;
use std::time::Duration;

use att_core::{DevicePunch, DeviceUserId};
use serde::Deserialize;

use crate::{Device, DeviceError, Operation, parse_device_timestamp};

/// A terminal behind an HTTP bridge.
pub struct HttpDevice {
    name: String,
    base_url: String,
    http: reqwest::Client,
    connected: bool,
}

impl fmt::Debug for HttpDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDevice")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl HttpDevice {
    /// Creates an adapter for the bridge at `base_url`.
    ///
    /// `timeout` bounds every HTTP request.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(DeviceError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http:// or https:// url".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeviceError::ClientBuild)?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.to_string(),
            http,
            connected: false,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn send(
        &self,
        operation: Operation,
        request: reqwest::RequestBuilder,
    ) -> Result<String, DeviceError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DeviceError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    const fn ensure_connected(&self) -> Result<(), DeviceError> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::NotConnected)
        }
    }
}

impl Device for HttpDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), DeviceError> {
        let request = self.http.get(self.url("status"));
        self.send(Operation::Connect, request).await?;
        self.connected = true;
        tracing::debug!(device = %self.name, url = %self.base_url, "connected to terminal bridge");
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), DeviceError> {
        self.ensure_connected()?;
        let request = self.http.post(self.url("disable"));
        self.send(Operation::Disable, request).await?;
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<Vec<DevicePunch>, DeviceError> {
        self.ensure_connected()?;
        let request = self.http.get(self.url("attendance"));
        let body = self.send(Operation::Fetch, request).await?;
        parse_attendance(&body)
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        self.ensure_connected()?;
        let request = self.http.post(self.url("enable"));
        self.send(Operation::Enable, request).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.connected = false;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireUserId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    user_id: WireUserId,
    timestamp: String,
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    punch: Option<i64>,
}

fn parse_attendance(body: &str) -> Result<Vec<DevicePunch>, DeviceError> {
    let records: Vec<WireRecord> =
        serde_json::from_str(body).map_err(|err| DeviceError::InvalidRecord {
            line: err.line(),
            message: err.to_string(),
        })?;

    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let invalid = |message: String| DeviceError::InvalidRecord {
                line: idx + 1,
                message,
            };
            let user_id = match record.user_id {
                WireUserId::Text(text) => text,
                WireUserId::Number(number) => number.to_string(),
            };
            let user_id = DeviceUserId::new(user_id).map_err(|err| invalid(err.to_string()))?;
            let timestamp = parse_device_timestamp(&record.timestamp)
                .ok_or_else(|| invalid(format!("invalid timestamp: {}", record.timestamp)))?;
            Ok(DevicePunch {
                user_id,
                timestamp,
                status: record.status,
                punch: record.punch,
            })
        })
        .collect()
}
