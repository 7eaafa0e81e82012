//! Connection target settings.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{Result, SettingsError};

/// Address of the Gremlin Server WebSocket endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Server host name or IP.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Endpoint path.
    pub path: String,
    /// Use `wss://` instead of `ws://`.
    pub ssl: bool,
    /// Capacity of the channel carrying connection events to the driver.
    pub event_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8182,
            path: "/gremlin".to_string(),
            ssl: false,
            event_buffer: 64,
        }
    }
}

impl ConnectionSettings {
    /// Target URL: `ws(s)://host:port/path`.
    ///
    /// The path is joined with exactly one `/` whether or not it was
    /// configured with a leading slash.
    pub fn url(&self) -> Result<Url> {
        let scheme = if self.ssl { "wss" } else { "ws" };
        let path = self.path.trim_start_matches('/');
        let raw = format!("{scheme}://{}:{}/{path}", self.host, self.port);
        Url::parse(&raw).map_err(|e| SettingsError::InvalidValue(format!("{raw}: {e}")))
    }
}
