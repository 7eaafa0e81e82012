//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with the values a stock Gremlin Server expects. Types marked
//! with `#[serde(default)]` allow partial JSON: missing fields get their
//! default value during deserialization.

mod connection;
mod request;

pub use connection::*;
pub use request::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the driver.
///
/// # JSON Format
///
/// ```json
/// {
///   "connection": { "host": "graph.internal", "port": 8182, "ssl": true },
///   "auth": { "user": "stephen", "password": "password" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GremlinSettings {
    /// Where to connect.
    pub connection: ConnectionSettings,
    /// Fields stamped on every script request.
    pub request: RequestSettings,
    /// SASL credentials used to answer authentication challenges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSettings>,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive passed to the tracing subscriber.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
