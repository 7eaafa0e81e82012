//! Request and authentication settings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fields stamped on every script request sent to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSettings {
    /// Server-side op processor; empty selects the default (sessionless).
    pub processor: String,
    /// Operation name.
    pub op: String,
    /// Mime type the request is framed with and results are requested in.
    pub accept: String,
    /// Script language.
    pub language: String,
    /// Traversal source aliases, e.g. `{"g": "g1"}`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            processor: String::new(),
            op: "eval".to_string(),
            accept: "application/json".to_string(),
            language: "gremlin-groovy".to_string(),
            aliases: BTreeMap::new(),
        }
    }
}

/// SASL PLAIN credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Account name.
    pub user: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
