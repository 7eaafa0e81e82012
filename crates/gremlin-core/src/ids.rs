//! Request identifiers.
//!
//! Every query submitted to Gremlin Server carries a `requestId`, and every
//! response frame echoes it back. [`RequestId`] is a newtype over `String`
//! so a request ID can't be confused with a script or a processor name.
//!
//! Generated IDs are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`];
//! Gremlin Server accepts any UUID for `requestId`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-assigned token correlating one submitted query with its responses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh time-ordered UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// The ID as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the owned string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for RequestId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for RequestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_uuid_v7() {
        let id = RequestId::new();
        let uuid = Uuid::parse_str(&id).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn from_str_ref() {
        let id = RequestId::from("q-1");
        assert_eq!(id.as_str(), "q-1");
        assert_eq!(id.to_string(), "q-1");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = RequestId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn camel_case_envelope_field() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Envelope {
            request_id: RequestId,
        }

        let env: Envelope = serde_json::from_str(r#"{"requestId":"r-9"}"#).unwrap();
        assert_eq!(env.request_id, RequestId::from("r-9"));
    }

    #[test]
    fn map_lookup_by_str() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        let _ = map.insert(RequestId::from("k"), 1);
        assert_eq!(map.get("k"), Some(&1));
    }

    #[test]
    fn converts_back_to_string() {
        let owned: String = RequestId::from("q-2").into();
        assert_eq!(owned, "q-2");
        assert_eq!(RequestId::from(owned).into_inner(), "q-2");
    }
}
