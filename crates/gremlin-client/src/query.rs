//! The query contract and a ready-made script query.
//!
//! Anything the dispatcher can send implements [`Query`]: it has an ID,
//! produces its own wire payload, and receives [`QueryEvent`]s as frames
//! for that ID arrive.

use bytes::Bytes;
use gremlin_core::RequestId;
use gremlin_settings::RequestSettings;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{QueryError, Result};
use crate::frame::{QueryResponse, encode_request};

/// What a query's callback receives.
///
/// A query sees zero or more `Data` events followed by exactly one `End`
/// or `Error`.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryEvent {
    /// A partial (206) or final (200) result frame.
    Data(QueryResponse),
    /// No more results will arrive.
    End,
    /// The request failed; no more events will arrive.
    Error(QueryError),
}

impl QueryEvent {
    /// Whether this event ends the query's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error(_))
    }
}

/// A request the dispatcher can transmit and route responses to.
pub trait Query: Send {
    /// Identifier echoed back by the server in every response frame.
    fn id(&self) -> &RequestId;

    /// Wire-ready binary frame for this request.
    fn binary_format(&self) -> Result<Bytes>;

    /// Called by the dispatcher for each event belonging to this request.
    fn on_event(&mut self, event: QueryEvent);
}

type EventSink = Box<dyn FnMut(QueryEvent) + Send>;

/// A script evaluated by the server's op processor.
pub struct ScriptQuery {
    id: RequestId,
    script: String,
    bindings: Map<String, Value>,
    request: RequestSettings,
    sink: Option<EventSink>,
}

impl ScriptQuery {
    /// New query with a fresh ID and default request settings.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            script: script.into(),
            bindings: Map::new(),
            request: RequestSettings::default(),
            sink: None,
        }
    }

    /// Use a caller-chosen request ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = id.into();
        self
    }

    /// Bind a script variable.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.bindings.insert(name.into(), value.into());
        self
    }

    /// Replace the processor / op / mime / language fields.
    #[must_use]
    pub fn with_request_settings(mut self, request: RequestSettings) -> Self {
        self.request = request;
        self
    }

    /// Register the callback that receives this query's events.
    #[must_use]
    pub fn on_result<F>(mut self, sink: F) -> Self
    where
        F: FnMut(QueryEvent) + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// The script text.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// JSON request message (before framing).
    pub fn request_body(&self) -> Value {
        let mut args = json!({
            "gremlin": self.script,
            "bindings": self.bindings,
            "language": self.request.language,
            "accept": self.request.accept,
        });
        if !self.request.aliases.is_empty() {
            args["aliases"] = json!(self.request.aliases);
        }
        json!({
            "requestId": self.id,
            "op": self.request.op,
            "processor": self.request.processor,
            "args": args,
        })
    }
}

impl std::fmt::Debug for ScriptQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptQuery")
            .field("id", &self.id)
            .field("script", &self.script)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl Query for ScriptQuery {
    fn id(&self) -> &RequestId {
        &self.id
    }

    fn binary_format(&self) -> Result<Bytes> {
        encode_request(&self.request.accept, &self.request_body())
    }

    fn on_event(&mut self, event: QueryEvent) {
        match self.sink.as_mut() {
            Some(sink) => sink(event),
            None => debug!(request_id = %self.id, "no result callback registered, dropping event"),
        }
    }
}
