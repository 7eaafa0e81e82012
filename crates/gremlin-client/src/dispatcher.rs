//! Request queueing and response correlation.
//!
//! The dispatcher owns the [`Transport`], a FIFO of queries submitted while
//! the connection wasn't open, and the map of in-flight queries keyed by
//! request ID. Every mutation happens through `&mut self`, driven by one
//! event-processing task, so none of it is locked.
//!
//! Per-request lifecycle:
//!
//! ```text
//! sent ─▶ 206* ─▶ 200 | 204 | error ─▶ removed
//! ```
//!
//! 407 keeps the request in flight: it is answered with a SASL response
//! when credentials are configured, and left stalled otherwise. A second
//! 407 after an answered one fails the request.
//!
//! Transport errors don't belong to any request. The most recent one is kept
//! as [`Dispatcher::last_error`] until the next successful open.

use std::collections::{HashMap, VecDeque};

use gremlin_core::RequestId;
use gremlin_settings::{AuthSettings, RequestSettings};
use tracing::{debug, error, info, warn};

use crate::auth;
use crate::connection::{ConnectionEvent, ConnectionEventKind, ConnectionState, Transport};
use crate::error::{GremlinError, QueryError, Result};
use crate::frame::{QueryResponse, StatusCode, decode_response, encode_request};
use crate::query::{Query, QueryEvent};

/// What `submit_query` did with a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Held until the connection opens.
    Queued,
    /// Transmitted and registered as in flight.
    Sent,
}

/// How one inbound frame was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// 200: result delivered, then end-of-stream; request removed.
    Success,
    /// 204: end-of-stream delivered; request removed.
    NoContent,
    /// 206: partial result delivered; request still in flight.
    Partial,
    /// 407: request still in flight.
    AuthChallenge {
        /// Whether a SASL response was sent back.
        answered: bool,
    },
    /// Error status delivered to the request's callback; request removed.
    ServerError {
        /// The status code.
        code: i64,
    },
    /// Well-formed frame for an unknown or finished request; dropped.
    Orphaned,
    /// Undecodable frame; dropped.
    Malformed,
}

/// A query the transport refused, handed back with the reason.
struct Rejected {
    error: GremlinError,
    query: Box<dyn Query>,
}

/// A transmitted query awaiting its terminal response.
struct InFlight {
    query: Box<dyn Query>,
    challenge_answered: bool,
}

/// Connection owner and response router.
pub struct Dispatcher<T> {
    transport: T,
    queue: VecDeque<Box<dyn Query>>,
    in_flight: HashMap<RequestId, InFlight>,
    request: RequestSettings,
    auth: Option<AuthSettings>,
    last_error: Option<String>,
}

impl<T: Transport> Dispatcher<T> {
    /// Wrap a transport.
    ///
    /// `request.processor` and `request.accept` are used to frame SASL
    /// challenge responses; `auth` enables answering them.
    pub fn new(transport: T, request: RequestSettings, auth: Option<AuthSettings>) -> Self {
        Self {
            transport,
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
            request,
            auth,
            last_error: None,
        }
    }

    /// Read-only view of the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Connection lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Whether the connection is open.
    pub fn is_open(&self) -> bool {
        self.transport.state().is_open()
    }

    /// Whether the connection handshake is in progress.
    pub fn is_connecting(&self) -> bool {
        self.transport.state() == ConnectionState::Connecting
    }

    /// Number of queries waiting for the connection to open.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of transmitted queries awaiting a terminal response.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `id` is awaiting a terminal response.
    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Most recent transport error, cleared when a connection opens.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start connecting (no-op while open or connecting).
    pub fn open(&mut self) {
        self.transport.open();
    }

    /// Close the connection.
    ///
    /// Every in-flight query receives [`QueryError::ConnectionClosed`].
    /// Queued queries stay queued for the next `open()`.
    pub fn close(&mut self) {
        self.transport.close();
        self.abandon_in_flight();
    }

    /// Send `query` now if the connection is open, otherwise queue it.
    ///
    /// Payload and transport failures are returned and leave nothing
    /// registered. A query whose ID is already in flight is rejected.
    pub fn submit_query(&mut self, query: Box<dyn Query>) -> Result<SubmitOutcome> {
        if !self.is_open() {
            debug!(request_id = %query.id(), queued = self.queue.len() + 1, "connection not open, queueing request");
            self.queue.push_back(query);
            return Ok(SubmitOutcome::Queued);
        }
        self.transmit(query)
            .map(|()| SubmitOutcome::Sent)
            .map_err(|rejected| rejected.error)
    }

    fn transmit(&mut self, query: Box<dyn Query>) -> std::result::Result<(), Rejected> {
        let id = query.id().clone();
        if self.in_flight.contains_key(&id) {
            return Err(Rejected {
                error: GremlinError::DuplicateRequestId(id),
                query,
            });
        }
        let payload = match query.binary_format() {
            Ok(payload) => payload,
            Err(error) => return Err(Rejected { error, query }),
        };
        let bytes = payload.len();
        if let Err(error) = self.transport.send(payload) {
            return Err(Rejected { error, query });
        }
        debug!(request_id = %id, bytes, "request sent");
        let _ = self.in_flight.insert(
            id,
            InFlight {
                query,
                challenge_answered: false,
            },
        );
        Ok(())
    }

    /// Send queued queries in submission order while the connection is open.
    ///
    /// If the connection stops accepting frames mid-drain, the unsent
    /// remainder stays at the head of the queue. A query that can't be sent
    /// for its own reasons (payload error, duplicate ID) gets an `Error`
    /// event and the drain continues. Returns the number sent.
    pub fn flush_queue(&mut self) -> usize {
        let mut sent = 0;
        while self.is_open() {
            let Some(query) = self.queue.pop_front() else {
                break;
            };
            match self.transmit(query) {
                Ok(()) => sent += 1,
                Err(Rejected {
                    error: error @ (GremlinError::NotConnected | GremlinError::Transport(_)),
                    query,
                }) => {
                    warn!(request_id = %query.id(), error = %error, "send failed during flush, keeping request queued");
                    self.queue.push_front(query);
                    break;
                }
                Err(Rejected { error, mut query }) => {
                    warn!(request_id = %query.id(), error = %error, "dropping queued request");
                    query.on_event(QueryEvent::Error(error.into()));
                }
            }
        }
        if sent > 0 || !self.queue.is_empty() {
            debug!(sent, remaining = self.queue.len(), "flushed request queue");
        }
        sent
    }

    /// Apply one connection event.
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        if !self.transport.observe(&event) {
            debug!(generation = event.generation, "ignoring event from a replaced connection");
            return;
        }
        match event.kind {
            ConnectionEventKind::Opened => {
                info!(generation = event.generation, queued = self.queue.len(), "connection opened");
                self.last_error = None;
                let _ = self.flush_queue();
            }
            ConnectionEventKind::Message(frame) => {
                let _ = self.on_inbound_frame(&frame);
            }
            ConnectionEventKind::Error(reason) => {
                error!(generation = event.generation, %reason, "transport error");
                self.last_error = Some(reason);
            }
            ConnectionEventKind::Closed => {
                info!(generation = event.generation, in_flight = self.in_flight.len(), "connection closed");
                self.abandon_in_flight();
            }
        }
    }

    /// Decode one inbound frame and route it to its request.
    pub fn on_inbound_frame(&mut self, frame: &[u8]) -> Dispatch {
        let response = match decode_response(frame) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, bytes = frame.len(), "malformed response, dropping frame");
                return Dispatch::Malformed;
            }
        };
        let request_id = response.request_id.clone();
        if !self.in_flight.contains_key(&request_id) {
            warn!(
                %request_id,
                code = response.status_code,
                message = %response.status_message,
                "orphaned response for missing or closed request"
            );
            return Dispatch::Orphaned;
        }

        match response.status() {
            StatusCode::PartialContent => {
                if let Some(entry) = self.in_flight.get_mut(&request_id) {
                    entry.query.on_event(QueryEvent::Data(response));
                }
                Dispatch::Partial
            }
            StatusCode::Authenticate => self.answer_challenge(response),
            status => self.finish(status, response),
        }
    }

    /// Remove a request, then deliver its terminal events.
    fn finish(&mut self, status: StatusCode, response: QueryResponse) -> Dispatch {
        let Some(mut entry) = self.in_flight.remove(&response.request_id) else {
            return Dispatch::Orphaned;
        };
        debug!(request_id = %response.request_id, code = status.code(), "request finished");
        complete(&mut *entry.query, status, response)
    }

    fn answer_challenge(&mut self, response: QueryResponse) -> Dispatch {
        let request_id = response.request_id.clone();
        if self
            .in_flight
            .get(&request_id)
            .is_some_and(|entry| entry.challenge_answered)
        {
            warn!(%request_id, "credentials rejected, challenged again");
            return self.finish(StatusCode::Authenticate, response);
        }
        let Some(credentials) = self.auth.as_ref() else {
            error!(%request_id, "authentication required but no credentials are configured");
            return Dispatch::AuthChallenge { answered: false };
        };
        let body = auth::challenge_response(&request_id, &self.request.processor, credentials);
        let sent = encode_request(&self.request.accept, &body)
            .and_then(|payload| self.transport.send(payload));
        match sent {
            Ok(()) => {
                if let Some(entry) = self.in_flight.get_mut(&request_id) {
                    entry.challenge_answered = true;
                }
                debug!(%request_id, "answered authentication challenge");
                Dispatch::AuthChallenge { answered: true }
            }
            Err(e) => {
                error!(%request_id, error = %e, "failed to answer authentication challenge");
                Dispatch::AuthChallenge { answered: false }
            }
        }
    }

    fn abandon_in_flight(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        warn!(count = self.in_flight.len(), "abandoning in-flight requests");
        for (_, mut entry) in self.in_flight.drain() {
            entry.query.on_event(QueryEvent::Error(QueryError::ConnectionClosed));
        }
    }
}

/// Deliver a terminal response to an already-removed query.
fn complete(query: &mut dyn Query, status: StatusCode, response: QueryResponse) -> Dispatch {
    match status {
        StatusCode::Success => {
            query.on_event(QueryEvent::Data(response));
            query.on_event(QueryEvent::End);
            Dispatch::Success
        }
        StatusCode::NoContent => {
            query.on_event(QueryEvent::End);
            Dispatch::NoContent
        }
        _ => {
            let code = status.code();
            error!(
                request_id = %response.request_id,
                code,
                message = %response.status_message,
                "request failed"
            );
            query.on_event(QueryEvent::Error(QueryError::Server {
                code,
                message: response.status_message,
            }));
            Dispatch::ServerError { code }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
