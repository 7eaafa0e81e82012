//! # gremlin-client
//!
//! WebSocket driver for Gremlin Server.
//!
//! - [`connection`]: one socket, its lifecycle state, and the I/O task
//! - [`dispatcher`]: outbound queue, in-flight map, status-code routing
//! - [`frame`]: mime-prefixed request framing and response decoding
//! - [`query`]: the [`Query`] contract and [`ScriptQuery`]
//! - [`auth`]: SASL PLAIN challenge responses
//! - [`client`]: [`GremlinClient`], the async handle to a driver task

#![deny(unsafe_code)]

pub mod auth;
pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod query;

pub use client::{DriverStatus, GremlinClient};
pub use connection::{Connection, ConnectionEvent, ConnectionEventKind, ConnectionState, Transport};
pub use dispatcher::{Dispatch, Dispatcher, SubmitOutcome};
pub use error::{GremlinError, QueryError, Result};
pub use frame::{QueryResponse, StatusCode};
pub use gremlin_core::RequestId;
pub use query::{Query, QueryEvent, ScriptQuery};
