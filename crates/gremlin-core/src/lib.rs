//! # gremlin-core
//!
//! Foundation types shared by the Gremlin driver crates.
//!
//! - **Request IDs**: [`RequestId`], the key that correlates a submitted
//!   query with every response frame the server sends for it
//! - **Logging**: `tracing` subscriber setup and an in-memory capture layer
//!   for asserting on log output in tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::RequestId;
