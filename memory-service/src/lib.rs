//! HTTP surface (C1 external boundary, spec §6) for the long-term memory
//! service: request/response shapes, the four endpoint handlers, and a
//! hand-rolled HTTP/1.1 listener that wires them to a [`memory_core::graph::GraphStore`].

pub mod clients;
pub mod handlers;
pub mod http;

pub use http::{AppState, Server};
