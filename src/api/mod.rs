//! HTTP API surface

pub mod handlers;
pub mod routes;
