//! HTTP API handlers.

pub mod events;
