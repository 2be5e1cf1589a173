//! Shared wire types for the Line Provider event service.
//!
//! Everything a consumer of the service needs lives here: the event DTOs
//! used by the HTTP API and the [`StatusChangeNotification`] payload that
//! is published to the broker whenever an event's outcome changes.
//!
//! [`StatusChangeNotification`]: objects::StatusChangeNotification

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
