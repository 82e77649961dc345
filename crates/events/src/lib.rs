//! Veris event fan-out infrastructure.
//!
//! This crate provides the moving parts between the event store and its
//! consumers:
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, feeding realtime connections.
//! - [`Dispatcher`]: runs one dispatch pass per event, with bounded
//!   fan-out to matching callback subscriptions, outcome recording
//!   under optimistic version checks, and bus publication.
//! - [`delivery`]: the webhook HTTP transport.
//! - [`Sweeper`]: periodic background task that re-drives unprocessed
//!   events, retries due deliveries, and purges expired rows.

pub mod bus;
pub mod delivery;
pub mod dispatcher;
pub mod sweeper;

pub use bus::EventBus;
pub use delivery::webhook::{DeliveryError, WebhookDelivery};
pub use dispatcher::Dispatcher;
pub use sweeper::Sweeper;
