//! Veris event hub API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! WebSocket and realtime infrastructure) so integration tests and the
//! binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod realtime;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
