//! Veris domain layer.
//!
//! Shared types, error definitions, and the pure event-delivery rules used
//! by every other crate in the workspace. This crate has no dependency on
//! the database or the web framework so the delivery state machine and
//! validation logic stay unit-testable in isolation.

pub mod classification;
pub mod delivery;
pub mod error;
pub mod paging;
pub mod types;

pub use error::CoreError;
