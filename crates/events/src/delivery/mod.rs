//! External delivery transports.

pub mod webhook;
