//! Entity models and DTOs.

pub mod event;
pub mod subscription;
