pub mod event;
pub mod stats;
pub mod subscription;
