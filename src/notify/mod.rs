// src/notify/mod.rs
pub mod publisher;

pub use publisher::{Publisher, PublisherCfg, XPublisher};
