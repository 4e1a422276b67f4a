//! Host-facing command surface: newline-delimited JSON requests in, replies and
//! telemetry events out.

pub mod service;
pub mod types;

pub use service::{ControlService, GeneratorFactory};
