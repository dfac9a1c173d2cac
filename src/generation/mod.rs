pub mod client;
pub mod coerce;
pub mod payload;

pub use client::{ForwardError, StabilityClient, UpstreamConfig, UpstreamResult};
pub use payload::{normalize, NormalizedPayload, TargetModel};
