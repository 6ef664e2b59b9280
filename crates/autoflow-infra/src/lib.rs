//! Infrastructure for Autoflow
//!
//! - [`resilience`]: per-call timeout and retry with exponential backoff.
//! - [`memory`]: `InMemoryBackend`, an authoritative in-process
//!   implementation of the backend contract.

pub mod memory;
pub mod resilience;

pub use memory::{
    Delivered, DeliveryChannel, InMemoryBackend, InboundEvent, LogChannel, RecordingChannel,
    RunOutcome,
};
pub use resilience::{
    retry, retry_with, CallPolicy, Idempotency, RetryConfig, RetryPolicy, TimeoutError,
    TimeoutPolicy,
};
