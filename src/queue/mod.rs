//! Serialized generation job pipeline

pub mod generation_queue;

pub use generation_queue::{GenerationQueue, JobHandle, QueueConfig, QueueTelemetry};
