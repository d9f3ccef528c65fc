//! The shared seed: record model, run-lock rules, persistence

pub mod record;
pub mod run_lock;
pub mod store;

pub use record::{HistoryPage, SeedRecord};
pub use store::SeedStore;
