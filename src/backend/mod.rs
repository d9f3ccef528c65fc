//! Image generation backend abstraction and strategy

pub mod http_backend;
pub mod strategy;
pub mod traits;

pub use http_backend::HttpBackend;
pub use strategy::{GenerationPath, GenerationStrategy};
pub use traits::{ImageBackend, ImageSize};
