//! Configuration management

pub mod settings;

pub use settings::{
    AdmissionConfig, BackendConfig, GenerationConfig, LoggingConfig, ServerConfig, Settings,
    StorageConfig,
};
