//! blobfs core - Foundation types for the blob-storage filesystem adapter
//!
//! Provides error handling, configuration, file attribute records,
//! path prefixing and tracing setup shared by the adapter and its
//! storage clients.

pub mod config;
pub mod error;
pub mod prefix;
pub mod telemetry;
pub mod types;

pub use config::{AdapterConfig, RetryConfig};
pub use error::{Error, Result};
pub use prefix::PathPrefixer;
pub use types::*;
