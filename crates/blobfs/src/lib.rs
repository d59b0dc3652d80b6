//! blobfs - A filesystem adapter over blob storage
//!
//! Maps filesystem-style operations onto a blob-storage client with:
//! - Path-prefix namespacing inside a single container
//! - Normalized file attribute records
//! - Lazy, paginated directory listings
//! - Bounded retry of transient failures
//!
//! Backends:
//! - In-memory (always available)
//! - Local filesystem (default feature)
//! - Amazon S3 / S3-compatible storage (with `s3` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use blobfs::{BlobPathAdapter, FilesystemAdapter, MemoryBlobClient};
//! use blobfs_core::{AdapterConfig, WriteConfig};
//! use bytes::Bytes;
//!
//! # async fn example() -> blobfs_core::Result<()> {
//! let client = Arc::new(MemoryBlobClient::new());
//! let adapter = BlobPathAdapter::new(client, AdapterConfig::new("docs").with_prefix("team/"))?;
//! adapter.write("report.pdf", Bytes::from_static(b"%PDF-1.7"), &WriteConfig::new()).await?;
//! let size = adapter.file_size("report.pdf").await?.file_size;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod client;
mod filesystem;
mod memory;
mod mime;
mod retry;

#[cfg(feature = "local")]
mod local;

#[cfg(feature = "s3")]
mod s3;

pub use adapter::BlobPathAdapter;
pub use client::{
    byte_stream, collect_bytes, Blob, BlobClient, BlobItem, BlobProperties, ByteStream, ListPage,
    ListRequest,
};
pub use filesystem::{AttributeStream, FilesystemAdapter};
pub use memory::MemoryBlobClient;
pub use mime::{ContentSniffer, MimeTypeDetector};
pub use retry::with_retry;

#[cfg(feature = "local")]
pub use local::LocalBlobClient;

#[cfg(feature = "s3")]
pub use s3::{S3BlobClient, S3Config};
