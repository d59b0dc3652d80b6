//! Filesystem contract implemented by storage adapters

use async_trait::async_trait;
use blobfs_core::{FileAttributes, Result, StorageAttributes, Visibility, WriteConfig, WriteResult};
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::ByteStream;

/// Lazy stream of listing entries
pub type AttributeStream<'a> = BoxStream<'a, Result<StorageAttributes>>;

/// Async filesystem operations over logical paths
///
/// Paths are relative to the adapter's root; leading separators are
/// ignored.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    /// Check if a file exists
    ///
    /// # Returns
    /// `true` if present, `false` if the store reports it missing
    ///
    /// # Errors
    /// Any failure other than "not found"
    async fn file_exists(&self, path: &str) -> Result<bool>;

    /// Create or overwrite a file
    async fn write(&self, path: &str, contents: Bytes, config: &WriteConfig) -> Result<WriteResult>;

    /// Create or overwrite a file from a stream
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        config: &WriteConfig,
    ) -> Result<WriteResult>;

    /// Read a whole file
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Open a file for streaming reads
    async fn read_stream(&self, path: &str) -> Result<ByteStream>;

    /// Delete a file
    async fn delete(&self, path: &str) -> Result<()>;

    /// Delete every file under a directory
    async fn delete_directory(&self, path: &str) -> Result<()>;

    /// Create a directory
    async fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<()>;

    /// Change a file's visibility
    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()>;

    /// Read a file's visibility
    async fn visibility(&self, path: &str) -> Result<FileAttributes>;

    /// Read a file's content type
    async fn mime_type(&self, path: &str) -> Result<FileAttributes>;

    /// Read a file's modification time
    async fn last_modified(&self, path: &str) -> Result<FileAttributes>;

    /// Read a file's size
    async fn file_size(&self, path: &str) -> Result<FileAttributes>;

    /// List the entries under a directory, recursing when `deep` is set
    ///
    /// Nothing is fetched until the stream is polled.
    fn list_contents<'a>(&'a self, path: &str, deep: bool) -> AttributeStream<'a>;

    /// Move a file
    async fn move_file(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()>;

    /// Copy a file
    async fn copy(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()>;
}
