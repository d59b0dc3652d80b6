//! Blob storage client trait definition
//!
//! Defines the async interface the adapter forwards to. Any provider SDK
//! can be plugged in by implementing [`BlobClient`].

use std::collections::HashMap;

use async_trait::async_trait;
use blobfs_core::config::ContainerOptions;
use blobfs_core::{Result, UploadOptions};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, TryStreamExt};
use serde::{Deserialize, Serialize};

/// Live stream of blob content chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Properties returned by metadata, upload and listing calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobProperties {
    /// Content length in bytes
    pub content_length: u64,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    /// Last modification time (Unix seconds)
    pub last_modified: Option<i64>,
    /// User-defined metadata
    pub metadata: HashMap<String, String>,
}

/// A fetched blob: properties plus a live content stream
pub struct Blob {
    pub properties: BlobProperties,
    pub content: ByteStream,
}

impl Blob {
    /// Drain the content stream into one buffer
    pub async fn into_bytes(self) -> Result<Bytes> {
        collect_bytes(self.content).await
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// One blob entry from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    pub properties: BlobProperties,
}

/// Parameters of a single listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only names starting with this string are returned
    pub prefix: String,
    /// Group names sharing a segment up to this delimiter into `prefixes`
    pub delimiter: Option<String>,
    /// Continuation marker from a previous page
    pub marker: Option<String>,
    /// Page size hint
    pub max_results: Option<usize>,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn marker(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }
}

/// One page of listing results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub blobs: Vec<BlobItem>,
    /// Virtual directories, each ending with the delimiter
    pub prefixes: Vec<String>,
    /// Marker for the next page, `None` on the last one
    pub next_marker: Option<String>,
}

/// Async trait for blob storage clients
///
/// Every call is keyed by container name and blob name. Implementations
/// must report a missing blob or container as `Error::NotFound`, an
/// existing container on creation as `Error::ContainerExists`, and
/// network or service failures as `Error::Transient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobClient: Send + Sync {
    /// Create a container
    ///
    /// # Errors
    /// `ContainerExists` if it is already there
    async fn create_container(&self, container: &str, options: &ContainerOptions) -> Result<()>;

    /// Fetch a blob's properties and content
    async fn get_blob(&self, container: &str, name: &str) -> Result<Blob>;

    /// Fetch a blob's properties only
    async fn get_blob_properties(&self, container: &str, name: &str) -> Result<BlobProperties>;

    /// Create or overwrite a blob in a single call
    ///
    /// # Returns
    /// Properties of the stored blob
    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<BlobProperties>;

    /// Delete a blob
    ///
    /// # Errors
    /// `NotFound` if the blob does not exist
    async fn delete_blob(&self, container: &str, name: &str) -> Result<()>;

    /// Fetch one page of blob names under a prefix
    async fn list_blobs(&self, container: &str, request: &ListRequest) -> Result<ListPage>;

    /// Server-side copy within the container
    async fn copy_blob(&self, container: &str, source: &str, destination: &str) -> Result<()>;
}

impl BlobProperties {
    /// Properties of a blob stored with `options` right now
    pub fn from_upload(content_length: u64, options: &UploadOptions, last_modified: i64) -> Self {
        Self {
            content_length,
            content_type: options.content_type.clone(),
            cache_control: options.cache_control.clone(),
            content_language: options.content_language.clone(),
            content_encoding: options.content_encoding.clone(),
            last_modified: Some(last_modified),
            metadata: options.metadata.clone(),
        }
    }
}

/// Cut one listing page out of blobs sorted by name
///
/// Applies prefix filtering, delimiter grouping and marker skipping the
/// same way for every backend that lists from a complete sorted view.
/// A marker names the last entry of the previous page: a blob name or a
/// virtual directory ending with the delimiter.
pub(crate) fn build_page<I>(items: I, request: &ListRequest, default_page_size: usize) -> ListPage
where
    I: IntoIterator<Item = BlobItem>,
{
    let page_size = request.max_results.unwrap_or(default_page_size).max(1);
    let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
    let mut page = ListPage::default();
    let mut emitted = 0;
    let mut last_key: Option<String> = None;

    for item in items {
        if !item.name.starts_with(&request.prefix) {
            continue;
        }
        if let Some(marker) = request.marker.as_deref() {
            if item.name.as_str() <= marker {
                continue;
            }
            if delimiter.is_some_and(|d| marker.ends_with(d)) && item.name.starts_with(marker) {
                continue;
            }
        }

        let directory = delimiter.and_then(|d| {
            let rest = &item.name[request.prefix.len()..];
            rest.find(d)
                .map(|idx| format!("{}{}", request.prefix, &rest[..idx + d.len()]))
        });

        if let Some(dir) = &directory {
            if page.prefixes.last() == Some(dir) {
                continue;
            }
        }

        if emitted == page_size {
            page.next_marker = last_key;
            return page;
        }

        match directory {
            Some(dir) => {
                last_key = Some(dir.clone());
                page.prefixes.push(dir);
            }
            None => {
                last_key = Some(item.name.clone());
                page.blobs.push(item);
            }
        }
        emitted += 1;
    }

    page
}

/// Wrap a buffer as a single-chunk stream
pub fn byte_stream(data: Bytes) -> ByteStream {
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Drain a stream into one contiguous buffer
pub async fn collect_bytes(stream: ByteStream) -> Result<Bytes> {
    let buffer = stream
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}
