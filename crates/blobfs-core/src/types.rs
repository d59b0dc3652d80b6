//! Core type definitions for the blob-storage filesystem adapter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback content type when nothing more specific is known
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Object visibility as understood by the filesystem contract
///
/// Blob storage exposes no per-object ACL through this adapter, so
/// attribute records always carry `None`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Normalized file metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileAttributes {
    /// Logical path (prefix removed)
    pub path: String,

    /// Size in bytes
    pub file_size: Option<u64>,

    /// Always `None` for blob storage
    pub visibility: Option<Visibility>,

    /// Last modification time (Unix seconds)
    pub last_modified: Option<i64>,

    /// Content type
    pub mime_type: Option<String>,

    /// Backend-specific extras
    pub extra_metadata: HashMap<String, String>,
}

impl FileAttributes {
    /// Attributes carrying only a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    pub fn with_last_modified(mut self, timestamp: i64) -> Self {
        self.last_modified = Some(timestamp);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Normalized metadata for a virtual directory (a listing common prefix)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryAttributes {
    /// Logical path without a trailing separator
    pub path: String,

    pub visibility: Option<Visibility>,

    pub last_modified: Option<i64>,

    pub extra_metadata: HashMap<String, String>,
}

impl DirectoryAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// One entry yielded by a directory listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageAttributes {
    File(FileAttributes),
    #[serde(rename = "dir")]
    Directory(DirectoryAttributes),
}

impl StorageAttributes {
    /// Logical path of the entry
    pub fn path(&self) -> &str {
        match self {
            StorageAttributes::File(file) => &file.path,
            StorageAttributes::Directory(dir) => &dir.path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StorageAttributes::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, StorageAttributes::Directory(_))
    }
}

/// Kind tag carried by a write result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
}

/// Outcome of a write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteResult {
    /// Final blob name (prefix applied)
    pub path: String,

    /// Modification time reported by the store (Unix seconds)
    pub timestamp: i64,

    #[serde(rename = "type")]
    pub kind: ObjectKind,
}

/// Options sent with a single blob upload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Caller-supplied configuration for a write
///
/// Field names deserialize from the keys `ContentType`, `CacheControl`,
/// `Metadata`, `ContentLanguage`, `ContentEncoding`, `mimetype` and
/// `blobOptions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteConfig {
    #[serde(rename = "ContentType")]
    pub content_type: Option<String>,

    #[serde(rename = "CacheControl")]
    pub cache_control: Option<String>,

    #[serde(rename = "Metadata")]
    pub metadata: Option<HashMap<String, String>>,

    #[serde(rename = "ContentLanguage")]
    pub content_language: Option<String>,

    #[serde(rename = "ContentEncoding")]
    pub content_encoding: Option<String>,

    /// Overrides every other source of content type
    pub mimetype: Option<String>,

    /// Bulk options used as the starting point
    #[serde(rename = "blobOptions")]
    pub blob_options: Option<UploadOptions>,
}

impl WriteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn content_language(mut self, value: impl Into<String>) -> Self {
        self.content_language = Some(value.into());
        self
    }

    pub fn content_encoding(mut self, value: impl Into<String>) -> Self {
        self.content_encoding = Some(value.into());
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn mimetype(mut self, value: impl Into<String>) -> Self {
        self.mimetype = Some(value.into());
        self
    }

    pub fn blob_options(mut self, options: UploadOptions) -> Self {
        self.blob_options = Some(options);
        self
    }

    /// Resolve the upload options for one call
    ///
    /// `blob_options` is the base; explicit non-empty keys replace its
    /// fields; `mimetype` replaces the content type last. Empty strings
    /// never survive, so an unresolved content type stays `None`.
    pub fn upload_options(&self) -> UploadOptions {
        let base = self.blob_options.clone().unwrap_or_default();
        let mut options = UploadOptions {
            content_type: non_empty(&base.content_type),
            cache_control: non_empty(&base.cache_control),
            content_language: non_empty(&base.content_language),
            content_encoding: non_empty(&base.content_encoding),
            metadata: base.metadata,
        };

        if let Some(value) = non_empty(&self.content_type) {
            options.content_type = Some(value);
        }
        if let Some(value) = non_empty(&self.cache_control) {
            options.cache_control = Some(value);
        }
        if let Some(value) = non_empty(&self.content_language) {
            options.content_language = Some(value);
        }
        if let Some(value) = non_empty(&self.content_encoding) {
            options.content_encoding = Some(value);
        }
        if let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            options.metadata = metadata.clone();
        }
        if let Some(value) = non_empty(&self.mimetype) {
            options.content_type = Some(value);
        }

        options
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
