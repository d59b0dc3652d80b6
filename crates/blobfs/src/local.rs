//! Local filesystem blob storage client
//!
//! Maps containers to directories under a base path:
//! - `<container>/blobs/<encoded name>` holds blob content
//! - `<container>/properties/<encoded name>.json` holds blob properties
//! - `<container>/tmp/` stages atomic writes (write, sync, rename)
//!
//! Blob names are percent-encoded into a single file name, so `a` and
//! `a/b` can live side by side the way they do in blob storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use blobfs_core::config::ContainerOptions;
use blobfs_core::{Error, Result, UploadOptions};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::client::build_page;
use crate::{Blob, BlobClient, BlobItem, BlobProperties, ByteStream, ListPage, ListRequest};

const BLOBS_DIR: &str = "blobs";
const PROPERTIES_DIR: &str = "properties";
const TMP_DIR: &str = "tmp";
const CONTAINER_FILE: &str = "container.json";

/// Default number of entries per listing page
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Chunk size for streaming reads (64 KB)
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Blob storage backed by a local directory
///
/// Stores data on disk with support for:
/// - Atomic writes (staged in `tmp/`, then renamed)
/// - Flat, percent-encoded file names for arbitrary blob names
/// - Paginated, delimiter-aware listings
#[derive(Debug, Clone)]
pub struct LocalBlobClient {
    /// Base path holding one directory per container
    base_path: PathBuf,
}

impl LocalBlobClient {
    /// Create a new LocalBlobClient instance
    ///
    /// # Arguments
    /// * `base_path` - Directory to use as the storage root
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.base_path.join(container)
    }

    /// Reject names local storage cannot represent
    fn check_name(name: &str) -> Result<()> {
        let invalid = name.is_empty()
            || name.ends_with('/')
            || Path::new(name)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if invalid {
            return Err(Error::InvalidPath {
                path: name.to_string(),
                reason: "not a valid blob name for local storage".to_string(),
            });
        }
        Ok(())
    }

    fn file_name(name: &str) -> Result<String> {
        Self::check_name(name)?;
        Ok(urlencoding::encode(name).into_owned())
    }

    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        Ok(self
            .container_path(container)
            .join(BLOBS_DIR)
            .join(Self::file_name(name)?))
    }

    fn properties_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        Ok(self
            .container_path(container)
            .join(PROPERTIES_DIR)
            .join(format!("{}.json", Self::file_name(name)?)))
    }

    /// Generate a unique staging file path
    fn temp_path(&self, container: &str) -> PathBuf {
        self.container_path(container)
            .join(TMP_DIR)
            .join(format!("{}.tmp", Uuid::new_v4()))
    }

    async fn ensure_container(&self, container: &str) -> Result<()> {
        match fs::metadata(self.container_path(container)).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::Internal {
                message: format!("container path for {} is not a directory", container),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
                path: container.to_string(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn not_found_or(path: String, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { path }
        } else {
            Error::Io(e)
        }
    }

    /// Write bytes to `target` atomically through the container's tmp dir
    async fn write_atomic(&self, container: &str, target: &Path, data: &[u8]) -> Result<()> {
        let temp_path = self.temp_path(container);

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        if let Err(e) = fs::rename(&temp_path, target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::Io(e));
        }
        Ok(())
    }

    /// Read stored properties, refreshing size (and time if never recorded)
    async fn read_properties(&self, container: &str, name: &str) -> Result<BlobProperties> {
        let blob_path = self.blob_path(container, name)?;
        let meta = fs::metadata(&blob_path)
            .await
            .map_err(|e| Self::not_found_or(format!("{}/{}", container, name), e))?;
        if !meta.is_file() {
            return Err(Error::NotFound {
                path: format!("{}/{}", container, name),
            });
        }

        let mut properties = match fs::read(self.properties_path(container, name)?).await {
            Ok(json) => serde_json::from_slice(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BlobProperties::default(),
            Err(e) => return Err(Error::Io(e)),
        };

        properties.content_length = meta.len();
        if properties.last_modified.is_none() {
            properties.last_modified = meta
                .modified()
                .ok()
                .map(|time| DateTime::<Utc>::from(time).timestamp());
        }
        Ok(properties)
    }

    /// Collect every blob name starting with `prefix`, sorted
    async fn walk_names(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        let blobs_root = self.container_path(container).join(BLOBS_DIR);
        let mut entries = match fs::read_dir(&blobs_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            match urlencoding::decode(&file_name) {
                Ok(name) if name.starts_with(prefix) => names.push(name.into_owned()),
                Ok(_) => {}
                Err(e) => warn!(file = %file_name, error = %e, "Skipping undecodable blob file"),
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Stream a file in fixed-size chunks
fn file_stream(file: fs::File) -> ByteStream {
    Box::pin(stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        match file.read_buf(&mut buf).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some((buf.freeze(), file))),
            Err(e) => Err(Error::Io(e)),
        }
    }))
}

#[async_trait]
impl BlobClient for LocalBlobClient {
    #[instrument(skip(self, options), fields(backend = "local"))]
    async fn create_container(&self, container: &str, options: &ContainerOptions) -> Result<()> {
        Self::check_name(container)?;
        let path = self.container_path(container);
        fs::create_dir_all(&self.base_path).await?;

        match fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::ContainerExists {
                    container: container.to_string(),
                })
            }
            Err(e) => return Err(Error::Io(e)),
        }

        for dir in [BLOBS_DIR, PROPERTIES_DIR, TMP_DIR] {
            fs::create_dir_all(path.join(dir)).await?;
        }
        let json = serde_json::to_vec_pretty(options)?;
        fs::write(path.join(CONTAINER_FILE), json).await?;

        debug!(?path, "Created container directory");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn get_blob(&self, container: &str, name: &str) -> Result<Blob> {
        let properties = self.read_properties(container, name).await?;
        let file = fs::File::open(self.blob_path(container, name)?)
            .await
            .map_err(|e| Self::not_found_or(format!("{}/{}", container, name), e))?;

        Ok(Blob {
            properties,
            content: file_stream(file),
        })
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn get_blob_properties(&self, container: &str, name: &str) -> Result<BlobProperties> {
        self.read_properties(container, name).await
    }

    #[instrument(skip(self, data, options), fields(backend = "local", size = data.len()))]
    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<BlobProperties> {
        self.ensure_container(container).await?;
        let blob_path = self.blob_path(container, name)?;
        let properties_path = self.properties_path(container, name)?;

        debug!(?blob_path, size = data.len(), "Writing blob atomically");
        self.write_atomic(container, &blob_path, &data).await?;

        let properties =
            BlobProperties::from_upload(data.len() as u64, options, Utc::now().timestamp());
        let json = serde_json::to_vec(&properties)?;
        self.write_atomic(container, &properties_path, &json).await?;

        Ok(properties)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete_blob(&self, container: &str, name: &str) -> Result<()> {
        self.ensure_container(container).await?;
        let blob_path = self.blob_path(container, name)?;
        debug!(?blob_path, "Deleting blob");

        fs::remove_file(&blob_path)
            .await
            .map_err(|e| Self::not_found_or(format!("{}/{}", container, name), e))?;

        match fs::remove_file(self.properties_path(container, name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list_blobs(&self, container: &str, request: &ListRequest) -> Result<ListPage> {
        self.ensure_container(container).await?;
        let names = self.walk_names(container, &request.prefix).await?;

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let properties = self.read_properties(container, &name).await?;
            items.push(BlobItem { name, properties });
        }

        let page = build_page(items, request, DEFAULT_PAGE_SIZE);
        debug!(
            blobs = page.blobs.len(),
            prefixes = page.prefixes.len(),
            more = page.next_marker.is_some(),
            "Listed page"
        );
        Ok(page)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn copy_blob(&self, container: &str, source: &str, destination: &str) -> Result<()> {
        let mut properties = self.read_properties(container, source).await?;
        let data = fs::read(self.blob_path(container, source)?)
            .await
            .map_err(|e| Self::not_found_or(format!("{}/{}", container, source), e))?;

        self.write_atomic(container, &self.blob_path(container, destination)?, &data)
            .await?;

        properties.last_modified = Some(Utc::now().timestamp());
        let json = serde_json::to_vec(&properties)?;
        self.write_atomic(container, &self.properties_path(container, destination)?, &json)
            .await?;

        debug!(%source, %destination, size = data.len(), "Copied blob");
        Ok(())
    }
}
