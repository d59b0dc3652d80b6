//! Filesystem adapter over a blob storage client
//!
//! Every operation forwards to one or a small fixed number of sequential
//! client calls against a single container, with logical paths mapped to
//! blob names through a [`PathPrefixer`].

use std::sync::Arc;

use async_trait::async_trait;
use blobfs_core::config::ContainerOptions;
use blobfs_core::{
    AdapterConfig, DirectoryAttributes, Error, FileAttributes, ObjectKind, PathPrefixer, Result,
    RetryConfig, StorageAttributes, Visibility, WriteConfig, WriteResult,
};
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument};

use crate::client::collect_bytes;
use crate::filesystem::AttributeStream;
use crate::mime::{ContentSniffer, MimeTypeDetector};
use crate::retry::with_retry;
use crate::{
    Blob, BlobClient, BlobItem, BlobProperties, ByteStream, FilesystemAdapter, ListRequest,
};

const DELIMITER: &str = "/";

/// Adapter exposing a blob container as a filesystem
///
/// The container is fixed for the lifetime of the adapter. It is created
/// on the first mutating call; concurrent first calls share one creation
/// attempt and an "already exists" answer counts as success.
pub struct BlobPathAdapter {
    client: Arc<dyn BlobClient>,
    container: String,
    prefixer: PathPrefixer,
    container_options: ContainerOptions,
    retry: RetryConfig,
    mime_detector: Arc<dyn MimeTypeDetector>,
    container_ready: OnceCell<()>,
}

impl std::fmt::Debug for BlobPathAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobPathAdapter")
            .field("container", &self.container)
            .field("prefix", &self.prefixer.prefix())
            .field("container_ready", &self.container_ready.initialized())
            .finish_non_exhaustive()
    }
}

/// Cursor of an in-progress listing
#[derive(Debug, Default)]
struct ListingState {
    /// Listing prefixes still to visit, next on top
    pending: Vec<String>,
    /// Prefix being paged through
    current: Option<String>,
    /// Continuation marker for `current`
    marker: Option<String>,
    /// Subdirectories of `current` found so far (deep listings only)
    subdirs: Vec<String>,
    /// Entries fetched but not yet yielded, last name first
    buffered: Vec<StorageAttributes>,
    deep: bool,
}

impl BlobPathAdapter {
    /// Create an adapter from a client and configuration
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration does not validate
    pub fn new(client: Arc<dyn BlobClient>, config: AdapterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            container: config.container,
            prefixer: PathPrefixer::new(&config.prefix),
            container_options: config.container_options,
            retry: config.retry,
            mime_detector: Arc::new(ContentSniffer::new()),
            container_ready: OnceCell::new(),
        })
    }

    /// Replace the content type detector used for untyped writes
    pub fn with_mime_detector(mut self, detector: Arc<dyn MimeTypeDetector>) -> Self {
        self.mime_detector = detector;
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn prefixer(&self) -> &PathPrefixer {
        &self.prefixer
    }

    /// Create the container once; later calls return immediately
    pub async fn ensure_container(&self) -> Result<()> {
        self.container_ready
            .get_or_try_init(|| async {
                let created = with_retry(&self.retry, "create_container", || {
                    self.client
                        .create_container(&self.container, &self.container_options)
                })
                .await;

                match created {
                    Ok(()) => {
                        info!(container = %self.container, "Created container");
                        Ok(())
                    }
                    Err(Error::ContainerExists { .. }) => {
                        debug!(container = %self.container, "Container already exists");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .map(|_| ())
    }

    async fn upload(&self, path: &str, data: Bytes, config: &WriteConfig) -> Result<WriteResult> {
        self.ensure_container().await?;
        let location = self.prefixer.prefix_path(path);

        let mut options = config.upload_options();
        if options.content_type.is_none() {
            options.content_type = Some(self.mime_detector.detect_or_default(path, &data));
        }
        debug!(
            %location,
            size = data.len(),
            content_type = options.content_type.as_deref().unwrap_or_default(),
            "Uploading blob"
        );

        let properties = with_retry(&self.retry, "write", || {
            self.client
                .put_blob(&self.container, &location, data.clone(), &options)
        })
        .await?;

        Ok(WriteResult {
            path: location,
            timestamp: properties
                .last_modified
                .unwrap_or_else(|| Utc::now().timestamp()),
            kind: ObjectKind::File,
        })
    }

    async fn properties(&self, path: &str) -> Result<BlobProperties> {
        let location = self.prefixer.prefix_path(path);
        debug!(%location, "Fetching blob properties");
        with_retry(&self.retry, "get_properties", || {
            self.client.get_blob_properties(&self.container, &location)
        })
        .await
    }

    async fn fetch(&self, path: &str) -> Result<Blob> {
        let location = self.prefixer.prefix_path(path);
        debug!(%location, "Reading blob");
        with_retry(&self.retry, "read", || {
            self.client.get_blob(&self.container, &location)
        })
        .await
    }

    /// Every blob name under a listing prefix, across all pages
    async fn blob_names(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker = None;
        loop {
            let request = ListRequest::new(prefix).marker(marker.take());
            let page = with_retry(&self.retry, "list", || {
                self.client.list_blobs(&self.container, &request)
            })
            .await?;

            names.extend(page.blobs.into_iter().map(|blob| blob.name));
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => return Ok(names),
            }
        }
    }

    fn file_attributes(&self, blob: BlobItem) -> Result<FileAttributes> {
        Ok(FileAttributes {
            path: self.prefixer.strip_prefix(&blob.name)?,
            file_size: Some(blob.properties.content_length),
            visibility: None,
            last_modified: blob.properties.last_modified,
            mime_type: blob.properties.content_type,
            extra_metadata: blob.properties.metadata,
        })
    }

    /// Produce the next listing entry, fetching pages as needed
    async fn next_entry(&self, state: &mut ListingState) -> Result<Option<StorageAttributes>> {
        loop {
            if let Some(entry) = state.buffered.pop() {
                return Ok(Some(entry));
            }

            let prefix = match state.current.clone() {
                Some(prefix) => prefix,
                None => match state.pending.pop() {
                    Some(prefix) => {
                        state.current = Some(prefix.clone());
                        prefix
                    }
                    None => return Ok(None),
                },
            };

            let request = ListRequest::new(prefix.as_str())
                .delimiter(DELIMITER)
                .marker(state.marker.take());
            let page = with_retry(&self.retry, "list_contents", || {
                self.client.list_blobs(&self.container, &request)
            })
            .await?;
            debug!(
                %prefix,
                blobs = page.blobs.len(),
                prefixes = page.prefixes.len(),
                "Fetched listing page"
            );

            let mut entries = Vec::with_capacity(page.blobs.len() + page.prefixes.len());
            for blob in page.blobs {
                // Zero-length directory markers carry no file
                if blob.name.ends_with(DELIMITER) {
                    continue;
                }
                let key = blob.name.clone();
                entries.push((key, StorageAttributes::File(self.file_attributes(blob)?)));
            }
            for dir in page.prefixes {
                let path = self.prefixer.strip_directory_prefix(&dir)?;
                entries.push((
                    dir.clone(),
                    StorageAttributes::Directory(DirectoryAttributes::new(path)),
                ));
                if state.deep {
                    state.subdirs.push(dir);
                }
            }
            // Descending, so popping yields name order
            entries.sort_by(|a, b| b.0.cmp(&a.0));
            state.buffered = entries.into_iter().map(|(_, entry)| entry).collect();

            match page.next_marker {
                Some(next) => state.marker = Some(next),
                None => {
                    state.current = None;
                    let subdirs = std::mem::take(&mut state.subdirs);
                    state.pending.extend(subdirs.into_iter().rev());
                }
            }
        }
    }
}

#[async_trait]
impl FilesystemAdapter for BlobPathAdapter {
    #[instrument(skip(self), fields(container = %self.container))]
    async fn file_exists(&self, path: &str) -> Result<bool> {
        match self.properties(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => {
                error!(%path, error = %e, "Existence check failed");
                Err(e)
            }
        }
    }

    #[instrument(skip(self, contents, config), fields(container = %self.container, size = contents.len()))]
    async fn write(&self, path: &str, contents: Bytes, config: &WriteConfig) -> Result<WriteResult> {
        self.upload(path, contents, config).await
    }

    #[instrument(skip(self, contents, config), fields(container = %self.container))]
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        config: &WriteConfig,
    ) -> Result<WriteResult> {
        let data = collect_bytes(contents).await?;
        self.upload(path, data, config).await
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn read(&self, path: &str) -> Result<Bytes> {
        self.fetch(path).await?.into_bytes().await
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        Ok(self.fetch(path).await?.content)
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn delete(&self, path: &str) -> Result<()> {
        self.ensure_container().await?;
        let location = self.prefixer.prefix_path(path);
        debug!(%location, "Deleting blob");

        with_retry(&self.retry, "delete", || {
            self.client.delete_blob(&self.container, &location)
        })
        .await
        .map_err(|e| Error::UnableToDelete {
            path: location.clone(),
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn delete_directory(&self, path: &str) -> Result<()> {
        self.ensure_container().await?;
        let dir_location = self.prefixer.prefix_directory_path(path);
        let names = self.blob_names(&dir_location).await?;
        let total = names.len();

        let mut failed = 0;
        for name in &names {
            let deleted = with_retry(&self.retry, "delete", || {
                self.client.delete_blob(&self.container, name)
            })
            .await;

            match deleted {
                Ok(()) => {}
                // Already gone counts as deleted
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    error!(blob = %name, error = %e, "Failed to delete blob");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(Error::UnableToDeleteDirectory {
                path: dir_location,
                failed,
                total,
            });
        }

        info!(directory = %dir_location, deleted = total, "Deleted directory");
        Ok(())
    }

    async fn create_directory(&self, _path: &str, _config: &WriteConfig) -> Result<()> {
        Err(Error::unsupported("create_directory"))
    }

    async fn set_visibility(&self, _path: &str, _visibility: Visibility) -> Result<()> {
        Err(Error::unsupported("set_visibility"))
    }

    async fn visibility(&self, _path: &str) -> Result<FileAttributes> {
        Err(Error::unsupported("visibility"))
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn mime_type(&self, path: &str) -> Result<FileAttributes> {
        let mime_type = self
            .properties(path)
            .await?
            .content_type
            .ok_or_else(|| Error::UnableToRetrieveMetadata {
                path: path.to_string(),
                attribute: "mime_type".to_string(),
            })?;
        Ok(FileAttributes::new(path).with_mime_type(mime_type))
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn last_modified(&self, path: &str) -> Result<FileAttributes> {
        let timestamp = self
            .properties(path)
            .await?
            .last_modified
            .ok_or_else(|| Error::UnableToRetrieveMetadata {
                path: path.to_string(),
                attribute: "last_modified".to_string(),
            })?;
        Ok(FileAttributes::new(path).with_last_modified(timestamp))
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn file_size(&self, path: &str) -> Result<FileAttributes> {
        let properties = self.properties(path).await?;
        Ok(FileAttributes::new(path).with_file_size(properties.content_length))
    }

    fn list_contents<'a>(&'a self, path: &str, deep: bool) -> AttributeStream<'a> {
        let state = ListingState {
            pending: vec![self.prefixer.prefix_directory_path(path)],
            deep,
            ..Default::default()
        };

        Box::pin(stream::try_unfold(state, move |mut state| async move {
            let next = self.next_entry(&mut state).await;
            next.map(|entry| entry.map(|entry| (entry, state)))
        }))
    }

    #[instrument(skip(self, _config), fields(container = %self.container))]
    async fn move_file(&self, source: &str, destination: &str, _config: &WriteConfig) -> Result<()> {
        let from = self.prefixer.prefix_path(source);
        let to = self.prefixer.prefix_path(destination);
        let move_failed = |reason: String| Error::UnableToMove {
            source_path: source.to_string(),
            destination: destination.to_string(),
            reason,
        };

        if from == to {
            // Nothing to move, but the source must still exist
            self.properties(source)
                .await
                .map_err(|e| move_failed(e.to_string()))?;
            debug!(%from, "Move onto itself, nothing to do");
            return Ok(());
        }
        self.ensure_container().await?;

        with_retry(&self.retry, "copy", || {
            self.client.copy_blob(&self.container, &from, &to)
        })
        .await
        .map_err(|e| move_failed(e.to_string()))?;

        // Not atomic: a failure here leaves both blobs in place
        with_retry(&self.retry, "delete", || {
            self.client.delete_blob(&self.container, &from)
        })
        .await
        .map_err(|e| move_failed(format!("copied, but source was not deleted: {}", e)))?;

        debug!(%from, %to, "Moved blob");
        Ok(())
    }

    #[instrument(skip(self, _config), fields(container = %self.container))]
    async fn copy(&self, source: &str, destination: &str, _config: &WriteConfig) -> Result<()> {
        self.ensure_container().await?;
        let from = self.prefixer.prefix_path(source);
        let to = self.prefixer.prefix_path(destination);

        with_retry(&self.retry, "copy", || {
            self.client.copy_blob(&self.container, &from, &to)
        })
        .await
        .map_err(|e| Error::UnableToCopy {
            source_path: source.to_string(),
            destination: destination.to_string(),
            reason: e.to_string(),
        })?;

        debug!(%from, %to, "Copied blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{byte_stream, MockBlobClient};
    use crate::{ListPage, MemoryBlobClient};
    use blobfs_core::UploadOptions;
    use futures::TryStreamExt;
    use std::time::Duration;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    fn setup(prefix: &str) -> (Arc<MemoryBlobClient>, BlobPathAdapter) {
        setup_with(MemoryBlobClient::new(), prefix)
    }

    fn setup_with(client: MemoryBlobClient, prefix: &str) -> (Arc<MemoryBlobClient>, BlobPathAdapter) {
        let client = Arc::new(client);
        let config = AdapterConfig::new("docs")
            .with_prefix(prefix)
            .with_retry(fast_retry());
        let adapter = BlobPathAdapter::new(client.clone(), config).unwrap();
        (client, adapter)
    }

    fn mock_adapter(mock: MockBlobClient) -> BlobPathAdapter {
        let config = AdapterConfig::new("docs").with_retry(fast_retry());
        BlobPathAdapter::new(Arc::new(mock), config).unwrap()
    }

    fn not_found(path: &str) -> Error {
        Error::NotFound {
            path: path.to_string(),
        }
    }

    fn blob_item(name: &str) -> BlobItem {
        BlobItem {
            name: name.to_string(),
            properties: BlobProperties::default(),
        }
    }

    async fn write(adapter: &BlobPathAdapter, path: &str, data: &'static [u8]) {
        adapter
            .write(path, Bytes::from_static(data), &WriteConfig::new())
            .await
            .unwrap();
    }

    async fn listing(adapter: &BlobPathAdapter, path: &str, deep: bool) -> Vec<StorageAttributes> {
        adapter
            .list_contents(path, deep)
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
    }

    fn paths(entries: &[StorageAttributes]) -> Vec<&str> {
        entries.iter().map(|e| e.path()).collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let client = Arc::new(MemoryBlobClient::new());
        let result = BlobPathAdapter::new(client, AdapterConfig::new(""));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_write_stores_prefixed_blob() {
        let (client, adapter) = setup("team/");
        let data = Bytes::from_static(b"%PDF-1.7 quarterly numbers");

        let result = adapter
            .write("report.pdf", data.clone(), &WriteConfig::new())
            .await
            .unwrap();
        assert_eq!(result.path, "team/report.pdf");
        assert_eq!(result.kind, ObjectKind::File);
        assert!(client.container_exists("docs"));
        assert_eq!(client.blob_names("docs"), vec!["team/report.pdf"]);

        let size = adapter.file_size("report.pdf").await.unwrap();
        assert_eq!(size.path, "report.pdf");
        assert_eq!(size.file_size, Some(data.len() as u64));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (_client, adapter) = setup("team");
        write(&adapter, "a/b.txt", b"hello world").await;

        assert_eq!(adapter.read("a/b.txt").await.unwrap(), Bytes::from("hello world"));
        assert_eq!(adapter.read("/a/b.txt").await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_write_stream_and_read_stream() {
        let (_client, adapter) = setup("");
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"chunk-1 ")),
            Ok(Bytes::from_static(b"chunk-2")),
        ];
        let contents: ByteStream = Box::pin(stream::iter(chunks));

        adapter
            .write_stream("log.txt", contents, &WriteConfig::new())
            .await
            .unwrap();

        let stream = adapter.read_stream("log.txt").await.unwrap();
        assert_eq!(collect_bytes(stream).await.unwrap(), Bytes::from("chunk-1 chunk-2"));
    }

    #[tokio::test]
    async fn test_explicit_content_type_wins_over_sniffing() {
        let (_client, adapter) = setup("");
        let config = WriteConfig::new().content_type("application/x-custom");
        adapter
            .write("image.png", Bytes::from_static(PNG), &config)
            .await
            .unwrap();

        let attrs = adapter.mime_type("image.png").await.unwrap();
        assert_eq!(attrs.mime_type.as_deref(), Some("application/x-custom"));
    }

    #[tokio::test]
    async fn test_content_type_is_sniffed() {
        let (_client, adapter) = setup("");
        write(&adapter, "upload", PNG).await;
        write(&adapter, "blob", &[0, 159, 146, 150, 0]).await;

        let sniffed = adapter.mime_type("upload").await.unwrap();
        assert_eq!(sniffed.mime_type.as_deref(), Some("image/png"));

        let fallback = adapter.mime_type("blob").await.unwrap();
        assert_eq!(fallback.mime_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_empty_blob_options_content_type_is_sniffed() {
        let (client, adapter) = setup("");
        let config = WriteConfig::new().blob_options(UploadOptions {
            content_type: Some(String::new()),
            ..Default::default()
        });
        adapter
            .write("logo", Bytes::from_static(PNG), &config)
            .await
            .unwrap();

        let props = client.get_blob_properties("docs", "logo").await.unwrap();
        assert_eq!(props.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_upload_options_are_sent() {
        let (client, adapter) = setup("");
        let config = WriteConfig::new()
            .cache_control("max-age=3600")
            .content_language("en")
            .mimetype("text/csv");
        adapter
            .write("table.csv", Bytes::from_static(b"a,b\n1,2\n"), &config)
            .await
            .unwrap();

        let props = client.get_blob_properties("docs", "table.csv").await.unwrap();
        assert_eq!(props.content_type.as_deref(), Some("text/csv"));
        assert_eq!(props.cache_control.as_deref(), Some("max-age=3600"));
        assert_eq!(props.content_language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_file_exists() {
        let (_client, adapter) = setup("team");
        assert!(!adapter.file_exists("a.txt").await.unwrap());

        write(&adapter, "a.txt", b"data").await;
        assert!(adapter.file_exists("a.txt").await.unwrap());
        assert!(!adapter.file_exists("b.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_client, adapter) = setup("");
        write(&adapter, "present.txt", b"x").await;

        let result = adapter.read("missing.txt").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let (client, adapter) = setup("team");
        write(&adapter, "a.txt", b"data").await;

        adapter.delete("a.txt").await.unwrap();
        assert!(client.blob_names("docs").is_empty());

        let result = adapter.delete("a.txt").await;
        assert!(matches!(result, Err(Error::UnableToDelete { ref path, .. }) if path == "team/a.txt"));
    }

    #[tokio::test]
    async fn test_delete_directory() {
        let (client, adapter) = setup_with(MemoryBlobClient::new().with_page_size(2), "team");
        for path in ["reports/1.txt", "reports/2.txt", "reports/q1/3.txt", "reportsx.txt", "other.txt"] {
            write(&adapter, path, b"x").await;
        }

        adapter.delete_directory("reports").await.unwrap();
        assert_eq!(
            client.blob_names("docs"),
            vec!["team/other.txt", "team/reportsx.txt"]
        );
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let (_client, adapter) = setup("");
        write(&adapter, "a.txt", b"x").await;

        for result in [
            adapter.create_directory("dir", &WriteConfig::new()).await,
            adapter.set_visibility("a.txt", Visibility::Public).await,
            adapter.visibility("a.txt").await.map(|_| ()),
            adapter.create_directory("", &WriteConfig::new()).await,
        ] {
            assert!(matches!(result, Err(Error::Unsupported { .. })));
        }
    }

    #[tokio::test]
    async fn test_metadata_projections() {
        let (_client, adapter) = setup("");
        let before = Utc::now().timestamp();
        write(&adapter, "notes.txt", b"some notes").await;

        let modified = adapter.last_modified("notes.txt").await.unwrap();
        assert!(modified.last_modified.unwrap() >= before);
        assert!(modified.file_size.is_none());
        assert!(modified.mime_type.is_none());
        assert!(modified.visibility.is_none());

        let mime = adapter.mime_type("notes.txt").await.unwrap();
        assert_eq!(mime.mime_type.as_deref(), Some("text/plain"));

        let result = adapter.file_size("missing.txt").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_contents_shallow() {
        let (_client, adapter) = setup_with(MemoryBlobClient::new().with_page_size(2), "team");
        for path in ["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt", "z.txt"] {
            write(&adapter, path, b"x").await;
        }

        let entries = listing(&adapter, "", false).await;
        assert_eq!(paths(&entries), vec!["a.txt", "b.txt", "sub", "z.txt"]);
        assert!(entries[2].is_dir());

        let StorageAttributes::File(file) = &entries[0] else {
            panic!("expected a file entry");
        };
        assert_eq!(file.file_size, Some(1));
        assert!(file.visibility.is_none());
    }

    #[tokio::test]
    async fn test_list_contents_deep() {
        let (_client, adapter) = setup_with(MemoryBlobClient::new().with_page_size(2), "team");
        for path in ["a.txt", "sub/c.txt", "sub/deeper/d.txt", "sub2/e.txt"] {
            write(&adapter, path, b"x").await;
        }

        let entries = listing(&adapter, "", true).await;
        assert_eq!(
            paths(&entries),
            vec!["a.txt", "sub", "sub2", "sub/c.txt", "sub/deeper", "sub/deeper/d.txt", "sub2/e.txt"]
        );

        let nested = listing(&adapter, "sub", true).await;
        assert_eq!(paths(&nested), vec!["sub/c.txt", "sub/deeper", "sub/deeper/d.txt"]);
    }

    #[tokio::test]
    async fn test_list_contents_is_restartable() {
        let (_client, adapter) = setup("");
        write(&adapter, "a.txt", b"x").await;
        write(&adapter, "b.txt", b"y").await;

        let first = listing(&adapter, "", true).await;
        let second = listing(&adapter, "", true).await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_list_contents_missing_container_is_error() {
        let (_client, adapter) = setup("");
        let result: Result<Vec<_>> = adapter.list_contents("", false).try_collect().await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_copy_and_move() {
        let (client, adapter) = setup("team");
        write(&adapter, "a.txt", b"payload").await;

        adapter.copy("a.txt", "b.txt", &WriteConfig::new()).await.unwrap();
        assert_eq!(adapter.read("b.txt").await.unwrap(), Bytes::from("payload"));
        assert!(adapter.file_exists("a.txt").await.unwrap());

        adapter.move_file("b.txt", "moved/c.txt", &WriteConfig::new()).await.unwrap();
        assert_eq!(
            client.blob_names("docs"),
            vec!["team/a.txt", "team/moved/c.txt"]
        );

        adapter.move_file("a.txt", "/a.txt", &WriteConfig::new()).await.unwrap();
        assert!(adapter.file_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_and_move_missing_source() {
        let (client, adapter) = setup("");
        write(&adapter, "present.txt", b"x").await;

        let result = adapter.copy("missing.txt", "b.txt", &WriteConfig::new()).await;
        assert!(matches!(result, Err(Error::UnableToCopy { .. })));

        let result = adapter.move_file("missing.txt", "b.txt", &WriteConfig::new()).await;
        assert!(matches!(result, Err(Error::UnableToMove { .. })));
        assert_eq!(client.blob_names("docs"), vec!["present.txt"]);
    }

    #[tokio::test]
    async fn test_move_onto_itself_requires_source() {
        let (client, adapter) = setup("team");

        let result = adapter.move_file("ghost.txt", "/ghost.txt", &WriteConfig::new()).await;
        assert!(matches!(result, Err(Error::UnableToMove { .. })));
        assert!(client.blob_names("docs").is_empty());
    }

    #[tokio::test]
    async fn test_exists_propagates_transient_failures() {
        let mut mock = MockBlobClient::new();
        mock.expect_get_blob_properties()
            .times(3)
            .returning(|_, _| Err(Error::transient("503 Service Unavailable")));

        let adapter = mock_adapter(mock);
        let result = adapter.file_exists("a.txt").await;
        assert!(matches!(result, Err(Error::Transient { .. })));
    }

    #[tokio::test]
    async fn test_exists_not_found_is_not_retried() {
        let mut mock = MockBlobClient::new();
        mock.expect_get_blob_properties()
            .times(1)
            .returning(|_, name| Err(not_found(name)));

        let adapter = mock_adapter(mock);
        assert!(!adapter.file_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_container_created_once_and_exists_tolerated() {
        let mut mock = MockBlobClient::new();
        mock.expect_create_container()
            .times(1)
            .returning(|container, _| {
                Err(Error::ContainerExists {
                    container: container.to_string(),
                })
            });
        mock.expect_put_blob()
            .times(4)
            .returning(|_, _, data, options| {
                Ok(BlobProperties::from_upload(data.len() as u64, options, 1_700_000_000))
            });

        let adapter = Arc::new(mock_adapter(mock));
        let writes = (0..4).map(|i| {
            let adapter = adapter.clone();
            tokio::spawn(async move {
                adapter
                    .write(&format!("{}.txt", i), Bytes::from("x"), &WriteConfig::new())
                    .await
            })
        });
        for result in futures::future::join_all(writes).await {
            assert_eq!(result.unwrap().unwrap().timestamp, 1_700_000_000);
        }
    }

    #[tokio::test]
    async fn test_write_retries_transient_put() {
        let mut mock = MockBlobClient::new();
        mock.expect_create_container().returning(|_, _| Ok(()));
        let mut attempts = 0;
        mock.expect_put_blob()
            .times(2)
            .returning(move |_, _, data, options| {
                attempts += 1;
                if attempts == 1 {
                    Err(Error::transient("connection reset"))
                } else {
                    Ok(BlobProperties::from_upload(data.len() as u64, options, 42))
                }
            });

        let adapter = mock_adapter(mock);
        let result = adapter
            .write("a.txt", Bytes::from("x"), &WriteConfig::new())
            .await
            .unwrap();
        assert_eq!(result.timestamp, 42);
    }

    #[tokio::test]
    async fn test_delete_directory_issues_one_delete_per_blob() {
        let mut mock = MockBlobClient::new();
        mock.expect_create_container().returning(|_, _| Ok(()));
        mock.expect_list_blobs()
            .withf(|_, request| request.prefix == "reports/" && request.delimiter.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(ListPage {
                    blobs: vec![
                        blob_item("reports/1.txt"),
                        blob_item("reports/2.txt"),
                        blob_item("reports/3.txt"),
                    ],
                    ..Default::default()
                })
            });
        mock.expect_delete_blob()
            .times(3)
            .returning(|_, _| Ok(()));

        let adapter = mock_adapter(mock);
        adapter.delete_directory("reports").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_directory_reports_failures() {
        let mut mock = MockBlobClient::new();
        mock.expect_create_container().returning(|_, _| Ok(()));
        mock.expect_list_blobs().returning(|_, _| {
            Ok(ListPage {
                blobs: vec![blob_item("a"), blob_item("b"), blob_item("c")],
                ..Default::default()
            })
        });
        mock.expect_delete_blob().returning(|_, name| {
            if name == "b" {
                Err(Error::Internal {
                    message: "permission denied".to_string(),
                })
            } else {
                Ok(())
            }
        });

        let adapter = mock_adapter(mock);
        let result = adapter.delete_directory("").await;
        assert!(matches!(
            result,
            Err(Error::UnableToDeleteDirectory { failed: 1, total: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_move_deletes_source_only_after_copy() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockBlobClient::new();
        mock.expect_create_container().returning(|_, _| Ok(()));
        mock.expect_copy_blob()
            .withf(|_, source, destination| source == "a.txt" && destination == "b.txt")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_delete_blob()
            .withf(|_, name| name == "a.txt")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::transient("timeout")));

        let adapter = BlobPathAdapter::new(
            Arc::new(mock),
            AdapterConfig::new("docs").with_retry(RetryConfig::disabled()),
        )
        .unwrap();
        let result = adapter.move_file("a.txt", "b.txt", &WriteConfig::new()).await;
        assert!(matches!(result, Err(Error::UnableToMove { .. })));
    }

    #[tokio::test]
    async fn test_read_stream_is_live_handle() {
        let mut mock = MockBlobClient::new();
        mock.expect_get_blob().returning(|_, _| {
            Ok(Blob {
                properties: BlobProperties::default(),
                content: byte_stream(Bytes::from_static(b"streamed")),
            })
        });

        let adapter = mock_adapter(mock);
        let mut stream = adapter.read_stream("a.txt").await.unwrap();
        let chunk = stream.try_next().await.unwrap();
        assert_eq!(chunk, Some(Bytes::from("streamed")));
    }
}
