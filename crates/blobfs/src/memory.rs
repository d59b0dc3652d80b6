//! In-memory blob storage client
//!
//! Keeps containers in a process-local map. Useful for tests and for
//! embedding the adapter without a remote service.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use blobfs_core::config::ContainerOptions;
use blobfs_core::{Error, Result, UploadOptions};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::client::{build_page, byte_stream};
use crate::{Blob, BlobClient, BlobItem, BlobProperties, ListPage, ListRequest};

/// Default number of entries per listing page
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    properties: BlobProperties,
}

#[derive(Debug, Default)]
struct Container {
    options: ContainerOptions,
    blobs: BTreeMap<String, StoredBlob>,
}

/// Blob storage held entirely in memory
#[derive(Debug)]
pub struct MemoryBlobClient {
    containers: RwLock<HashMap<String, Container>>,
    page_size: usize,
}

impl Default for MemoryBlobClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobClient {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit listing pages to `page_size` entries
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether `container` has been created
    pub fn container_exists(&self, container: &str) -> bool {
        self.containers.read().contains_key(container)
    }

    /// Options the container was created with
    pub fn container_options(&self, container: &str) -> Option<ContainerOptions> {
        self.containers
            .read()
            .get(container)
            .map(|c| c.options.clone())
    }

    /// Sorted names of every blob in `container`
    pub fn blob_names(&self, container: &str) -> Vec<String> {
        self.containers
            .read()
            .get(container)
            .map(|c| c.blobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn missing_container(container: &str) -> Error {
        Error::NotFound {
            path: container.to_string(),
        }
    }

    fn missing_blob(container: &str, name: &str) -> Error {
        Error::NotFound {
            path: format!("{}/{}", container, name),
        }
    }

    fn stored(&self, container: &str, name: &str) -> Result<StoredBlob> {
        let containers = self.containers.read();
        let blobs = &containers
            .get(container)
            .ok_or_else(|| Self::missing_container(container))?
            .blobs;
        blobs
            .get(name)
            .cloned()
            .ok_or_else(|| Self::missing_blob(container, name))
    }
}

#[async_trait]
impl BlobClient for MemoryBlobClient {
    #[instrument(skip(self, options), fields(backend = "memory"))]
    async fn create_container(&self, container: &str, options: &ContainerOptions) -> Result<()> {
        let mut containers = self.containers.write();
        if containers.contains_key(container) {
            return Err(Error::ContainerExists {
                container: container.to_string(),
            });
        }
        containers.insert(
            container.to_string(),
            Container {
                options: options.clone(),
                blobs: BTreeMap::new(),
            },
        );
        debug!(%container, "Created container");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get_blob(&self, container: &str, name: &str) -> Result<Blob> {
        let stored = self.stored(container, name)?;
        Ok(Blob {
            properties: stored.properties,
            content: byte_stream(stored.data),
        })
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get_blob_properties(&self, container: &str, name: &str) -> Result<BlobProperties> {
        self.stored(container, name).map(|stored| stored.properties)
    }

    #[instrument(skip(self, data, options), fields(backend = "memory", size = data.len()))]
    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<BlobProperties> {
        let mut containers = self.containers.write();
        let blobs = &mut containers
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?
            .blobs;

        let properties =
            BlobProperties::from_upload(data.len() as u64, options, Utc::now().timestamp());
        blobs.insert(
            name.to_string(),
            StoredBlob {
                data,
                properties: properties.clone(),
            },
        );
        Ok(properties)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete_blob(&self, container: &str, name: &str) -> Result<()> {
        let mut containers = self.containers.write();
        let blobs = &mut containers
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?
            .blobs;
        blobs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::missing_blob(container, name))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn list_blobs(&self, container: &str, request: &ListRequest) -> Result<ListPage> {
        let containers = self.containers.read();
        let blobs = &containers
            .get(container)
            .ok_or_else(|| Self::missing_container(container))?
            .blobs;

        let items = blobs
            .range(request.prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&request.prefix))
            .map(|(name, stored)| BlobItem {
                name: name.clone(),
                properties: stored.properties.clone(),
            });

        let page = build_page(items, request, self.page_size);
        debug!(
            blobs = page.blobs.len(),
            prefixes = page.prefixes.len(),
            more = page.next_marker.is_some(),
            "Listed page"
        );
        Ok(page)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn copy_blob(&self, container: &str, source: &str, destination: &str) -> Result<()> {
        let mut containers = self.containers.write();
        let blobs = &mut containers
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?
            .blobs;

        let mut copied = blobs
            .get(source)
            .cloned()
            .ok_or_else(|| Self::missing_blob(container, source))?;
        copied.properties.last_modified = Some(Utc::now().timestamp());
        blobs.insert(destination.to_string(), copied);
        Ok(())
    }
}
