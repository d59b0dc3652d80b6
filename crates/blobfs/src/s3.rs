//! S3 blob storage client
//!
//! Provides an S3-compatible [`BlobClient`] with:
//! - Buckets as containers, object keys as blob names
//! - Delimiter-aware paginated listings
//! - Server-side copies
//! - Custom endpoint support (for MinIO, LocalStack, etc.)

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{http::HttpResponse, Builder as S3ConfigBuilder},
    error::{ProvideErrorMetadata, SdkError},
    primitives::{ByteStream as S3ByteStream, DateTime as S3DateTime},
    types::BucketCannedAcl,
    Client,
};
use blobfs_core::config::ContainerOptions;
use blobfs_core::{Error, Result, UploadOptions};
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use tracing::{debug, instrument};

use crate::{Blob, BlobClient, BlobItem, BlobProperties, ByteStream, ListPage, ListRequest};

/// Largest page S3 returns from one listing call
const MAX_KEYS: usize = 1000;

/// Error codes S3 uses for an absent key or bucket
const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NoSuchBucket", "NotFound"];

/// Error codes S3 uses for throttling and temporary service trouble
const RETRYABLE_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestTimeout",
    "InternalError",
    "ServiceUnavailable",
];

/// S3-compatible blob storage client
///
/// Supports Amazon S3 and S3-compatible services like MinIO.
#[derive(Debug, Clone)]
pub struct S3BlobClient {
    client: Client,
}

/// Configuration for S3BlobClient
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Optional custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub region: Option<String>,
    /// Force path-style addressing (required for MinIO)
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: Some("us-east-1".to_string()),
            force_path_style: false,
        }
    }
}

impl S3BlobClient {
    /// Create a new S3BlobClient with default AWS configuration
    ///
    /// Uses environment variables or instance profile for credentials.
    pub async fn new() -> Self {
        Self::with_config(S3Config::default()).await
    }

    /// Create a new S3BlobClient with custom configuration
    pub async fn with_config(config: S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(
                config.region.unwrap_or_else(|| "us-east-1".to_string()),
            ))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
        }
    }

    /// Create S3BlobClient for MinIO (convenience constructor)
    pub async fn minio(endpoint: &str) -> Self {
        Self::with_config(S3Config {
            endpoint_url: Some(endpoint.to_string()),
            force_path_style: true,
            ..Default::default()
        })
        .await
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Classify an SDK failure into the adapter's error taxonomy
fn map_sdk_error<E>(operation: &str, path: String, err: SdkError<E, HttpResponse>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    // HEAD responses carry no body, so a 404 arrives without an error code
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);

    if status == Some(404) || code.as_deref().is_some_and(|c| NOT_FOUND_CODES.contains(&c)) {
        return Error::NotFound { path };
    }

    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => true,
        SdkError::ServiceError(_) => is_retryable_response(status, code.as_deref()),
        _ => false,
    };
    let message = format!(
        "S3 {} failed for {}: {}",
        operation,
        path,
        code.unwrap_or_else(|| err.to_string())
    );

    if retryable {
        Error::Transient { message }
    } else {
        Error::Internal { message }
    }
}

/// Server-side failures and throttling are worth another attempt
fn is_retryable_response(status: Option<u16>, code: Option<&str>) -> bool {
    status.is_some_and(|s| s >= 500 || s == 429)
        || code.is_some_and(|c| RETRYABLE_CODES.contains(&c))
}

fn timestamp(value: Option<&S3DateTime>) -> Option<i64> {
    value.map(|dt| dt.secs())
}

fn content_length(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}

fn body_stream(body: S3ByteStream) -> ByteStream {
    Box::pin(stream::unfold(body, |mut body| async move {
        body.next().await.map(|chunk| {
            let chunk = chunk.map_err(|e| Error::Transient {
                message: format!("Failed to read S3 response body: {}", e),
            });
            (chunk, body)
        })
    }))
}

#[async_trait]
impl BlobClient for S3BlobClient {
    #[instrument(skip(self, options), fields(backend = "s3"))]
    async fn create_container(&self, container: &str, options: &ContainerOptions) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(container);
        if options.public_access {
            request = request.acl(BucketCannedAcl::PublicRead);
        }

        match request.send().await {
            Ok(_) => {
                debug!(%container, "Created bucket");
                Ok(())
            }
            Err(e) => {
                let service = e.as_service_error();
                if service.is_some_and(|s| s.is_bucket_already_owned_by_you() || s.is_bucket_already_exists()) {
                    Err(Error::ContainerExists {
                        container: container.to_string(),
                    })
                } else {
                    Err(map_sdk_error("create_bucket", container.to_string(), e))
                }
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_blob(&self, container: &str, name: &str) -> Result<Blob> {
        debug!(%name, "Reading from S3");
        let output = self
            .client
            .get_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .map_err(|e| map_sdk_error("get_object", format!("{}/{}", container, name), e))?;

        let properties = BlobProperties {
            content_length: content_length(output.content_length()),
            content_type: output.content_type().map(String::from),
            cache_control: output.cache_control().map(String::from),
            content_language: output.content_language().map(String::from),
            content_encoding: output.content_encoding().map(String::from),
            last_modified: timestamp(output.last_modified()),
            metadata: output.metadata().cloned().unwrap_or_default(),
        };

        Ok(Blob {
            properties,
            content: body_stream(output.body),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_blob_properties(&self, container: &str, name: &str) -> Result<BlobProperties> {
        let output = self
            .client
            .head_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .map_err(|e| map_sdk_error("head_object", format!("{}/{}", container, name), e))?;

        Ok(BlobProperties {
            content_length: content_length(output.content_length()),
            content_type: output.content_type().map(String::from),
            cache_control: output.cache_control().map(String::from),
            content_language: output.content_language().map(String::from),
            content_encoding: output.content_encoding().map(String::from),
            last_modified: timestamp(output.last_modified()),
            metadata: output.metadata().cloned().unwrap_or_default(),
        })
    }

    #[instrument(skip(self, data, options), fields(backend = "s3", size = data.len()))]
    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<BlobProperties> {
        let size = data.len() as u64;
        debug!(%name, size, "Writing to S3");

        let metadata: Option<HashMap<String, String>> =
            (!options.metadata.is_empty()).then(|| options.metadata.clone());

        self.client
            .put_object()
            .bucket(container)
            .key(name)
            .body(S3ByteStream::from(data))
            .set_content_type(options.content_type.clone())
            .set_cache_control(options.cache_control.clone())
            .set_content_language(options.content_language.clone())
            .set_content_encoding(options.content_encoding.clone())
            .set_metadata(metadata)
            .send()
            .await
            .map_err(|e| map_sdk_error("put_object", format!("{}/{}", container, name), e))?;

        Ok(BlobProperties::from_upload(size, options, Utc::now().timestamp()))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete_blob(&self, container: &str, name: &str) -> Result<()> {
        // S3 deletes succeed for absent keys; check first so callers see NotFound
        self.get_blob_properties(container, name).await?;

        debug!(%name, "Deleting from S3");
        self.client
            .delete_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .map_err(|e| map_sdk_error("delete_object", format!("{}/{}", container, name), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_blobs(&self, container: &str, request: &ListRequest) -> Result<ListPage> {
        let max_keys = request.max_results.unwrap_or(MAX_KEYS).min(MAX_KEYS) as i32;
        let response = self
            .client
            .list_objects_v2()
            .bucket(container)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.marker.clone())
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| map_sdk_error("list_objects_v2", container.to_string(), e))?;

        let blobs = response
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| BlobItem {
                    name: key.to_string(),
                    properties: BlobProperties {
                        content_length: content_length(object.size()),
                        last_modified: timestamp(object.last_modified()),
                        ..Default::default()
                    },
                })
            })
            .collect();

        let prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(String::from))
            .collect();

        let next_marker = if response.is_truncated() == Some(true) {
            response.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok(ListPage {
            blobs,
            prefixes,
            next_marker,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn copy_blob(&self, container: &str, source: &str, destination: &str) -> Result<()> {
        let copy_source = format!("{}/{}", container, urlencoding::encode(source));
        self.client
            .copy_object()
            .bucket(container)
            .copy_source(copy_source)
            .key(destination)
            .send()
            .await
            .map_err(|e| map_sdk_error("copy_object", format!("{}/{}", container, source), e))?;

        debug!(%source, %destination, "Copied object");
        Ok(())
    }
}
