use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use blobfs::{
    byte_stream, collect_bytes, BlobClient, BlobPathAdapter, FilesystemAdapter, LocalBlobClient,
    MemoryBlobClient,
};
use blobfs_core::{AdapterConfig, Error, StorageAttributes, WriteConfig};
use bytes::Bytes;
use futures::TryStreamExt;

fn memory_adapter(prefix: &str) -> (Arc<MemoryBlobClient>, BlobPathAdapter) {
    let client = Arc::new(MemoryBlobClient::new().with_page_size(3));
    let adapter = BlobPathAdapter::new(client.clone(), AdapterConfig::new("docs").with_prefix(prefix))
        .expect("valid adapter config");
    (client, adapter)
}

async fn paths(adapter: &BlobPathAdapter, path: &str, deep: bool) -> Result<Vec<String>> {
    let entries: Vec<StorageAttributes> = adapter.list_contents(path, deep).try_collect().await?;
    Ok(entries.iter().map(|e| e.path().to_string()).collect())
}

#[tokio::test]
async fn test_team_documents_flow() -> Result<()> {
    blobfs_core::telemetry::init();
    let (client, adapter) = memory_adapter("team/");

    // 1. Write with explicit content type
    let result = adapter
        .write(
            "report.pdf",
            Bytes::from_static(b"%PDF-1.7 quarterly"),
            &WriteConfig::new().content_type("application/pdf"),
        )
        .await?;
    assert_eq!(result.path, "team/report.pdf");
    assert_eq!(client.blob_names("docs"), vec!["team/report.pdf"]);

    // 2. Metadata reads see logical paths
    let size = adapter.file_size("report.pdf").await?;
    assert_eq!(size.path, "report.pdf");
    assert_eq!(size.file_size, Some(18));
    let mime = adapter.mime_type("report.pdf").await?;
    assert_eq!(mime.mime_type.as_deref(), Some("application/pdf"));
    assert!(adapter.last_modified("report.pdf").await?.last_modified.is_some());

    // 3. Copy and move stay inside the prefix
    adapter.copy("report.pdf", "archive/report.pdf", &WriteConfig::new()).await?;
    adapter.move_file("report.pdf", "final.pdf", &WriteConfig::new()).await?;
    assert_eq!(
        client.blob_names("docs"),
        vec!["team/archive/report.pdf", "team/final.pdf"]
    );
    assert!(!adapter.file_exists("report.pdf").await?);
    assert_eq!(adapter.read("final.pdf").await?, Bytes::from_static(b"%PDF-1.7 quarterly"));

    // 4. Deleting a missing file fails with the blob location
    let err = adapter.delete("report.pdf").await.unwrap_err();
    assert!(matches!(err, Error::UnableToDelete { ref path, .. } if path == "team/report.pdf"));

    Ok(())
}

#[tokio::test]
async fn test_listing_and_directory_delete() -> Result<()> {
    let (client, adapter) = memory_adapter("team");
    for path in ["a.txt", "notes/1.md", "notes/2.md", "notes/old/3.md", "z.txt"] {
        adapter
            .write(path, Bytes::from_static(b"text"), &WriteConfig::new())
            .await?;
    }

    assert_eq!(paths(&adapter, "", false).await?, vec!["a.txt", "notes", "z.txt"]);
    assert_eq!(
        paths(&adapter, "notes", true).await?,
        vec!["notes/1.md", "notes/2.md", "notes/old", "notes/old/3.md"]
    );

    adapter.delete_directory("notes").await?;
    assert_eq!(client.blob_names("docs"), vec!["team/a.txt", "team/z.txt"]);
    assert_eq!(paths(&adapter, "", true).await?, vec!["a.txt", "z.txt"]);

    // Nothing left to delete is still a success
    adapter.delete_directory("notes").await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_operations_leave_store_untouched() -> Result<()> {
    let (client, adapter) = memory_adapter("");
    let err = adapter.create_directory("new", &WriteConfig::new()).await.unwrap_err();
    assert!(matches!(err, Error::Unsupported { .. }));
    assert!(!client.container_exists("docs"));
    Ok(())
}

#[tokio::test]
async fn test_local_backend_round_trip() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let client = Arc::new(LocalBlobClient::new(temp_dir.path()));
    let adapter = BlobPathAdapter::new(client.clone(), AdapterConfig::new("assets").with_prefix("site"))?;

    let mut metadata = HashMap::new();
    metadata.insert("owner".to_string(), "web".to_string());
    adapter
        .write_stream(
            "img/logo.png",
            byte_stream(Bytes::from_static(b"\x89PNG\r\n\x1a\nrest")),
            &WriteConfig::new().metadata(metadata.clone()).cache_control("max-age=60"),
        )
        .await?;
    adapter
        .write("index.html", Bytes::from_static(b"<html></html>"), &WriteConfig::new())
        .await?;

    // Sniffed from the magic bytes
    let mime = adapter.mime_type("img/logo.png").await?;
    assert_eq!(mime.mime_type.as_deref(), Some("image/png"));

    let props = client.get_blob_properties("assets", "site/img/logo.png").await?;
    assert_eq!(props.metadata, metadata);
    assert_eq!(props.cache_control.as_deref(), Some("max-age=60"));

    let stream = adapter.read_stream("img/logo.png").await?;
    assert_eq!(collect_bytes(stream).await?, Bytes::from_static(b"\x89PNG\r\n\x1a\nrest"));

    assert_eq!(paths(&adapter, "", true).await?, vec!["img", "index.html", "img/logo.png"]);

    adapter.delete_directory("img").await?;
    assert!(!adapter.file_exists("img/logo.png").await?);
    assert!(adapter.file_exists("index.html").await?);
    Ok(())
}

#[tokio::test]
async fn test_local_backend_file_and_directory_share_a_name() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let client = Arc::new(LocalBlobClient::new(temp_dir.path()));
    let adapter = BlobPathAdapter::new(client, AdapterConfig::new("docs"))?;

    adapter.write("a", Bytes::from_static(b"file"), &WriteConfig::new()).await?;
    adapter.write("a/b", Bytes::from_static(b"nested"), &WriteConfig::new()).await?;

    assert_eq!(adapter.read("a").await?, Bytes::from_static(b"file"));
    assert_eq!(adapter.read("a/b").await?, Bytes::from_static(b"nested"));
    assert_eq!(paths(&adapter, "", true).await?, vec!["a", "a", "a/b"]);
    Ok(())
}

#[tokio::test]
async fn test_adapter_from_config_file() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let config_path = temp_dir.path().join("adapter.json");
    std::fs::write(
        &config_path,
        r#"{
            "container": "media",
            "prefix": "/uploads/",
            "public_access": true,
            "retry": { "max_attempts": 2, "initial_delay": 5, "max_delay": 20, "backoff_multiplier": 2.0 }
        }"#,
    )?;

    let config = AdapterConfig::from_file(&config_path)?;
    assert_eq!(config.retry.max_attempts, 2);

    let client = Arc::new(MemoryBlobClient::new());
    let adapter = BlobPathAdapter::new(client.clone(), config)?;
    assert_eq!(adapter.container(), "media");
    assert_eq!(adapter.prefixer().prefix(), "uploads/");

    adapter
        .write("clip.txt", Bytes::from_static(b"hello"), &WriteConfig::new())
        .await?;
    assert_eq!(client.blob_names("media"), vec!["uploads/clip.txt"]);
    assert!(client.container_options("media").is_some_and(|o| o.public_access));
    Ok(())
}

#[test]
fn test_invalid_config_rejected() {
    let result = AdapterConfig::from_json_str(r#"{ "container": "" }"#);
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_concurrent_writers_share_container() -> Result<()> {
    let (client, adapter) = memory_adapter("jobs");
    let adapter = Arc::new(adapter);

    let mut handles = Vec::new();
    for i in 0..8 {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move {
            adapter
                .write(&format!("out/{}.log", i), Bytes::from(format!("run {}", i)), &WriteConfig::new())
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(client.blob_names("docs").len(), 8);
    assert_eq!(paths(&adapter, "out", false).await?.len(), 8);
    Ok(())
}
