//! Content type detection for uploads without an explicit type

use blobfs_core::DEFAULT_CONTENT_TYPE;

/// Guesses a content type for a blob about to be written
pub trait MimeTypeDetector: Send + Sync {
    /// Best guess from the bytes and logical path, or `None`
    fn detect(&self, path: &str, content: &[u8]) -> Option<String>;

    /// Like [`detect`](Self::detect), falling back to `application/octet-stream`
    fn detect_or_default(&self, path: &str, content: &[u8]) -> String {
        self.detect(path, content)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
    }
}

/// Leading byte signatures checked before anything else
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"\x00asm", "application/wasm"),
    (b"OggS", "audio/ogg"),
    (b"fLaC", "audio/flac"),
    (b"ID3", "audio/mpeg"),
];

/// Bytes inspected when deciding whether content is text
const TEXT_SNIFF_LEN: usize = 512;

/// Sniffs magic numbers, then the path extension, then plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSniffer;

impl ContentSniffer {
    pub fn new() -> Self {
        Self
    }

    fn sniff_signature(content: &[u8]) -> Option<&'static str> {
        if content.len() >= 12 && &content[0..4] == b"RIFF" && &content[8..12] == b"WEBP" {
            return Some("image/webp");
        }
        SIGNATURES
            .iter()
            .find(|(magic, _)| content.starts_with(magic))
            .map(|(_, mime)| *mime)
    }

    fn looks_like_text(content: &[u8]) -> bool {
        let head = &content[..content.len().min(TEXT_SNIFF_LEN)];
        !head.is_empty()
            && !head.contains(&0)
            && match std::str::from_utf8(head) {
                Ok(_) => true,
                // A multi-byte character cut at the sniff boundary is still text
                Err(e) => e.error_len().is_none(),
            }
    }
}

impl MimeTypeDetector for ContentSniffer {
    fn detect(&self, path: &str, content: &[u8]) -> Option<String> {
        if let Some(mime) = Self::sniff_signature(content) {
            return Some(mime.to_string());
        }
        if let Some(mime) = mime_guess::from_path(path).first() {
            return Some(mime.to_string());
        }
        if Self::looks_like_text(content) {
            return Some("text/plain".to_string());
        }
        None
    }
}
