//! Upload validation: file name extension plus content sniffing.

use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

pub const ALLOWED_EXTENSION: &str = ".mp4";
pub const ALLOWED_MIME_PREFIX: &str = "video/mp4";

/// Number of leading bytes inspected when sniffing content.
const SNIFF_LEN: usize = 512;

const MIME_MP4: &str = "video/mp4";
const MIME_TEXT: &str = "text/plain; charset=utf-8";
const MIME_BINARY: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid file format: {file_name}")]
    Extension { file_name: String },

    #[error("invalid MIME type: {detected}")]
    MimeType { detected: String },

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    extension: String,
    mime_prefix: String,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(ALLOWED_EXTENSION, ALLOWED_MIME_PREFIX)
    }
}

impl FileValidator {
    pub fn new(extension: impl Into<String>, mime_prefix: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            mime_prefix: mime_prefix.into(),
        }
    }

    /// Checks the name first, then the sniffed content type.
    ///
    /// The reader is rewound to the start on success so the caller can copy
    /// the whole upload afterwards.
    pub async fn validate<F>(&self, file_name: &str, file: &mut F) -> Result<(), ValidationError>
    where
        F: AsyncRead + AsyncSeek + Unpin,
    {
        if !file_name.ends_with(&self.extension) {
            return Err(ValidationError::Extension {
                file_name: file_name.to_string(),
            });
        }

        let mut buf = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        file.seek(SeekFrom::Start(0)).await?;

        let detected = sniff_content_type(&buf[..filled]);
        if !detected.starts_with(&self.mime_prefix) {
            return Err(ValidationError::MimeType {
                detected: detected.to_string(),
            });
        }

        Ok(())
    }
}

/// Best-effort content type detection over a content prefix.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    if is_mp4(data) {
        MIME_MP4
    } else if data.iter().all(|b| !is_binary_byte(*b)) {
        MIME_TEXT
    } else {
        MIME_BINARY
    }
}

/// ISO base media file whose leading `ftyp` box lists an `mp4*` brand.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }

    // major brand at 8, minor version at 12, compatible brands after that
    let mut offset = 8;
    while offset + 4 <= box_size {
        if offset != 12 && &data[offset..offset + 3] == b"mp4" {
            return true;
        }
        offset += 4;
    }
    false
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Minimal `ftyp` box followed by some payload.
    pub(crate) fn mp4_bytes(payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&24u32.to_be_bytes());
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&512u32.to_be_bytes());
        data.extend_from_slice(b"isommp42");
        data.extend_from_slice(payload);
        data
    }

    #[tokio::test]
    async fn test_accepts_mp4() {
        let mut file = Cursor::new(mp4_bytes(b"mdat"));
        let result = FileValidator::default()
            .validate("holiday.mp4", &mut file)
            .await;
        assert!(result.is_ok());
        assert_eq!(file.position(), 0);
    }

    #[tokio::test]
    async fn test_rejects_extension_even_with_mp4_content() {
        let mut file = Cursor::new(mp4_bytes(b""));
        let result = FileValidator::default()
            .validate("holiday.mov", &mut file)
            .await;
        assert!(matches!(result, Err(ValidationError::Extension { .. })));
    }

    #[tokio::test]
    async fn test_rejects_text_named_like_video() {
        let mut file = Cursor::new(b"just some notes\n".to_vec());
        let result = FileValidator::default()
            .validate("notes.mp4", &mut file)
            .await;
        match result {
            Err(ValidationError::MimeType { detected }) => {
                assert!(detected.starts_with("text/plain"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_upload() {
        let mut file = Cursor::new(Vec::new());
        let result = FileValidator::default().validate("empty.mp4", &mut file).await;
        assert!(matches!(result, Err(ValidationError::MimeType { .. })));
    }

    #[test]
    fn test_sniff_rejects_other_brands() {
        let mut data = Vec::new();
        data.extend_from_slice(&20u32.to_be_bytes());
        data.extend_from_slice(b"ftypqt  ");
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"qt  ");
        assert_eq!(sniff_content_type(&data), MIME_BINARY);
    }

    #[test]
    fn test_sniff_ignores_minor_version() {
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(b"mp41");
        assert_eq!(sniff_content_type(&data), MIME_BINARY);
    }

    #[test]
    fn test_sniff_truncated_box() {
        let data = mp4_bytes(b"");
        assert_eq!(sniff_content_type(&data[..16]), MIME_BINARY);
    }
}
