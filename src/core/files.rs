use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use crate::core::constants::MAX_FILE_SIZE;
use crate::storage::{KeyValueStore, KEY_FILES};

/// Document and image types accepted for upload.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    UnsupportedType,
    TooLarge,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FileError::UnsupportedType => {
                "不支持的文件类型。请上传 TXT、MD、DOC、DOCX、PDF 或 JPG、PNG、GIF、WebP、SVG 图片。"
            }
            FileError::TooLarge => "文件大小不能超过 5MB。",
        };
        write!(f, "{text}")
    }
}

impl StdError for FileError {}

/// A stored upload. Content is held base64-encoded, the way it is persisted;
/// uploads are kept for later use and are not part of the send path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedFile {
    /// Validates and wraps raw file bytes for storage.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, FileError> {
        let mime_type = mime_type.into();
        validate(&mime_type, bytes.len() as u64)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content: BASE64.encode(bytes),
            mime_type,
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        })
    }
}

/// Checks a candidate upload against the MIME allow-list and size ceiling.
pub fn validate(mime_type: &str, size: u64) -> Result<(), FileError> {
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(FileError::UnsupportedType);
    }
    if size > MAX_FILE_SIZE {
        return Err(FileError::TooLarge);
    }
    Ok(())
}

/// Maps a file extension to the MIME type the allow-list knows it by.
/// Returns `None` for extensions outside the accepted set.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime)
}

/// The persisted collection of uploads, stored under `uploadedFiles`.
#[derive(Debug, Default)]
pub struct FileLibrary {
    files: Vec<UploadedFile>,
}

impl FileLibrary {
    pub fn load<S: KeyValueStore>(store: &S) -> Self {
        let files = match store.get(KEY_FILES) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(files) => files,
                Err(err) => {
                    warn!("stored uploads are unreadable, starting empty: {err}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("could not read stored uploads, starting empty: {err}");
                Vec::new()
            }
        };
        Self { files }
    }

    /// Appends an upload and persists the collection.
    pub fn add<S: KeyValueStore>(&mut self, store: &mut S, file: UploadedFile) {
        self.files.push(file);
        match serde_json::to_string(&self.files) {
            Ok(json) => {
                if let Err(err) = store.set(KEY_FILES, &json) {
                    warn!("failed to persist uploads: {err}");
                }
            }
            Err(err) => warn!("failed to encode uploads: {err}"),
        }
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn disallowed_types_are_rejected() {
        assert_eq!(
            validate("application/zip", 10),
            Err(FileError::UnsupportedType)
        );
        assert_eq!(validate("video/mp4", 10), Err(FileError::UnsupportedType));
        assert!(validate("application/pdf", 10).is_ok());
    }

    #[test]
    fn size_ceiling_is_five_megabytes() {
        assert!(validate("text/plain", MAX_FILE_SIZE).is_ok());
        assert_eq!(
            validate("text/plain", MAX_FILE_SIZE + 1),
            Err(FileError::TooLarge)
        );
    }

    #[test]
    fn uploads_are_stored_base64_encoded() {
        let file = UploadedFile::from_bytes("notes.txt", "text/plain", b"hello").unwrap();
        assert_eq!(file.content, "aGVsbG8=");
        assert_eq!(file.size, 5);
        assert_eq!(file.mime_type, "text/plain");
    }

    #[test]
    fn library_round_trips_through_the_store() {
        let mut store = MemoryStore::new();
        let mut library = FileLibrary::load(&store);
        let file = UploadedFile::from_bytes("a.md", "text/markdown", b"# hi").unwrap();
        library.add(&mut store, file.clone());

        let reloaded = FileLibrary::load(&store);
        assert_eq!(reloaded.files(), &[file]);
    }

    #[test]
    fn extensions_map_to_allowed_mime_types() {
        assert_eq!(
            mime_type_for_path(Path::new("photo.JPG")),
            Some("image/jpeg")
        );
        assert_eq!(
            mime_type_for_path(Path::new("doc.docx")),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        );
        assert_eq!(mime_type_for_path(Path::new("archive.zip")), None);
        assert_eq!(mime_type_for_path(Path::new("noext")), None);
    }
}
