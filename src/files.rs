//! Attachment inputs and their normalization into multipart-ready parts.
//!
//! Every supported source is reduced to a [`NormalizedFile`]: a file name, the
//! full content, and a content type. File handles are opened and released
//! inside [`normalize`].

use std::{
    fmt,
    path::{Path, PathBuf},
};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

pub const DEFAULT_FILE_NAME: &str = "attachment";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// One file to attach.
pub enum FileInput {
    /// A local file. Missing or unreadable paths are an error.
    Path(PathBuf),
    /// Content already in memory. `name` falls back to [`DEFAULT_FILE_NAME`].
    Bytes {
        name: Option<String>,
        content: Vec<u8>,
    },
    /// An already-open reader with a known original name and MIME type.
    Stream {
        reader: BoxedReader,
        file_name: String,
        mime_type: String,
    },
}

impl FileInput {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        FileInput::Path(path.into())
    }

    pub fn bytes(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        FileInput::Bytes {
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn content(content: impl Into<Vec<u8>>) -> Self {
        FileInput::Bytes {
            name: None,
            content: content.into(),
        }
    }

    pub fn stream(
        reader: impl AsyncRead + Send + Unpin + 'static,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        FileInput::Stream {
            reader: Box::new(reader),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Treats `value` as a path when a file exists there, otherwise as literal
    /// content.
    ///
    /// This cannot tell a path that happens to exist from literal content that
    /// looks like one. Prefer [`FileInput::path`] or [`FileInput::content`]
    /// whenever the caller knows which it has.
    pub fn from_path_or_content(value: &str) -> Self {
        let candidate = Path::new(value);
        if candidate.is_file() {
            FileInput::Path(candidate.to_path_buf())
        } else {
            FileInput::content(value.as_bytes().to_vec())
        }
    }

    /// Name used in audit markers, resolved without touching the file.
    pub fn display_name(&self) -> String {
        match self {
            FileInput::Path(path) => base_name(path),
            FileInput::Bytes { name, .. } => name
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            FileInput::Stream { file_name, .. } => file_name.clone(),
        }
    }
}

impl fmt::Debug for FileInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileInput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileInput::Bytes { name, content } => f
                .debug_struct("Bytes")
                .field("name", name)
                .field("len", &content.len())
                .finish(),
            FileInput::Stream {
                file_name,
                mime_type,
                ..
            } => f
                .debug_struct("Stream")
                .field("file_name", file_name)
                .field("mime_type", mime_type)
                .finish_non_exhaustive(),
        }
    }
}

impl From<PathBuf> for FileInput {
    fn from(value: PathBuf) -> Self {
        FileInput::Path(value)
    }
}

impl From<&Path> for FileInput {
    fn from(value: &Path) -> Self {
        FileInput::Path(value.to_path_buf())
    }
}

/// What a call site attaches: a single input or an ordered list.
#[derive(Debug)]
pub enum Attachments {
    One(FileInput),
    Many(Vec<FileInput>),
}

impl Attachments {
    pub fn into_vec(self) -> Vec<FileInput> {
        match self {
            Attachments::One(input) => vec![input],
            Attachments::Many(inputs) => inputs,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Attachments::One(_) => 1,
            Attachments::Many(inputs) => inputs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Multipart field name required by the upstream API for this many files.
    pub fn field_name(&self) -> &'static str {
        if self.len() > 1 {
            "files"
        } else {
            "file"
        }
    }

    /// Audit marker describing the attachments without their content.
    pub fn marker(&self) -> Option<String> {
        let first = match self {
            Attachments::One(input) => input,
            Attachments::Many(inputs) => inputs.first()?,
        };
        let name = first.display_name();
        let extra = self.len() - 1;
        if extra > 0 {
            Some(format!("[FILE ATTACHED: {name} (+{extra} more)]"))
        } else {
            Some(format!("[FILE ATTACHED: {name}]"))
        }
    }
}

impl From<FileInput> for Attachments {
    fn from(value: FileInput) -> Self {
        Attachments::One(value)
    }
}

impl From<Vec<FileInput>> for Attachments {
    fn from(value: Vec<FileInput>) -> Self {
        Attachments::Many(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFile {
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

pub async fn normalize(input: FileInput) -> Result<NormalizedFile> {
    match input {
        FileInput::Stream {
            mut reader,
            file_name,
            mime_type,
        } => {
            let mut content = Vec::new();
            reader
                .read_to_end(&mut content)
                .await
                .map_err(|source| Error::StreamRead {
                    name: file_name.clone(),
                    source,
                })?;
            Ok(NormalizedFile {
                name: file_name,
                content,
                content_type: mime_type,
            })
        }
        FileInput::Path(path) => {
            let content = tokio::fs::read(&path)
                .await
                .map_err(|source| Error::FileRead {
                    path: path.clone(),
                    source,
                })?;
            let name = base_name(&path);
            let content_type = detect_content_type(&content, Some(&name));
            Ok(NormalizedFile {
                name,
                content,
                content_type,
            })
        }
        FileInput::Bytes { name, content } => {
            let content_type = detect_content_type(&content, name.as_deref());
            Ok(NormalizedFile {
                name: name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
                content,
                content_type,
            })
        }
    }
}

/// Magic bytes first, then the file extension, then octet-stream.
pub fn detect_content_type(content: &[u8], name: Option<&str>) -> String {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }
    name.and_then(|name| mime_guess::from_path(name).first_raw())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::tempdir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[tokio::test]
    async fn normalize_path_reads_file_and_detects_type() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "hello")?;

        let file = normalize(FileInput::path(&path)).await?;
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.content, b"hello");
        assert_eq!(file.content_type, "text/plain");
        Ok(())
    }

    #[tokio::test]
    async fn normalize_path_prefers_magic_bytes() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("image.bin");
        std::fs::write(&path, PNG_HEADER)?;

        let file = normalize(FileInput::path(&path)).await?;
        assert_eq!(file.content_type, "image/png");
        Ok(())
    }

    #[tokio::test]
    async fn normalize_missing_path_is_an_error() {
        let err = normalize(FileInput::path("does-not-exist.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
        assert!(err.to_string().contains("does-not-exist.pdf"));
    }

    #[tokio::test]
    async fn normalize_unnamed_bytes_uses_placeholder() -> anyhow::Result<()> {
        let file = normalize(FileInput::content(b"plain words".to_vec())).await?;
        assert_eq!(file.name, DEFAULT_FILE_NAME);
        assert_eq!(file.content_type, DEFAULT_CONTENT_TYPE);
        Ok(())
    }

    #[tokio::test]
    async fn normalize_named_bytes_uses_extension() -> anyhow::Result<()> {
        let file = normalize(FileInput::bytes("report.csv", "a,b\n1,2\n")).await?;
        assert_eq!(file.name, "report.csv");
        assert_eq!(file.content_type, "text/csv");
        Ok(())
    }

    #[tokio::test]
    async fn normalize_stream_keeps_declared_metadata() -> anyhow::Result<()> {
        let input = FileInput::stream(Cursor::new(b"%PDF-ish".to_vec()), "upload.pdf", "application/pdf");
        let file = normalize(input).await?;
        assert_eq!(file.name, "upload.pdf");
        assert_eq!(file.content, b"%PDF-ish");
        assert_eq!(file.content_type, "application/pdf");
        Ok(())
    }

    #[test]
    fn from_path_or_content_falls_back_to_literal() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("exists.txt");
        std::fs::write(&path, "x")?;

        let existing = FileInput::from_path_or_content(path.to_str().unwrap());
        assert!(matches!(existing, FileInput::Path(_)));

        let literal = FileInput::from_path_or_content("just some text");
        match literal {
            FileInput::Bytes { name, content } => {
                assert!(name.is_none());
                assert_eq!(content, b"just some text");
            }
            other => panic!("expected bytes, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn field_name_follows_resolved_count() {
        let single = Attachments::One(FileInput::content(b"a".to_vec()));
        assert_eq!(single.field_name(), "file");

        let wrapped = Attachments::Many(vec![FileInput::content(b"a".to_vec())]);
        assert_eq!(wrapped.field_name(), "file");

        let many = Attachments::Many(vec![
            FileInput::bytes("a.txt", "a"),
            FileInput::bytes("b.txt", "b"),
        ]);
        assert_eq!(many.field_name(), "files");
    }

    #[test]
    fn marker_names_first_file_and_extra_count() {
        let many = Attachments::Many(vec![
            FileInput::bytes("a.txt", "alpha"),
            FileInput::bytes("b.txt", "beta"),
            FileInput::path("/tmp/c.txt"),
        ]);
        assert_eq!(many.marker().as_deref(), Some("[FILE ATTACHED: a.txt (+2 more)]"));

        let one = Attachments::One(FileInput::path("/var/data/report.pdf"));
        assert_eq!(one.marker().as_deref(), Some("[FILE ATTACHED: report.pdf]"));

        assert_eq!(Attachments::Many(Vec::new()).marker(), None);
    }
}
