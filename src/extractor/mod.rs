//! Document extraction for attachments
//!
//! Turns an uploaded file into plain text that can be injected as context for
//! the next outgoing message. Dispatch is by declared media type:
//!
//! - `application/pdf`: page text via [`pdf::extract_pdf_text`]
//! - Word-processor XML: body text via [`docx::extract_docx_text`]
//! - anything else: the raw bytes read as UTF-8
//!
//! Parsing can take a while for large documents, so [`extract_file`] runs it on
//! the blocking pool. Only the most recent request matters: an
//! [`ExtractionSlot`] hands out tickets and rejects results from superseded ones.

use crate::error::ExtractionError;
use std::path::{Path, PathBuf};

pub mod docx;
pub mod pdf;

/// Media type for PDF documents
pub const MIME_PDF: &str = "application/pdf";

/// Media type for Word-processor XML documents (`.docx`)
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Media type for legacy Word documents (`.doc`)
pub const MIME_MSWORD: &str = "application/msword";

/// Media type used when nothing more specific is known
pub const MIME_TEXT: &str = "text/plain";

/// Text extracted from an uploaded file, waiting to be sent
///
/// Lives only until the next send or explicit removal; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name as shown to the user
    pub name: String,
    /// Plain text content of the file
    pub extracted_text: String,
    /// Declared media type used for dispatch
    pub mime_type: String,
}

/// How a document's bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format
    Pdf,
    /// Word-processor XML package
    WordProcessor,
    /// Anything else, read as UTF-8 text
    PlainText,
}

impl DocumentKind {
    /// Choose the extraction strategy for a declared media type
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::extractor::{DocumentKind, MIME_DOCX};
    ///
    /// assert_eq!(DocumentKind::from_mime("application/pdf"), DocumentKind::Pdf);
    /// assert_eq!(DocumentKind::from_mime(MIME_DOCX), DocumentKind::WordProcessor);
    /// assert_eq!(DocumentKind::from_mime("text/csv"), DocumentKind::PlainText);
    /// ```
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        if mime == MIME_PDF {
            Self::Pdf
        } else if mime.contains("wordprocessingml") || mime == MIME_MSWORD {
            Self::WordProcessor
        } else {
            Self::PlainText
        }
    }
}

/// Derive a declared media type from a file's extension
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "doc" => MIME_MSWORD,
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        _ => MIME_TEXT,
    }
}

/// Extract plain text from file bytes according to the declared media type
///
/// # Errors
///
/// Returns `ExtractionError::Pdf` or `ExtractionError::Document` when the
/// bytes cannot be parsed as the declared type
///
/// # Examples
///
/// ```
/// use chatdeck::extractor::extract_bytes;
///
/// let text = extract_bytes("text/plain", "Q1 results".as_bytes()).unwrap();
/// assert_eq!(text, "Q1 results");
/// ```
pub fn extract_bytes(mime_type: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
    match DocumentKind::from_mime(mime_type) {
        DocumentKind::Pdf => pdf::extract_pdf_text(bytes),
        DocumentKind::WordProcessor => docx::extract_docx_text(bytes),
        DocumentKind::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Read and extract a file into an [`Attachment`]
///
/// The read is asynchronous and the parse runs on the blocking pool.
///
/// # Errors
///
/// Returns `ExtractionError::Read` if the file cannot be read,
/// `ExtractionError::TooLarge` if it exceeds `max_bytes`, or a parse error
pub async fn extract_file(path: PathBuf, max_bytes: u64) -> Result<Attachment, ExtractionError> {
    let display_path = path.display().to_string();
    let read_error = |e: std::io::Error| ExtractionError::Read {
        path: display_path.clone(),
        message: e.to_string(),
    };

    let metadata = tokio::fs::metadata(&path).await.map_err(read_error)?;
    if metadata.len() > max_bytes {
        return Err(ExtractionError::TooLarge {
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(&path).await.map_err(read_error)?;
    let mime_type = mime_type_for_path(&path).to_string();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| display_path.clone());

    tracing::debug!("Extracting {} ({}, {} bytes)", name, mime_type, bytes.len());

    let dispatch_mime = mime_type.clone();
    let extracted_text = tokio::task::spawn_blocking(move || extract_bytes(&dispatch_mime, &bytes))
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))??;

    Ok(Attachment {
        name,
        extracted_text,
        mime_type,
    })
}

/// Identifies one extraction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtractionTicket(u64);

/// Tracks which extraction request is current
///
/// Each call to [`ExtractionSlot::begin`] supersedes all earlier tickets.
#[derive(Debug, Default)]
pub struct ExtractionSlot {
    issued: u64,
    pending: Option<ExtractionTicket>,
}

impl ExtractionSlot {
    /// Create a slot with nothing in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding any unfinished one
    pub fn begin(&mut self) -> ExtractionTicket {
        self.issued += 1;
        let ticket = ExtractionTicket(self.issued);
        if let Some(previous) = self.pending.replace(ticket) {
            tracing::debug!("Extraction {:?} superseded by {:?}", previous, ticket);
        }
        ticket
    }

    /// Finish a request, returning whether its result should be kept
    ///
    /// A stale ticket leaves the current request pending.
    pub fn finish(&mut self, ticket: ExtractionTicket) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Returns true while the latest request is still running
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("a/report.PDF")), MIME_PDF);
        assert_eq!(mime_type_for_path(Path::new("notes.docx")), MIME_DOCX);
        assert_eq!(mime_type_for_path(Path::new("old.doc")), MIME_MSWORD);
        assert_eq!(mime_type_for_path(Path::new("readme")), MIME_TEXT);
        assert_eq!(mime_type_for_path(Path::new("data.csv")), "text/csv");
    }

    #[test]
    fn test_plain_text_replaces_invalid_utf8() {
        let text = extract_bytes(MIME_TEXT, &[b'o', b'k', 0xFF]).unwrap();
        assert_eq!(text, "ok\u{FFFD}");
    }

    #[test]
    fn test_declared_pdf_with_text_bytes_fails() {
        let err = extract_bytes(MIME_PDF, b"hello").unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf(_)));
    }

    #[test]
    fn test_legacy_word_binary_fails() {
        let err = extract_bytes(MIME_MSWORD, &[0xD0, 0xCF, 0x11, 0xE0]).unwrap_err();
        assert!(matches!(err, ExtractionError::Document(_)));
    }

    #[test]
    fn test_slot_latest_ticket_wins() {
        let mut slot = ExtractionSlot::new();
        let first = slot.begin();
        let second = slot.begin();
        assert!(slot.is_pending());

        assert!(!slot.finish(first));
        assert!(slot.is_pending());
        assert!(slot.finish(second));
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_slot_finish_twice() {
        let mut slot = ExtractionSlot::new();
        let ticket = slot.begin();
        assert!(slot.finish(ticket));
        assert!(!slot.finish(ticket));
    }

    #[tokio::test]
    async fn test_extract_file_plain_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "Q1 results").unwrap();

        let attachment = extract_file(path, 1024).await.unwrap();
        assert_eq!(attachment.name, "report.txt");
        assert_eq!(attachment.extracted_text, "Q1 results");
        assert_eq!(attachment.mime_type, MIME_TEXT);
    }

    #[tokio::test]
    async fn test_extract_file_too_large() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "0123456789").unwrap();

        let err = extract_file(path, 4).await.unwrap_err();
        assert_eq!(err, ExtractionError::TooLarge { size: 10, limit: 4 });
    }

    #[tokio::test]
    async fn test_extract_file_missing() {
        let err = extract_file(PathBuf::from("/definitely/not/here.txt"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Read { .. }));
    }
}
