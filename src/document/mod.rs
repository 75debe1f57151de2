//! Text extraction for uploaded documents
//!
//! Accepts the same file types the chat upload control offers. PDFs are read
//! page by page; everything else must be UTF-8 text.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["txt", "md", "json", "csv", "pdf"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type '{0}'. Accepted types: .txt, .md, .json, .csv, .pdf")]
    UnsupportedType(String),

    #[error("Could not read the PDF file: {0}")]
    Pdf(String),

    #[error("The file is not valid UTF-8 text")]
    NotText,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Markdown,
    Json,
    Csv,
    Pdf,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Result<Self, DocumentError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "txt" => Ok(DocumentKind::Text),
            "md" => Ok(DocumentKind::Markdown),
            "json" => Ok(DocumentKind::Json),
            "csv" => Ok(DocumentKind::Csv),
            "pdf" => Ok(DocumentKind::Pdf),
            _ => Err(DocumentError::UnsupportedType(extension)),
        }
    }
}

/// Text pulled out of one uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub filename: String,
    pub kind: DocumentKind,
    pub text: String,
    /// Page count, PDFs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

/// Extract text from file contents. PDF parsing is CPU-bound; async callers
/// should run this on the blocking pool.
pub fn extract(filename: &str, bytes: &[u8]) -> Result<ExtractedDocument, DocumentError> {
    let kind = DocumentKind::from_filename(filename)?;

    let (text, pages) = match kind {
        DocumentKind::Pdf => {
            let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
                .map_err(|e| DocumentError::Pdf(e.to_string()))?;
            let count = pages.len();
            (join_pages(&pages), Some(count))
        }
        _ => {
            let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::NotText)?;
            (text.to_string(), None)
        }
    };

    debug!(
        "Extracted {} chars from {} ({:?}, pages={:?})",
        text.len(),
        filename,
        kind,
        pages
    );

    Ok(ExtractedDocument {
        filename: filename.to_string(),
        kind,
        text,
        pages,
    })
}

/// Read and extract a file from disk.
pub async fn extract_file(path: &Path) -> Result<ExtractedDocument, DocumentError> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    // Reject before reading a possibly large file
    DocumentKind::from_filename(&filename)?;

    let bytes = tokio::fs::read(path).await.map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;

    tokio::task::spawn_blocking(move || extract(&filename, &bytes))
        .await
        .map_err(|e| DocumentError::Pdf(format!("extraction task failed: {e}")))?
}

/// One line per page, in page order. Whitespace inside a page collapses to
/// single spaces so a page never spans more than one line.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        let words: Vec<&str> = page.as_ref().split_whitespace().collect();
        text.push_str(&words.join(" "));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("lease.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("notes.md").unwrap(), DocumentKind::Markdown);
        assert_eq!(DocumentKind::from_filename("data.csv").unwrap(), DocumentKind::Csv);

        match DocumentKind::from_filename("contract.docx") {
            Err(DocumentError::UnsupportedType(ext)) => assert_eq!(ext, "docx"),
            other => panic!("expected unsupported type, got {other:?}"),
        }
        assert!(DocumentKind::from_filename("README").is_err());
    }

    #[test]
    fn test_join_pages_one_segment_per_page() {
        let pages = vec![
            "Page one\nof the lease".to_string(),
            "  Page   two ".to_string(),
            "Page three".to_string(),
        ];
        let text = join_pages(&pages);

        let segments: Vec<&str> = text.lines().collect();
        assert_eq!(segments, vec!["Page one of the lease", "Page two", "Page three"]);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_extract_text_file() {
        let doc = extract("terms.txt", "Section 1. Term of lease.".as_bytes()).unwrap();
        assert_eq!(doc.kind, DocumentKind::Text);
        assert_eq!(doc.text, "Section 1. Term of lease.");
        assert!(doc.pages.is_none());
    }

    #[test]
    fn test_extract_rejects_binary_text() {
        let err = extract("terms.txt", &[0xff, 0xfe, 0x00, 0x80]).unwrap_err();
        assert!(matches!(err, DocumentError::NotText));
    }

    #[test]
    fn test_extract_malformed_pdf() {
        let err = extract("broken.pdf", b"this is not a pdf").unwrap_err();
        assert!(matches!(err, DocumentError::Pdf(_)));
        assert!(err.to_string().starts_with("Could not read the PDF file"));
    }

    /// Minimal PDF with one line of Helvetica text per page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let n = pages.len();
        // 1 catalog, 2 page tree, 3 font, then a (page, content) pair per page
        let page_id = |i: usize| 4 + 2 * i;
        let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_id(i))).collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), n),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                page_id(i) + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref_at = pdf.len();
        let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            trailer.push_str(&format!("{offset:010} 00000 n \n"));
        }
        trailer.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        ));
        pdf.extend_from_slice(trailer.as_bytes());
        pdf
    }

    #[test]
    fn test_extract_pdf_pages_in_order() {
        let pdf = pdf_with_pages(&["First page", "Second page", "Third page"]);

        let doc = extract("lease.pdf", &pdf).unwrap();

        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.pages, Some(3));
        let segments: Vec<&str> = doc.text.lines().collect();
        assert_eq!(segments, vec!["First page", "Second page", "Third page"]);
        assert!(doc.text.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_extract_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clauses.json");
        std::fs::write(&path, r#"{"clause":"indemnity"}"#).unwrap();

        let doc = extract_file(&path).await.unwrap();
        assert_eq!(doc.filename, "clauses.json");
        assert_eq!(doc.kind, DocumentKind::Json);
        assert!(doc.text.contains("indemnity"));
    }

    #[tokio::test]
    async fn test_extract_file_missing() {
        let err = extract_file(Path::new("/nonexistent/brief.txt")).await.unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }
}
