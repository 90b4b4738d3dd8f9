//! Text extraction for uploaded documents.
//!
//! Uploads arrive as bytes plus a filename; this module returns plain UTF-8
//! text keyed off the file extension. Plain text and Markdown pass through,
//! PDFs go through `pdf-extract`, and DOCX files are unzipped and their
//! `w:t` runs collected with a streaming XML reader. ZIP entry reads are
//! byte-bounded to keep crafted archives from ballooning in memory.

use std::io::Read;

use crate::error::{DocsiftError, Result};

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Lowercased extension of `filename`, if any.
pub fn extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Extract plain text from an uploaded file's bytes.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String> {
    let ext = extension(filename).ok_or_else(|| DocsiftError::UnsupportedExtension {
        filename: filename.to_string(),
    })?;

    match ext.as_str() {
        "txt" | "md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "pdf" => extract_pdf(filename, bytes),
        "docx" => extract_docx(filename, bytes),
        _ => Err(DocsiftError::UnsupportedExtension {
            filename: filename.to_string(),
        }),
    }
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocsiftError::ExtractionFailed {
        filename: filename.to_string(),
        reason: e.to_string(),
    })
}

fn extract_docx(filename: &str, bytes: &[u8]) -> Result<String> {
    let fail = |reason: String| DocsiftError::ExtractionFailed {
        filename: filename.to_string(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| fail(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| fail("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| fail(e.to_string()))?;
    }
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(fail("word/document.xml exceeds size limit".to_string()));
    }

    extract_w_t_elements(&doc_xml).map_err(fail)
}

/// Collect the text of every `w:t` run, separating paragraphs with newlines.
fn extract_w_t_elements(xml: &[u8]) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        let text = extract_text("notes.txt", b"hello world").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn markdown_passthrough() {
        let text = extract_text("README.md", b"# Title\n\nBody").unwrap();
        assert!(text.contains("# Title"));
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(extension("Report.TXT").as_deref(), Some("txt"));
        assert_eq!(extension("paper.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension("no_extension"), None);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = extract_text("script.exe", b"MZ").unwrap_err();
        assert!(matches!(err, DocsiftError::UnsupportedExtension { .. }));
    }

    #[test]
    fn invalid_pdf_returns_extraction_error() {
        let err = extract_text("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, DocsiftError::ExtractionFailed { .. }));
    }

    #[test]
    fn invalid_docx_returns_extraction_error() {
        let err = extract_text("broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, DocsiftError::ExtractionFailed { .. }));
    }
}
