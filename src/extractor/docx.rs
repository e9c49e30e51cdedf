//! Word-processor (OOXML) text extraction
//!
//! A `.docx` file is a zip package; the body lives in `word/document.xml`.
//! Only character data survives: runs are concatenated, tabs and breaks become
//! whitespace, and each paragraph ends with a newline.

use crate::error::ExtractionError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract raw text from a Word-processor XML document
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Document(format!("not a document package: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::Document(format!("missing {}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::Document(format!("unreadable {}: {}", DOCUMENT_PART, e)))?;

    document_xml_to_text(&xml)
}

/// Convert the body XML of a document to plain text
pub fn document_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractionError::Document(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::CData(c)) if in_text_run => {
                out.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractionError::Document(format!(
                    "malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_and_runs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
    <w:p><w:r><w:t>Revenue</w:t><w:tab/><w:t>up &amp; right</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let text = document_xml_to_text(xml).unwrap();
        assert_eq!(text, "Quarterly report\nRevenue\tup & right");
    }

    #[test]
    fn test_whitespace_outside_runs_is_ignored() {
        let xml = "<w:document><w:body>\n  <w:p>\n    <w:r><w:t>Only</w:t></w:r>\n  </w:p>\n</w:body></w:document>";
        assert_eq!(document_xml_to_text(xml).unwrap(), "Only");
    }

    #[test]
    fn test_line_break() {
        let xml = "<w:p><w:r><w:t>a</w:t><w:br/><w:t>b</w:t></w:r></w:p>";
        assert_eq!(document_xml_to_text(xml).unwrap(), "a\nb");
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let err = document_xml_to_text("<w:p><w:t>oops</w:p>").unwrap_err();
        assert!(matches!(err, ExtractionError::Document(_)));
    }

    #[test]
    fn test_not_a_zip_is_error() {
        let err = extract_docx_text(b"plain bytes").unwrap_err();
        assert!(matches!(err, ExtractionError::Document(_)));
    }
}
