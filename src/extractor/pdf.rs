//! PDF text extraction
//!
//! Each page's content stream is decoded into operators. Every string shown by
//! `Tj`, `'` or `"` is one text item, and so is every `TJ` array, split where
//! its spacing adjustment is wide enough to be a word gap.

use crate::error::ExtractionError;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use std::collections::BTreeMap;

/// `TJ` adjustments below this (thousandths of a text unit) separate items
const WORD_GAP: f32 = -100.0;

/// Extract text from PDF bytes
///
/// Pages are visited in page-number order. Within a page, text items are
/// joined by single spaces; pages are joined by newlines.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let pages = doc.get_pages();
    tracing::debug!("Extracting text from {} PDF pages", pages.len());

    let mut page_texts = Vec::with_capacity(pages.len());
    for (page_number, page_id) in pages {
        let items = page_items(&doc, page_id)
            .map_err(|e| ExtractionError::Pdf(format!("page {}: {}", page_number, e)))?;
        page_texts.push(items.join(" "));
    }

    Ok(page_texts.join("\n"))
}

fn page_items(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name, encoding)),
            Err(e) => {
                tracing::debug!(
                    "No encoding for font {}: {}",
                    String::from_utf8_lossy(&name),
                    e
                );
                None
            }
        })
        .collect();

    let content = Content::decode(&doc.get_page_content(page_id)?)?;
    Ok(collect_items(&content.operations, |font, bytes| {
        match font.and_then(|name| encodings.get(name)) {
            Some(encoding) => Document::decode_text(encoding, bytes)
                .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
            None => String::from_utf8_lossy(bytes).into_owned(),
        }
    }))
}

/// Walk text-showing operators, decoding strings with the font set by `Tf`
fn collect_items<F>(operations: &[Operation], decode: F) -> Vec<String>
where
    F: Fn(Option<&[u8]>, &[u8]) -> String,
{
    let mut items = Vec::new();
    let mut font: Option<&[u8]> = None;

    for operation in operations {
        match operation.operator.as_str() {
            "Tf" => {
                font = operation.operands.first().and_then(|o| o.as_name().ok());
            }
            "Tj" | "'" | "\"" => {
                // `"` carries two spacing operands before the string.
                if let Some(Object::String(bytes, _)) = operation.operands.last() {
                    push_item(&mut items, &decode(font, bytes));
                }
            }
            "TJ" => {
                let Some(Object::Array(parts)) = operation.operands.first() else {
                    continue;
                };
                let mut current = String::new();
                for part in parts {
                    match part {
                        Object::String(bytes, _) => current.push_str(&decode(font, bytes)),
                        other => {
                            if adjustment(other).is_some_and(|gap| gap < WORD_GAP) {
                                push_item(&mut items, &current);
                                current.clear();
                            }
                        }
                    }
                }
                push_item(&mut items, &current);
            }
            _ => {}
        }
    }

    items
}

fn adjustment(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let item = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !item.is_empty() {
        items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    fn lossy(_font: Option<&[u8]>, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    #[test]
    fn test_each_tj_is_an_item() {
        let operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![text("Hello")]),
            Operation::new("Td", vec![Object::Integer(0), Object::Integer(-14)]),
            Operation::new("Tj", vec![text("World")]),
            Operation::new("ET", vec![]),
        ];
        assert_eq!(collect_items(&operations, lossy), vec!["Hello", "World"]);
    }

    #[test]
    fn test_tj_array_splits_on_word_gaps_only() {
        let operations = vec![Operation::new(
            "TJ",
            vec![Object::Array(vec![
                text("Rev"),
                Object::Integer(-20),
                text("enue"),
                Object::Real(-250.0),
                text("grew"),
            ])],
        )];
        assert_eq!(collect_items(&operations, lossy), vec!["Revenue", "grew"]);
    }

    #[test]
    fn test_quote_operators_and_blank_items() {
        let operations = vec![
            Operation::new("Tj", vec![text("   ")]),
            Operation::new("'", vec![text("next line")]),
            Operation::new(
                "\"",
                vec![Object::Integer(1), Object::Integer(0), text(" spaced  out ")],
            ),
        ];
        assert_eq!(
            collect_items(&operations, lossy),
            vec!["next line", "spaced out"]
        );
    }

    #[test]
    fn test_font_name_reaches_decoder() {
        let operations = vec![
            Operation::new("Tj", vec![text("a")]),
            Operation::new("Tf", vec![Object::Name(b"F2".to_vec()), Object::Integer(12)]),
            Operation::new("Tj", vec![text("b")]),
        ];
        let items = collect_items(&operations, |font, bytes| {
            format!(
                "{}:{}",
                font.map(|f| String::from_utf8_lossy(f).into_owned())
                    .unwrap_or_default(),
                String::from_utf8_lossy(bytes)
            )
        });
        assert_eq!(items, vec![":a", "F2:b"]);
    }

    #[test]
    fn test_garbage_is_pdf_error() {
        let err = extract_pdf_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf(_)));
    }
}
