use lopdf::content::Content;
use lopdf::{Document, Object};
use unicode_normalization::UnicodeNormalization;

use crate::error::PipelineError;

/// Extract text fragments from raw PDF bytes, one per text-showing
/// operator, in draw order. Draw order is not reading order: the caller
/// gets an unordered-looking flat list and must reconstruct structure
/// from label positions.
///
/// Every fragment is NFKD-normalized so downstream matching is stable
/// across composed and decomposed diacritics.
pub fn extract_fragments(bytes: &[u8]) -> Result<Vec<String>, PipelineError> {
    let doc =
        Document::load_mem(bytes).map_err(|e| PipelineError::Extraction(e.to_string()))?;

    let mut fragments = Vec::new();
    for (_page_num, page_id) in doc.get_pages() {
        let content_bytes = doc
            .get_page_content(page_id)
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;
        let content = Content::decode(&content_bytes)
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;

        for operation in &content.operations {
            match operation.operator.as_str() {
                // Text-showing operators; each one is one fragment.
                "Tj" | "TJ" | "'" | "\"" => {
                    let mut text = String::new();
                    for operand in &operation.operands {
                        if let Some(s) = decode_text_object(operand) {
                            text.push_str(&s);
                        }
                    }
                    if !text.trim().is_empty() {
                        fragments.push(normalize_fragment(&text));
                    }
                }
                _ => {}
            }
        }
    }

    if fragments.is_empty() {
        return Err(PipelineError::Extraction(
            "no text content in document".into(),
        ));
    }
    Ok(fragments)
}

/// NFKD-normalize and fix the source's recurring misspelling so the
/// parser only ever sees one spelling of "infringement".
fn normalize_fragment(raw: &str) -> String {
    raw.nfkd()
        .collect::<String>()
        .replace("Infringment", "Infringement")
        .replace("infringment", "infringement")
}

/// Decode a PDF string object: UTF-16BE when BOM-prefixed, otherwise
/// byte-wise Latin-1 / PDFDocEncoding. TJ arrays mix strings with
/// positioning numbers; the numbers are skipped.
fn decode_text_object(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => {
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks(2)
                    .filter(|c| c.len() == 2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            } else {
                Some(bytes.iter().map(|&b| b as char).collect())
            }
        }
        Object::Array(arr) => {
            let mut result = String::new();
            for item in arr {
                if let Some(s) = decode_text_object(item) {
                    result.push_str(&s);
                }
            }
            if result.is_empty() { None } else { Some(result) }
        }
        _ => None,
    }
}

// ── Tests ──
