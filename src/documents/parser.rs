//! Document parsing: raw upload bytes to ordered page texts.
//!
//! PDF pages come from `pdf-extract` (form-feed page breaks), DOCX text is
//! pulled from the OOXML body with `zip` + `quick-xml`, and plain text or
//! markdown passes through verbatim. Anything else is rejected as
//! unsupported before any state changes.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::core::errors::ApiError;
use crate::rag::chunker::PageText;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "md"];

/// Lowercased extension of a filename, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn is_allowed(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

/// Reduce an uploaded filename to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse raw bytes into ordered page texts based on the file extension.
pub fn parse(bytes: &[u8], extension: &str) -> Result<Vec<PageText>, ApiError> {
    match extension {
        "pdf" => parse_pdf(bytes),
        "docx" => parse_docx(bytes),
        "txt" | "md" => Ok(vec![PageText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            page_number: None,
        }]),
        other => Err(ApiError::UnsupportedFormat(format!(
            "Invalid file type '{}'. Only PDF, DOCX, TXT and MD files are allowed",
            other
        ))),
    }
}

fn parse_pdf(bytes: &[u8]) -> Result<Vec<PageText>, ApiError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ApiError::Internal(format!("Failed to parse PDF: {}", e)))?;

    let pages: Vec<PageText> = if text.contains('\u{c}') {
        text.split('\u{c}')
            .enumerate()
            .map(|(i, page)| PageText {
                text: page.to_string(),
                page_number: Some(i as u32),
            })
            .collect()
    } else {
        vec![PageText {
            text,
            page_number: Some(0),
        }]
    };

    Ok(pages)
}

/// Extract paragraph text from `word/document.xml`. Produces one page; DOCX
/// has no page boundaries before layout.
fn parse_docx(bytes: &[u8]) -> Result<Vec<PageText>, ApiError> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| ApiError::Internal(format!("Failed to open DOCX container: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ApiError::Internal(format!("DOCX missing document body: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ApiError::Internal(format!("Failed to read DOCX body: {}", e)))?;

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"w:t" => in_text_run = false,
            Ok(Event::Text(ref t)) if in_text_run => {
                current.push_str(&t.unescape().unwrap_or_default());
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"w:tab" => current.push('\t'),
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"w:br" => current.push('\n'),
            Ok(Event::End(ref e)) if e.name().as_ref() == b"w:p" => {
                if !current.trim().is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ApiError::Internal(format!("Failed to parse DOCX XML: {}", e)))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(vec![PageText {
        text: paragraphs.join("\n\n"),
        page_number: None,
    }])
}
