//! Recursive character splitter.
//!
//! Splits parsed pages into overlapping chunks by a priority list of
//! separators (paragraph break, line break, space, then single characters),
//! so chunks stay within `chunk_size` wherever a split point allows. Pure
//! and deterministic: same input and parameters always produce the same
//! chunk sequence.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// One page of parsed document text, as produced by the document parser.
#[derive(Debug, Clone)]
pub struct PageText {
    pub text: String,
    pub page_number: Option<u32>,
}

/// A bounded text span with provenance, the atomic unit of indexing and
/// retrieval. Immutable once created; owned by the index that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_filename: String,
    pub document_id: String,
    pub page_number: Option<u32>,
}

/// Split pages into chunks, attaching caller-supplied provenance to each.
pub fn chunk_pages(
    pages: &[PageText],
    source_filename: &str,
    document_id: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in pages {
        for content in split_text(&page.text, &SEPARATORS, chunk_size, overlap) {
            chunks.push(Chunk {
                content,
                source_filename: source_filename.to_string(),
                document_id: document_id.to_string(),
                page_number: page.page_number,
            });
        }
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split by the first separator present in the text, merging the pieces back
/// into chunks of at most `chunk_size` characters. Pieces that are still too
/// large recurse into the remaining separators; the empty separator splits
/// into single characters and always applies.
fn split_text(text: &str, separators: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut separator = *separators.last().unwrap_or(&"");
    let mut remaining: &[&str] = &[];
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            separator = sep;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let splits: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator).map(str::to_string).collect()
    };

    let mut final_chunks = Vec::new();
    let mut good: Vec<String> = Vec::new();
    for piece in splits {
        if char_len(&piece) < chunk_size {
            good.push(piece);
        } else {
            if !good.is_empty() {
                final_chunks.extend(merge_splits(&good, separator, chunk_size, overlap));
                good.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(split_text(&piece, remaining, chunk_size, overlap));
            }
        }
    }
    if !good.is_empty() {
        final_chunks.extend(merge_splits(&good, separator, chunk_size, overlap));
    }
    final_chunks
}

/// Greedily join small pieces into chunks, carrying `overlap` characters of
/// trailing pieces into the next chunk.
fn merge_splits(splits: &[String], separator: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut docs = Vec::new();
    let mut current: VecDeque<&String> = VecDeque::new();
    let mut total = 0usize;

    for piece in splits {
        let piece_len = char_len(piece);
        let join_len = if current.is_empty() { 0 } else { sep_len };

        if total + piece_len + join_len > chunk_size && !current.is_empty() {
            if let Some(doc) = join_pieces(&current, separator) {
                docs.push(doc);
            }
            // Shed leading pieces until the carried tail fits the overlap
            // budget and leaves room for the incoming piece.
            while total > overlap
                || (total + piece_len + if current.is_empty() { 0 } else { sep_len } > chunk_size
                    && total > 0)
            {
                let front_len = char_len(current[0]);
                total -= front_len + if current.len() > 1 { sep_len } else { 0 };
                current.pop_front();
            }
        }

        current.push_back(piece);
        total += piece_len + if current.len() > 1 { sep_len } else { 0 };
    }

    if let Some(doc) = join_pieces(&current, separator) {
        docs.push(doc);
    }
    docs
}

fn join_pieces(pieces: &VecDeque<&String>, separator: &str) -> Option<String> {
    let joined = pieces
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> Vec<PageText> {
        vec![PageText {
            text: text.to_string(),
            page_number: Some(0),
        }]
    }

    #[test]
    fn deterministic_output() {
        let pages = page(&"The quick brown fox jumps over the lazy dog. ".repeat(40));
        let a = chunk_pages(&pages, "a.txt", "doc-1", 200, 40);
        let b = chunk_pages(&pages, "a.txt", "doc-1", 200, 40);
        assert_eq!(a, b);
        assert!(a.len() > 1);
    }

    #[test]
    fn chunks_respect_size_when_boundaries_exist() {
        let pages = page(&"word ".repeat(200));
        let chunks = chunk_pages(&pages, "a.txt", "doc-1", 100, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
        }
    }

    #[test]
    fn paragraphs_split_before_lines_and_words() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = chunk_pages(&page(&text), "a.txt", "doc-1", 100, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "a".repeat(80));
        assert_eq!(chunks[1].content, "b".repeat(80));
    }

    #[test]
    fn falls_back_to_character_split_with_overlap() {
        let chunks = chunk_pages(&page(&"x".repeat(250)), "a.txt", "doc-1", 100, 20);
        let lens: Vec<usize> = chunks.iter().map(|c| c.content.chars().count()).collect();
        assert_eq!(lens, vec![100, 100, 90]);
        // 20 chars of the previous chunk are carried into the next one.
        assert_eq!(&chunks[1].content[..20], &chunks[0].content[80..]);
    }

    #[test]
    fn attaches_provenance_per_page() {
        let pages = vec![
            PageText {
                text: "first page".to_string(),
                page_number: Some(0),
            },
            PageText {
                text: "second page".to_string(),
                page_number: Some(1),
            },
        ];
        let chunks = chunk_pages(&pages, "report.pdf", "doc-9", 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page_number, Some(0));
        assert_eq!(chunks[1].page_number, Some(1));
        for chunk in &chunks {
            assert_eq!(chunk.source_filename, "report.pdf");
            assert_eq!(chunk.document_id, "doc-9");
        }
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let chunks = chunk_pages(&page("   \n\n  "), "a.txt", "doc-1", 100, 20);
        assert!(chunks.is_empty());
    }
}
