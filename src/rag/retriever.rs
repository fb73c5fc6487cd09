//! Retrieval orchestration: question in, answer plus ranked citations out.
//!
//! Embeds the question, pulls the top-k chunks from the active index, hands
//! them to the generation capability, and formats each retrieved chunk into
//! a short citation. A capability failure propagates as-is; no partial
//! answer is ever returned.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::chunker::Chunk;
use super::slot::VectorIndexSlot;
use crate::core::errors::ApiError;
use crate::llm::LanguageModel;

const MAX_CITATION_SENTENCES: usize = 3;
const MAX_CITATION_CHARS: usize = 300;

/// A truncated excerpt of a retrieved chunk, shown alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based retrieval rank.
    pub rank: usize,
    pub content: String,
    pub source_filename: String,
    /// Page number, or the string "N/A" when the source has no pages.
    pub page: Value,
}

impl Citation {
    fn from_chunk(rank: usize, chunk: &Chunk) -> Self {
        Self {
            rank,
            content: format_citation_text(&chunk.content, MAX_CITATION_SENTENCES),
            source_filename: chunk.source_filename.clone(),
            page: chunk
                .page_number
                .map(|p| json!(p))
                .unwrap_or_else(|| json!("N/A")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub question: String,
}

/// Answer a question against the currently active index.
pub async fn answer(
    slot: &VectorIndexSlot,
    model: &dyn LanguageModel,
    question: &str,
    top_k: usize,
) -> Result<AnswerResult, ApiError> {
    if !slot.has_index() {
        return Err(ApiError::NoActiveIndex);
    }

    let embedded = model.embed(&[question.to_string()]).await?;
    let query_vector = embedded
        .first()
        .ok_or_else(|| ApiError::Embedding("no embedding returned for question".to_string()))?;

    let retrieved = slot.query(query_vector, top_k)?;
    let context = retrieved
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let answer = model.generate(&context, question).await?;

    let citations = retrieved
        .iter()
        .enumerate()
        .map(|(i, chunk)| Citation::from_chunk(i + 1, chunk))
        .collect();

    Ok(AnswerResult {
        answer,
        citations,
        question: question.to_string(),
    })
}

fn sentence_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"))
}

/// Sentences of `text`, split after `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in sentence_boundary_re().find_iter(text) {
        // The punctuation class is single-byte, so +1 lands after it.
        let boundary = m.start() + 1;
        sentences.push(&text[last..boundary]);
        last = m.end();
    }
    if last < text.len() {
        sentences.push(&text[last..]);
    }
    sentences
}

/// Trim a chunk excerpt to at most `max_sentences` sentences, appending an
/// ellipsis when sentences were dropped, with a hard 300-character cap as a
/// backstop.
pub fn format_citation_text(text: &str, max_sentences: usize) -> String {
    let text = text.trim();
    let sentences = split_sentences(text);

    let mut result = sentences
        .iter()
        .take(max_sentences)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    if sentences.len() > max_sentences {
        result.push_str("...");
    }

    if result.chars().count() > MAX_CITATION_CHARS {
        result = result.chars().take(MAX_CITATION_CHARS - 3).collect();
        result.push_str("...");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockModel;

    fn chunk(content: &str, page: Option<u32>) -> Chunk {
        Chunk {
            content: content.to_string(),
            source_filename: "manual.pdf".to_string(),
            document_id: "doc-1".to_string(),
            page_number: page,
        }
    }

    #[test]
    fn five_sentences_truncate_to_three_with_ellipsis() {
        let text = "One. Two. Three. Four. Five.";
        assert_eq!(format_citation_text(text, 3), "One. Two. Three....");
    }

    #[test]
    fn three_sentences_pass_untouched() {
        let text = "One. Two. Three.";
        assert_eq!(format_citation_text(text, 3), "One. Two. Three.");
    }

    #[test]
    fn long_single_sentence_hits_character_cap() {
        let text = "a".repeat(400);
        let formatted = format_citation_text(&text, 3);
        assert_eq!(formatted.chars().count(), 300);
        assert!(formatted.ends_with("..."));
        assert_eq!(&formatted[..297], &text[..297]);
    }

    #[test]
    fn mixed_terminators_split_correctly() {
        let text = "Hello! How are you? I am fine. Thanks a lot. Bye.";
        assert_eq!(
            format_citation_text(text, 3),
            "Hello! How are you? I am fine...."
        );
    }

    #[tokio::test]
    async fn answer_produces_ranked_citations() {
        let tmp = tempfile::tempdir().unwrap();
        let mut slot = VectorIndexSlot::new(tmp.path().to_path_buf());
        let model = MockModel::new();

        slot.rebuild(
            vec![
                chunk("The refund policy allows returns within thirty days.", Some(2)),
                chunk("Shipping takes five business days.", None),
            ],
            None,
            &model,
        )
        .await
        .unwrap();

        let result = answer(&slot, &model, "What is the refund policy?", 4)
            .await
            .unwrap();

        assert_eq!(result.answer, "mock answer: What is the refund policy?");
        assert_eq!(result.question, "What is the refund policy?");
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.citations[0].rank, 1);
        assert_eq!(result.citations[1].rank, 2);
        assert!(result.citations[0].content.contains("refund policy"));
        assert_eq!(result.citations[0].page, serde_json::json!(2));
        assert_eq!(result.citations[1].page, serde_json::json!("N/A"));
    }

    #[tokio::test]
    async fn answer_without_index_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let slot = VectorIndexSlot::new(tmp.path().to_path_buf());
        let model = MockModel::new();

        let err = answer(&slot, &model, "anything", 4).await.unwrap_err();
        assert!(matches!(err, ApiError::NoActiveIndex));
    }

    #[tokio::test]
    async fn generation_failure_propagates_without_partial_answer() {
        let tmp = tempfile::tempdir().unwrap();
        let mut slot = VectorIndexSlot::new(tmp.path().to_path_buf());
        let good = MockModel::new();
        slot.rebuild(vec![chunk("some context.", None)], None, &good)
            .await
            .unwrap();

        let flaky = MockModel::failing_generation();
        let err = answer(&slot, &flaky, "question", 4).await.unwrap_err();
        assert!(matches!(err, ApiError::Generation(_)));
    }
}
