//! Single mutable cell holding the one materialized vector index.
//!
//! The process keeps at most one index in memory, bound either to a session
//! or to nothing ("ungrouped" mode). Switching sessions replaces the whole
//! index; there is no path that leaves a stale index answering for the wrong
//! document set. Every mutation embeds into a detached structure first and
//! swaps it in only on success, so the prior state survives capability
//! failures untouched.

use std::fs;
use std::path::PathBuf;

use super::chunker::Chunk;
use super::index::VectorIndex;
use crate::core::errors::ApiError;
use crate::llm::LanguageModel;

pub struct VectorIndexSlot {
    bound_session_id: Option<String>,
    index: Option<VectorIndex>,
    index_dir: PathBuf,
}

impl VectorIndexSlot {
    pub fn new(index_dir: PathBuf) -> Self {
        Self {
            bound_session_id: None,
            index: None,
            index_dir,
        }
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn bound_session_id(&self) -> Option<&str> {
        self.bound_session_id.as_deref()
    }

    /// Chunks backing the current index; empty when no index is materialized.
    pub fn chunks(&self) -> &[Chunk] {
        self.index.as_ref().map(|i| i.chunks()).unwrap_or(&[])
    }

    /// Discard any existing index and build a fresh one from `chunks`.
    /// Embeds everything before touching the slot: on failure the previous
    /// index stays live.
    pub async fn rebuild(
        &mut self,
        chunks: Vec<Chunk>,
        bound_session_id: Option<String>,
        model: &dyn LanguageModel,
    ) -> Result<(), ApiError> {
        let vectors = embed_chunks(&chunks, model).await?;
        let index = VectorIndex::build(chunks, vectors)?;

        self.index = Some(index);
        self.bound_session_id = bound_session_id;
        self.persist();
        tracing::info!(
            "Vector index rebuilt with {} chunks (session: {:?})",
            self.chunks().len(),
            self.bound_session_id
        );
        Ok(())
    }

    /// Append chunks to the existing index. Requires a live index bound to
    /// `target_session` (both `None` in ungrouped mode); otherwise the caller
    /// must rebuild instead.
    pub async fn extend(
        &mut self,
        chunks: Vec<Chunk>,
        target_session: Option<&str>,
        model: &dyn LanguageModel,
    ) -> Result<(), ApiError> {
        if self.index.is_none() {
            return Err(ApiError::StateMismatch(
                "no materialized index to extend".to_string(),
            ));
        }
        if self.bound_session_id.as_deref() != target_session {
            return Err(ApiError::StateMismatch(format!(
                "index bound to {:?}, extend targeted {:?}",
                self.bound_session_id, target_session
            )));
        }

        let vectors = embed_chunks(&chunks, model).await?;
        let added = chunks.len();
        if let Some(index) = self.index.as_mut() {
            index.add(chunks, vectors)?;
        }
        self.persist();
        tracing::info!(
            "Added {} chunks to index (session: {:?})",
            added,
            self.bound_session_id
        );
        Ok(())
    }

    /// Make the index for `session_id` active. Returns true when the slot
    /// already holds it or a persisted snapshot was loaded; false (slot
    /// untouched) when nothing durable exists and the caller must rebuild
    /// from source documents.
    pub fn load_or_build(&mut self, session_id: &str) -> Result<bool, ApiError> {
        if self.bound_session_id.as_deref() == Some(session_id) && self.index.is_some() {
            tracing::info!("Vector index already loaded for session {}", session_id);
            return Ok(true);
        }

        let path = self.snapshot_path(session_id);
        if !path.exists() {
            return Ok(false);
        }

        let contents = fs::read_to_string(&path).map_err(ApiError::internal)?;
        let index: VectorIndex = match serde_json::from_str(&contents) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(
                    "Ignoring unreadable index snapshot {}: {}",
                    path.display(),
                    err
                );
                return Ok(false);
            }
        };

        self.index = Some(index);
        self.bound_session_id = Some(session_id.to_string());
        tracing::info!("Vector index loaded for session {}", session_id);
        Ok(true)
    }

    /// Drop the index and its binding.
    pub fn clear(&mut self) {
        self.index = None;
        self.bound_session_id = None;
    }

    /// Top-k chunks for a query vector. `NoActiveIndex` when nothing is
    /// materialized.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<&Chunk>, ApiError> {
        let index = self.index.as_ref().ok_or(ApiError::NoActiveIndex)?;
        Ok(index.query(vector, k))
    }

    /// Delete one session's persisted snapshot.
    pub fn remove_persisted(&self, session_id: &str) {
        let _ = fs::remove_file(self.snapshot_path(session_id));
    }

    /// Delete every persisted per-session snapshot.
    pub fn purge_persisted(&self) {
        if let Ok(entries) = fs::read_dir(&self.index_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with("session_") && name.ends_with(".json") {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }
    }

    fn snapshot_path(&self, session_id: &str) -> PathBuf {
        self.index_dir.join(format!("session_{}.json", session_id))
    }

    /// Best-effort durable snapshot for the bound session. Retrieval keeps
    /// working from memory when the write fails.
    fn persist(&self) {
        let (Some(session_id), Some(index)) = (self.bound_session_id.as_deref(), &self.index)
        else {
            return;
        };

        let path = self.snapshot_path(session_id);
        match serde_json::to_string(index) {
            Ok(payload) => {
                if let Err(err) = fs::write(&path, payload) {
                    tracing::warn!("Failed to persist index snapshot {}: {}", path.display(), err);
                }
            }
            Err(err) => tracing::warn!("Failed to serialize index snapshot: {}", err),
        }
    }
}

async fn embed_chunks(
    chunks: &[Chunk],
    model: &dyn LanguageModel,
) -> Result<Vec<Vec<f32>>, ApiError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    model.embed(&texts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockModel;

    fn chunk(content: &str, document_id: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            source_filename: format!("{}.txt", document_id),
            document_id: document_id.to_string(),
            page_number: None,
        }
    }

    fn slot() -> (VectorIndexSlot, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        (VectorIndexSlot::new(tmp.path().to_path_buf()), tmp)
    }

    #[tokio::test]
    async fn extend_makes_new_chunks_retrievable() {
        let (mut slot, _tmp) = slot();
        let model = MockModel::new();

        slot.rebuild(vec![chunk("alpha topic", "a")], None, &model)
            .await
            .unwrap();
        slot.extend(vec![chunk("omega subject", "b")], None, &model)
            .await
            .unwrap();

        let query = model.embed(&["omega subject".to_string()]).await.unwrap();
        let top = slot.query(&query[0], 1).unwrap();
        assert_eq!(top[0].content, "omega subject");
    }

    #[tokio::test]
    async fn rebuild_with_subset_drops_excluded_chunks() {
        let (mut slot, _tmp) = slot();
        let model = MockModel::new();

        slot.rebuild(
            vec![chunk("alpha topic", "a"), chunk("omega subject", "b")],
            None,
            &model,
        )
        .await
        .unwrap();
        slot.rebuild(vec![chunk("alpha topic", "a")], None, &model)
            .await
            .unwrap();

        let query = model.embed(&["omega subject".to_string()]).await.unwrap();
        let top = slot.query(&query[0], 10).unwrap();
        assert!(top.iter().all(|c| c.content != "omega subject"));
        assert_eq!(slot.chunks().len(), 1);
    }

    #[tokio::test]
    async fn extend_against_wrong_binding_is_a_state_mismatch() {
        let (mut slot, _tmp) = slot();
        let model = MockModel::new();

        // Nothing materialized yet.
        let err = slot
            .extend(vec![chunk("a", "a")], None, &model)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::StateMismatch(_)));

        slot.rebuild(vec![chunk("a", "a")], Some("s1".to_string()), &model)
            .await
            .unwrap();
        let err = slot
            .extend(vec![chunk("b", "b")], Some("s2"), &model)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::StateMismatch(_)));

        let err = slot
            .extend(vec![chunk("b", "b")], None, &model)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::StateMismatch(_)));
    }

    #[tokio::test]
    async fn failed_embedding_leaves_prior_state() {
        let (mut slot, _tmp) = slot();
        let model = MockModel::new();

        slot.rebuild(vec![chunk("original", "a")], None, &model)
            .await
            .unwrap();

        let failing = MockModel::failing();
        let err = slot
            .rebuild(vec![chunk("replacement", "b")], None, &failing)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Embedding(_)));
        assert_eq!(slot.chunks().len(), 1);
        assert_eq!(slot.chunks()[0].content, "original");

        let err = slot
            .extend(vec![chunk("extra", "c")], None, &failing)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Embedding(_)));
        assert_eq!(slot.chunks().len(), 1);
    }

    #[tokio::test]
    async fn load_or_build_round_trips_persisted_sessions() {
        let tmp = tempfile::tempdir().unwrap();
        let model = MockModel::new();

        {
            let mut slot = VectorIndexSlot::new(tmp.path().to_path_buf());
            slot.rebuild(
                vec![chunk("persisted content", "a")],
                Some("s1".to_string()),
                &model,
            )
            .await
            .unwrap();
        }

        let mut slot = VectorIndexSlot::new(tmp.path().to_path_buf());
        assert!(slot.load_or_build("s1").unwrap());
        assert_eq!(slot.bound_session_id(), Some("s1"));
        assert_eq!(slot.chunks()[0].content, "persisted content");

        // Cache hit: no disk needed once loaded.
        std::fs::remove_file(tmp.path().join("session_s1.json")).unwrap();
        assert!(slot.load_or_build("s1").unwrap());

        // Unknown session leaves the slot untouched.
        assert!(!slot.load_or_build("missing").unwrap());
        assert_eq!(slot.bound_session_id(), Some("s1"));
    }

    #[tokio::test]
    async fn clear_drops_index_and_binding() {
        let (mut slot, _tmp) = slot();
        let model = MockModel::new();

        slot.rebuild(vec![chunk("a", "a")], Some("s1".to_string()), &model)
            .await
            .unwrap();
        slot.clear();

        assert!(!slot.has_index());
        assert_eq!(slot.bound_session_id(), None);
        assert!(matches!(
            slot.query(&[1.0], 1).unwrap_err(),
            ApiError::NoActiveIndex
        ));
    }
}
