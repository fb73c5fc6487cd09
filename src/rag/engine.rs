//! Document lifecycle orchestration.
//!
//! `RagEngine` owns the vector index slot and the document registry and
//! keeps them consistent with the uploaded files on disk and the durable
//! document snapshot (`session.json`). Every mutating operation leaves the
//! slot either fully updated or untouched.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunker::{chunk_pages, Chunk};
use super::retriever::{self, AnswerResult};
use super::slot::VectorIndexSlot;
use crate::core::config::{AppPaths, RagConfig};
use crate::core::errors::ApiError;
use crate::documents::parser;
use crate::documents::{DocumentRecord, DocumentRegistry, RemovalPlan};
use crate::llm::LanguageModel;

/// Durable snapshot of the document registry, restored at startup.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentSnapshot {
    document_metadata: HashMap<String, DocumentRecord>,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub document_id: String,
    pub filename: String,
    pub chunk_count: usize,
    pub page_count: usize,
    pub total_documents: usize,
    /// True when the chunks were appended to the live index rather than
    /// triggering a rebuild.
    pub added_to_existing: bool,
}

pub struct RagEngine {
    slot: VectorIndexSlot,
    registry: DocumentRegistry,
    upload_dir: PathBuf,
    snapshot_path: PathBuf,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(paths: &AppPaths, config: RagConfig) -> Self {
        Self {
            slot: VectorIndexSlot::new(paths.index_dir.clone()),
            registry: DocumentRegistry::default(),
            upload_dir: paths.upload_dir.clone(),
            snapshot_path: paths.snapshot_path.clone(),
            config,
        }
    }

    pub fn documents(&self) -> &HashMap<String, DocumentRecord> {
        self.registry.records()
    }

    /// Copy of the registry, taken when a session snapshots its documents.
    pub fn document_snapshot(&self) -> HashMap<String, DocumentRecord> {
        self.registry.snapshot()
    }

    pub fn has_index(&self) -> bool {
        self.slot.has_index()
    }

    pub async fn answer(
        &self,
        model: &dyn LanguageModel,
        question: &str,
    ) -> Result<AnswerResult, ApiError> {
        retriever::answer(&self.slot, model, question, self.config.top_k).await
    }

    /// Parse, chunk and index an uploaded document, then register it and
    /// refresh the durable snapshot. With `add_to_existing` the chunks are
    /// appended to the live index when its binding matches; any binding
    /// mismatch falls back to a fresh build over the new chunks.
    pub async fn upload(
        &mut self,
        bytes: &[u8],
        original_filename: &str,
        add_to_existing: bool,
        session_id: Option<&str>,
        model: &dyn LanguageModel,
    ) -> Result<UploadOutcome, ApiError> {
        let extension = parser::file_extension(original_filename).ok_or_else(|| {
            ApiError::UnsupportedFormat("file has no extension".to_string())
        })?;
        if !parser::is_allowed(&extension) {
            return Err(ApiError::UnsupportedFormat(format!(
                "Invalid file type '{}'. Only PDF, DOCX, TXT and MD files are allowed",
                extension
            )));
        }

        let filename = parser::sanitize_filename(original_filename);
        let document_id = Uuid::new_v4().to_string();

        let pages = parser::parse(bytes, &extension)?;
        let chunks = chunk_pages(
            &pages,
            &filename,
            &document_id,
            self.config.chunk_size,
            self.config.chunk_overlap,
        );
        if chunks.is_empty() {
            return Err(ApiError::InvalidInput(
                "document contains no extractable text".to_string(),
            ));
        }

        let chunk_count = chunks.len();
        let page_count = pages.len();

        let extended = if add_to_existing {
            match self.slot.extend(chunks.clone(), session_id, model).await {
                Ok(()) => true,
                Err(ApiError::StateMismatch(reason)) => {
                    tracing::info!("Falling back to index rebuild: {}", reason);
                    self.slot
                        .rebuild(chunks, session_id.map(str::to_string), model)
                        .await?;
                    false
                }
                Err(err) => return Err(err),
            }
        } else {
            self.slot
                .rebuild(chunks, session_id.map(str::to_string), model)
                .await?;
            false
        };

        // Index is live; now make the document durable.
        let stored_path = self.upload_dir.join(format!("{}_{}", document_id, filename));
        fs::write(&stored_path, bytes).map_err(ApiError::internal)?;

        self.registry
            .register(document_id.clone(), filename.clone(), chunk_count, page_count);
        self.save_snapshot()?;

        tracing::info!(
            "Document indexed: {} ({} chunks, {} pages, add_to_existing: {})",
            filename,
            chunk_count,
            page_count,
            add_to_existing
        );

        Ok(UploadOutcome {
            document_id,
            filename,
            chunk_count,
            page_count,
            total_documents: self.registry.len(),
            added_to_existing: extended,
        })
    }

    /// Remove a document and rebuild the index from the surviving chunks,
    /// or clear the slot when none remain. The index capability has no
    /// deletion primitive, so removal is always a full rebuild.
    pub async fn remove_document(
        &mut self,
        document_id: &str,
        model: &dyn LanguageModel,
    ) -> Result<(DocumentRecord, usize), ApiError> {
        let record = self
            .registry
            .remove(document_id)
            .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

        self.remove_stored_files(document_id);

        let remaining: Vec<Chunk> = self
            .slot
            .chunks()
            .iter()
            .filter(|c| c.document_id != document_id)
            .cloned()
            .collect();

        // Keep the session binding so the rebuild rewrites that session's
        // persisted snapshot instead of leaving the removed chunks in it.
        let binding = self.slot.bound_session_id().map(str::to_string);
        match RemovalPlan::for_remaining(remaining) {
            RemovalPlan::Rebuild(chunks) => {
                self.slot.rebuild(chunks, binding, model).await?;
            }
            RemovalPlan::Clear => {
                self.slot.clear();
                if let Some(session_id) = binding {
                    self.slot.remove_persisted(&session_id);
                }
            }
        }

        self.save_snapshot()?;
        tracing::info!("Document removed: {}", record.filename);
        Ok((record, self.registry.len()))
    }

    /// Rebuild registry and index from the durable snapshot, re-parsing every
    /// stored source file. A missing or unreadable file skips only that
    /// document's chunks. Returns false when nothing could be restored.
    pub async fn restore(&mut self, model: &dyn LanguageModel) -> Result<bool, ApiError> {
        let Some(snapshot) = self.load_snapshot() else {
            tracing::info!("No previous session found");
            return Ok(false);
        };
        if snapshot.document_metadata.is_empty() {
            tracing::info!("No documents in previous session");
            return Ok(false);
        }

        self.registry.replace(snapshot.document_metadata);
        tracing::info!("Restoring session with {} documents...", self.registry.len());

        let mut document_ids: Vec<String> = self.registry.records().keys().cloned().collect();
        document_ids.sort();

        let mut all_chunks = Vec::new();
        for document_id in document_ids {
            let record = self.registry.get(&document_id).cloned();
            let Some(record) = record else { continue };
            if let Some(chunks) = self.reload_chunks(&document_id, &record) {
                all_chunks.extend(chunks);
            }
        }

        if all_chunks.is_empty() {
            return Ok(false);
        }

        let restored = all_chunks.len();
        self.slot.rebuild(all_chunks, None, model).await?;
        tracing::info!("Session restored successfully with {} chunks", restored);
        Ok(true)
    }

    /// Drop the index, the registry, every uploaded file and every persisted
    /// per-session index snapshot.
    pub fn clear(&mut self) -> Result<(), ApiError> {
        self.slot.clear();
        self.slot.purge_persisted();
        self.registry.clear();

        if let Ok(entries) = fs::read_dir(&self.upload_dir) {
            for entry in entries.flatten() {
                if entry.path().is_file() {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }

        self.save_snapshot()
    }

    /// Make `session_id` the session the index answers for. Prefers the
    /// persisted snapshot; without one, rebuilds from the session's stored
    /// source files. Either way the previous session's index is gone by the
    /// time this returns, so a switched-to session can never be answered
    /// from the wrong document set. Returns false when the session ends up
    /// with no index at all.
    pub async fn activate_session(
        &mut self,
        session_id: &str,
        documents: &HashMap<String, DocumentRecord>,
        model: &dyn LanguageModel,
    ) -> Result<bool, ApiError> {
        if self.slot.load_or_build(session_id)? {
            self.registry.replace(documents.clone());
            return Ok(true);
        }

        let mut document_ids: Vec<&String> = documents.keys().collect();
        document_ids.sort();

        let mut all_chunks = Vec::new();
        for document_id in document_ids {
            if let Some(record) = documents.get(document_id) {
                if let Some(chunks) = self.reload_chunks(document_id, record) {
                    all_chunks.extend(chunks);
                }
            }
        }

        self.registry.replace(documents.clone());
        if all_chunks.is_empty() {
            self.slot.clear();
            return Ok(false);
        }

        self.slot
            .rebuild(all_chunks, Some(session_id.to_string()), model)
            .await?;
        Ok(true)
    }

    /// Re-parse and re-chunk one document from its stored upload. None (with
    /// a warning) when the file is missing or unreadable.
    fn reload_chunks(&self, document_id: &str, record: &DocumentRecord) -> Option<Vec<Chunk>> {
        let Some(stored_path) = self.find_stored_file(document_id) else {
            tracing::warn!(
                "Source file missing for document {} ({}), skipping",
                document_id,
                record.filename
            );
            return None;
        };

        let extension = stored_path
            .file_name()
            .and_then(|n| parser::file_extension(&n.to_string_lossy()))
            .unwrap_or_default();

        let bytes = match fs::read(&stored_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("Failed to read {}: {}, skipping", stored_path.display(), err);
                return None;
            }
        };

        match parser::parse(&bytes, &extension) {
            Ok(pages) => {
                tracing::info!("Reloaded: {}", record.filename);
                Some(chunk_pages(
                    &pages,
                    &record.filename,
                    document_id,
                    self.config.chunk_size,
                    self.config.chunk_overlap,
                ))
            }
            Err(err) => {
                tracing::warn!("Failed to re-parse {}: {}, skipping", record.filename, err);
                None
            }
        }
    }

    fn find_stored_file(&self, document_id: &str) -> Option<PathBuf> {
        let prefix = format!("{}_", document_id);
        let entries = fs::read_dir(&self.upload_dir).ok()?;
        entries
            .flatten()
            .map(|e| e.path())
            .find(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&prefix))
                    .unwrap_or(false)
            })
    }

    fn remove_stored_files(&self, document_id: &str) {
        let prefix = format!("{}_", document_id);
        if let Ok(entries) = fs::read_dir(&self.upload_dir) {
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with(&prefix) {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }
    }

    fn save_snapshot(&self) -> Result<(), ApiError> {
        let snapshot = DocumentSnapshot {
            document_metadata: self.registry.snapshot(),
            last_updated: Utc::now(),
        };
        let payload = serde_json::to_string_pretty(&snapshot).map_err(ApiError::internal)?;
        fs::write(&self.snapshot_path, payload).map_err(ApiError::internal)?;
        Ok(())
    }

    fn load_snapshot(&self) -> Option<DocumentSnapshot> {
        if !self.snapshot_path.exists() {
            return None;
        }
        match fs::read_to_string(&self.snapshot_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::warn!("Unreadable document snapshot, starting empty: {}", err);
                    None
                }
            },
            Err(err) => {
                tracing::warn!("Failed to read document snapshot: {}", err);
                None
            }
        }
    }
}
