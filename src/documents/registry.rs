use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rag::chunker::Chunk;

/// Metadata for one indexed document, keyed by document id in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub chunk_count: usize,
    pub page_count: usize,
}

/// In-memory map of document id to metadata. Iteration order carries no
/// meaning; callers sort when display order matters.
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    records: HashMap<String, DocumentRecord>,
}

/// What the index slot must do after a document is removed.
#[derive(Debug)]
pub enum RemovalPlan {
    /// Rebuild from the chunks that survive the removal.
    Rebuild(Vec<Chunk>),
    /// Nothing survives; drop the index entirely.
    Clear,
}

impl RemovalPlan {
    pub fn for_remaining(remaining: Vec<Chunk>) -> Self {
        if remaining.is_empty() {
            RemovalPlan::Clear
        } else {
            RemovalPlan::Rebuild(remaining)
        }
    }
}

impl DocumentRegistry {
    /// Insert or overwrite a record. Idempotent by id.
    pub fn register(
        &mut self,
        document_id: String,
        filename: String,
        chunk_count: usize,
        page_count: usize,
    ) {
        self.records.insert(
            document_id,
            DocumentRecord {
                filename,
                chunk_count,
                page_count,
            },
        );
    }

    pub fn remove(&mut self, document_id: &str) -> Option<DocumentRecord> {
        self.records.remove(document_id)
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.records.get(document_id)
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.records.contains_key(document_id)
    }

    pub fn records(&self) -> &HashMap<String, DocumentRecord> {
        &self.records
    }

    pub fn snapshot(&self) -> HashMap<String, DocumentRecord> {
        self.records.clone()
    }

    pub fn replace(&mut self, records: HashMap<String, DocumentRecord>) {
        self.records = records;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
