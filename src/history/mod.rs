//! Chat session store with JSON file persistence.
//!
//! Sessions live in memory and are flushed to `history.json` after every
//! mutation. At most one session is active at a time; the active marker is
//! part of the persisted state so a restart resumes where the user left off.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::documents::DocumentRecord;
use crate::rag::Citation;

/// Longest auto-derived session name, in characters.
const MAX_DERIVED_NAME_CHARS: usize = 50;
const MAX_RENAME_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    /// Documents that were indexed when this session was live, so the index
    /// can be rebuilt when the session is reopened.
    #[serde(default)]
    pub documents: HashMap<String, DocumentRecord>,
}

/// Listing view of a session, without the message bodies.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionStoreState {
    sessions: HashMap<String, ChatSession>,
    active_session: Option<String>,
}

pub struct SessionStore {
    state: SessionStoreState,
    path: PathBuf,
}

impl SessionStore {
    /// Load the store from `path`, starting empty when the file is absent.
    /// A legacy flat-array history file is migrated to an empty store; any
    /// other shape is an error.
    pub fn load(path: PathBuf) -> Result<Self, ApiError> {
        let state = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(ApiError::internal)?;
            let value: serde_json::Value =
                serde_json::from_str(&contents).map_err(ApiError::internal)?;
            if value.is_array() {
                tracing::warn!("Legacy chat history format found, starting with a fresh store");
                SessionStoreState::default()
            } else if value.get("sessions").is_some() {
                serde_json::from_value(value).map_err(ApiError::internal)?
            } else {
                return Err(ApiError::Internal(format!(
                    "unrecognized chat history format in {}",
                    path.display()
                )));
            }
        } else {
            SessionStoreState::default()
        };

        Ok(Self { state, path })
    }

    pub fn active_session(&self) -> Option<&str> {
        self.state.active_session.as_deref()
    }

    pub fn len(&self) -> usize {
        self.state.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.sessions.is_empty()
    }

    /// Create a session and make it active. The name comes from the first
    /// question when one is given, otherwise a numbered placeholder.
    pub fn create_session(
        &mut self,
        first_question: Option<&str>,
        documents: HashMap<String, DocumentRecord>,
    ) -> Result<ChatSession, ApiError> {
        let name = match first_question.map(str::trim).filter(|q| !q.is_empty()) {
            Some(question) => derive_name(question),
            None => format!("New Chat {}", self.state.sessions.len() + 1),
        };

        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            documents,
        };

        self.state.active_session = Some(session.id.clone());
        self.state
            .sessions
            .insert(session.id.clone(), session.clone());
        self.save()?;
        tracing::info!("Created new session: {} ({})", session.name, session.id);
        Ok(session)
    }

    /// Record a question/answer exchange. Returns Ok(false) when the session
    /// is unknown, leaving the store untouched. The first message renames a
    /// placeholder session after its question, and the document snapshot is
    /// captured if the session has none yet.
    pub fn append_message(
        &mut self,
        session_id: &str,
        question: &str,
        answer: &str,
        citations: Vec<Citation>,
        documents: HashMap<String, DocumentRecord>,
    ) -> Result<bool, ApiError> {
        let Some(session) = self.state.sessions.get_mut(session_id) else {
            return Ok(false);
        };

        if session.messages.is_empty() {
            session.name = derive_name(question.trim());
        }
        if session.documents.is_empty() {
            session.documents = documents;
        }

        session.messages.push(Message {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            question: question.to_string(),
            answer: answer.to_string(),
            citations,
        });
        session.updated_at = Utc::now();

        self.save()?;
        Ok(true)
    }

    /// Summaries of every session, most recently updated first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .state
            .sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                created_at: s.created_at,
                updated_at: s.updated_at,
                message_count: s.messages.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Fetch a session and make it the active one.
    pub fn get_session(&mut self, session_id: &str) -> Result<&ChatSession, ApiError> {
        if !self.state.sessions.contains_key(session_id) {
            return Err(ApiError::NotFound("Session not found".to_string()));
        }
        self.state.active_session = Some(session_id.to_string());
        self.save()?;
        Ok(&self.state.sessions[session_id])
    }

    pub fn rename_session(&mut self, session_id: &str, name: &str) -> Result<(), ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput(
                "Session name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_RENAME_CHARS {
            return Err(ApiError::InvalidInput(format!(
                "Session name cannot exceed {} characters",
                MAX_RENAME_CHARS
            )));
        }

        let session = self
            .state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
        session.name = name.to_string();
        session.updated_at = Utc::now();
        self.save()
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<(), ApiError> {
        if self.state.sessions.remove(session_id).is_none() {
            return Err(ApiError::NotFound("Session not found".to_string()));
        }
        if self.state.active_session.as_deref() == Some(session_id) {
            self.state.active_session = None;
        }
        self.save()
    }

    pub fn clear_all(&mut self) -> Result<(), ApiError> {
        self.state.sessions.clear();
        self.state.active_session = None;
        self.save()
    }

    fn save(&self) -> Result<(), ApiError> {
        let payload = serde_json::to_string_pretty(&self.state).map_err(ApiError::internal)?;
        fs::write(&self.path, payload).map_err(ApiError::internal)?;
        Ok(())
    }
}

/// Session name derived from a question: the question itself, cut to 47
/// characters plus an ellipsis when it runs long.
fn derive_name(question: &str) -> String {
    if question.chars().count() > MAX_DERIVED_NAME_CHARS {
        let head: String = question.chars().take(MAX_DERIVED_NAME_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        question.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(tmp: &tempfile::TempDir) -> SessionStore {
        SessionStore::load(tmp.path().join("history.json")).unwrap()
    }

    #[test]
    fn short_question_names_session_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        let question = "What is the refund policy?";
        let session = store
            .create_session(Some(question), HashMap::new())
            .unwrap();
        assert_eq!(session.name, question);
        assert_eq!(store.active_session(), Some(session.id.as_str()));
    }

    #[test]
    fn long_question_is_cut_to_47_chars_plus_ellipsis() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        let question = "q".repeat(60);
        let session = store
            .create_session(Some(&question), HashMap::new())
            .unwrap();
        assert_eq!(session.name.chars().count(), 50);
        assert_eq!(session.name, format!("{}...", "q".repeat(47)));
    }

    #[test]
    fn sessions_without_question_get_numbered_names() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        let first = store.create_session(None, HashMap::new()).unwrap();
        let second = store.create_session(None, HashMap::new()).unwrap();
        assert_eq!(first.name, "New Chat 1");
        assert_eq!(second.name, "New Chat 2");
    }

    #[test]
    fn first_message_renames_placeholder_session() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        let session = store.create_session(None, HashMap::new()).unwrap();
        assert!(store
            .append_message(&session.id, "How do I reset it?", "Hold the button.", Vec::new(), HashMap::new())
            .unwrap());

        let reloaded = store.get_session(&session.id).unwrap();
        assert_eq!(reloaded.name, "How do I reset it?");
        assert_eq!(reloaded.messages.len(), 1);

        // Second message keeps the name.
        assert!(store
            .append_message(&session.id, "Another question", "Answer.", Vec::new(), HashMap::new())
            .unwrap());
        assert_eq!(store.get_session(&session.id).unwrap().name, "How do I reset it?");
    }

    #[test]
    fn append_to_unknown_session_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        assert!(!store
            .append_message("ghost", "q", "a", Vec::new(), HashMap::new())
            .unwrap());
    }

    #[test]
    fn rename_enforces_length_bounds() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);
        let session = store.create_session(None, HashMap::new()).unwrap();

        assert!(matches!(
            store.rename_session(&session.id, "   "),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            store.rename_session(&session.id, &"x".repeat(101)),
            Err(ApiError::InvalidInput(_))
        ));
        store.rename_session(&session.id, &"x".repeat(100)).unwrap();
        assert_eq!(
            store.get_session(&session.id).unwrap().name,
            "x".repeat(100)
        );
        assert!(matches!(
            store.rename_session("ghost", "name"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn delete_active_session_clears_active_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        let session = store.create_session(None, HashMap::new()).unwrap();
        store.delete_session(&session.id).unwrap();
        assert_eq!(store.active_session(), None);
        assert!(matches!(
            store.delete_session(&session.id),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn list_orders_by_most_recent_update() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store(&tmp);

        let older = store.create_session(Some("first"), HashMap::new()).unwrap();
        let _newer = store.create_session(Some("second"), HashMap::new()).unwrap();
        store
            .append_message(&older.id, "bump", "a", Vec::new(), HashMap::new())
            .unwrap();

        let listed = store.list_sessions();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[0].message_count, 1);
    }

    #[test]
    fn store_round_trips_through_its_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.json");

        let session_id = {
            let mut store = SessionStore::load(path.clone()).unwrap();
            let session = store
                .create_session(Some("persisted question"), HashMap::new())
                .unwrap();
            store
                .append_message(&session.id, "persisted question", "answer", Vec::new(), HashMap::new())
                .unwrap();
            session.id
        };

        let mut reloaded = SessionStore::load(path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.active_session(), Some(session_id.as_str()));
        let session = reloaded.get_session(&session_id).unwrap();
        assert_eq!(session.name, "persisted question");
        assert_eq!(session.messages[0].answer, "answer");
    }

    #[test]
    fn legacy_array_history_migrates_to_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.json");
        fs::write(&path, r#"[{"question": "old", "answer": "old"}]"#).unwrap();

        let store = SessionStore::load(path).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.active_session(), None);
    }

    #[test]
    fn unrecognized_history_shape_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.json");
        fs::write(&path, r#"{"unexpected": true}"#).unwrap();

        assert!(SessionStore::load(path).is_err());
    }
}
