//! DocuChat backend: chat with uploaded documents.
//!
//! Documents are parsed, chunked and embedded into a single in-memory vector
//! index; questions are answered by retrieving the closest chunks and handing
//! them to a generation model, with ranked citations back to the sources.
//! Conversations live in named sessions persisted as JSON.

pub mod core;
pub mod documents;
pub mod history;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;
