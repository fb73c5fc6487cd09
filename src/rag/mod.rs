pub mod chunker;
pub mod engine;
pub mod index;
pub mod retriever;
pub mod slot;

pub use chunker::{Chunk, PageText};
pub use engine::{RagEngine, UploadOutcome};
pub use retriever::{AnswerResult, Citation};
pub use slot::VectorIndexSlot;
