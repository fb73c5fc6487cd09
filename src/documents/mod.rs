pub mod parser;
pub mod registry;

pub use registry::{DocumentRecord, DocumentRegistry, RemovalPlan};
