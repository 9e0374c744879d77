//! kbase Store — vector database seam plus an in-memory implementation.

pub mod memory;
pub mod types;

pub use memory::MemoryVectorStore;
pub use types::*;
