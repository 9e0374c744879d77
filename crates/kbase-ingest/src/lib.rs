//! kbase Ingest — document identity, paragraph-aware chunking, document conversion.

pub mod chunking;
pub mod convert;
pub mod identity;

pub use chunking::{Chunk, Chunker};
pub use convert::{ConversionOutput, ConversionStatus, DocumentConverter, PlainTextConverter};
pub use identity::{identify, Document, DocumentIdentity, DocumentType};
