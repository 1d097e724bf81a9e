//! Ingestion pipeline: import, analyze, suggest, rename

pub mod executor;
pub mod processor;

pub use executor::RenameExecutor;
pub use processor::{FileProcessor, ProcessOutcome};
