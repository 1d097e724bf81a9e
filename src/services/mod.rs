//! Supporting services for the ingestion pipeline

pub mod confidence;
pub mod probe;
pub mod scanner;
pub mod template;
pub mod vision;
