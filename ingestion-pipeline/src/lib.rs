#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod committer;
pub mod enricher;
pub mod fetcher;
pub mod fingerprint;
pub mod normalizer;
pub mod pipeline;

pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionTuning, RunReport};
