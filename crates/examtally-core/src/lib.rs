//! examtally-core: Answer normalization, user aggregation, and scoring.
//!
//! This crate defines the data model, the question catalog, and the pipeline
//! that turns a raw exam export into per-user records and score summaries.
//! Speech-to-text is reached only through the traits in [`traits`].

pub mod aggregator;
pub mod catalog;
pub mod enrich;
pub mod error;
pub mod export;
pub mod grading;
pub mod model;
pub mod normalizer;
pub mod report;
pub mod statistics;
pub mod traits;
