//! Enrichment-and-prioritization pipeline for the notification triage engine.
//!
//! Module layout mirrors the dependency order from the spec: lower modules
//! have no dependency on higher ones. `RateGuard` and `Cache` are pure
//! infrastructure; `gateway` is the only module that talks to the network;
//! `enricher`, `source_merger`, and `orphan` each produce `Item`s from a
//! different source; `scoring` is pure; `pipeline` orchestrates all of it.

pub mod cache;
pub mod duration;
pub mod enricher;
pub mod errors;
pub mod gateway;
pub mod model;
pub mod orphan;
pub mod pipeline;
pub mod rate_guard;
pub mod scoring;
pub mod source_merger;

pub use errors::{CacheError, ConfigError, Error, ProviderError, TriageResult};
pub use model::{Item, ItemDetails, Reason, SubjectType};
pub use pipeline::{Pipeline, PipelineOptions, ProgressEvent};
pub use scoring::{Category, ScoreWeights, Scored};
