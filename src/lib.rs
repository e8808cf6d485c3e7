//! Content-addressed cache for compiled template artifacts.
//!
//! A template engine compiles each template into generated intermediate
//! source plus a compiled binary. Recompiling on every startup is wasted
//! work: this crate persists both artifacts on disk under a fingerprint
//! derived from the template's raw source, the engine version, and the
//! identities of the active output transforms. When nothing relevant has
//! changed, a subsequent `load` restores the artifacts and compilation is
//! skipped entirely.
//!
//! The crate is deliberately small:
//! - [`unit::TemplateUnit`] carries one template's source and artifacts
//! - [`cache::ArtifactCache`] stores, loads, and deletes per-unit records
//! - [`cache::fingerprint`] computes the invalidation fingerprint
//! - [`config::CacheConfig`] is the explicit configuration value object
//! - [`transform::TransformRegistry`] supplies transform identities
//!
//! All I/O is synchronous and blocking; callers bring their own concurrency.

pub mod cache;
pub mod config;
pub mod transform;
pub mod unit;

pub use cache::{
    ArtifactCache, CacheError, CacheRecord, CacheResult, CacheStats, LockError, LockResult,
    RecordError, UnitLock,
};
pub use config::{CacheConfig, ConfigError};
pub use transform::{OutputTransform, TransformRegistry};
pub use unit::TemplateUnit;
