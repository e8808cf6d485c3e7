//! On-disk artifact cache.
//!
//! One record file per compilation unit, named from the unit's stable
//! name. Each record carries the fingerprint it was stored under, the
//! generated intermediate source, and the compiled binary.
//!
//! ## Keying
//!
//! Records are validated against a fingerprint over:
//! - the engine version string
//! - the ordered identities of the active output transforms
//! - the unit's raw template source
//!
//! A mismatch on any of the three makes the record stale: `load` reports a
//! miss and leaves the record in place for the next `store` to overwrite.
//!
//! ## Writing
//!
//! Stores write to a temp file and rename into place, so readers never see
//! a half-written record. Writers for the same unit are serialized by an
//! advisory file lock with a configurable timeout.

pub mod fingerprint;
mod lock;
mod record;
mod store;

pub use lock::{LockError, LockResult, UnitLock};
pub use record::{CacheRecord, RecordError};
pub use store::{ArtifactCache, CacheError, CacheResult, CacheStats, RECORD_EXT, SOURCE_EXT};
