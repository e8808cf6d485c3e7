//! Artifact fingerprint computation.
//!
//! The fingerprint decides whether a cached artifact is still usable. It
//! covers everything that can change the compiled output: the engine
//! version, the active output transforms, and the raw template source.
//! The generated source is deliberately excluded so that identical
//! templates fingerprint identically regardless of when they were
//! generated.

use sha2::{Digest, Sha256};

/// Compute the fingerprint for a unit.
///
/// The digest input is the byte concatenation of the engine version, the
/// transform identities in order, and the raw source. Output is lowercase
/// hex, 64 characters. Pure function: identical inputs always produce an
/// identical fingerprint across runs.
pub fn compute(raw_source: &str, engine_version: &str, transform_identities: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(engine_version.as_bytes());
    for identity in transform_identities {
        hasher.update(identity.as_bytes());
    }
    hasher.update(raw_source.as_bytes());
    hex::encode(hasher.finalize())
}
