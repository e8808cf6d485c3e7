//! Output transform registry.
//!
//! Transforms rewrite generated output at compile time, so a change in the
//! active transform set must invalidate cached artifacts. The registry
//! exposes exactly what the fingerprint needs: the ordered list of
//! transform identity strings. Nothing else about a transform is visible
//! to the cache.

/// An output-transforming plugin, as seen by the cache.
pub trait OutputTransform {
    /// Stable identity string for this transform.
    ///
    /// Must not change between runs for the same transform, and must
    /// differ between transforms that produce different output.
    fn identity(&self) -> &str;
}

/// Ordered registry of active output transforms.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: Vec<Box<dyn OutputTransform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform. Registration order is preserved and is part
    /// of the fingerprint.
    pub fn register(&mut self, transform: Box<dyn OutputTransform>) {
        self.transforms.push(transform);
    }

    /// The ordered identity strings of all registered transforms.
    pub fn identities(&self) -> Vec<String> {
        self.transforms
            .iter()
            .map(|t| t.identity().to_string())
            .collect()
    }

    /// Number of registered transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("identities", &self.identities())
            .finish()
    }
}
