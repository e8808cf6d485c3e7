//! Compilation unit: one template's source and derived artifacts.

/// One template as the cache sees it.
///
/// The caller owns the unit for its whole lifetime. The cache reads
/// `raw_source` and `generated_source` during `store`, and writes
/// `generated_source` and `compiled_binary` on a `load` hit; it never
/// mutates a unit otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateUnit {
    /// Unique stable name, assigned by the caller.
    name: String,
    /// Raw template source text.
    raw_source: String,
    /// Generated intermediate source. `None` for units that are sub-parts
    /// of another unit and have no generation step of their own.
    generated_source: Option<String>,
    /// Compiled binary payload (opaque bytes).
    compiled_binary: Option<Vec<u8>>,
}

impl TemplateUnit {
    /// Create a unit from its stable name and raw source.
    pub fn new(name: impl Into<String>, raw_source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_source: raw_source.into(),
            generated_source: None,
            compiled_binary: None,
        }
    }

    /// Attach generated source (builder form, for freshly compiled units).
    pub fn with_generated_source(mut self, source: impl Into<String>) -> Self {
        self.generated_source = Some(source.into());
        self
    }

    /// Attach a compiled binary (builder form, for freshly compiled units).
    pub fn with_compiled_binary(mut self, binary: Vec<u8>) -> Self {
        self.compiled_binary = Some(binary);
        self
    }

    /// The unit's stable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw template source text.
    pub fn raw_source(&self) -> &str {
        &self.raw_source
    }

    /// The generated intermediate source, if this unit has one.
    pub fn generated_source(&self) -> Option<&str> {
        self.generated_source.as_deref()
    }

    /// The compiled binary payload, if present.
    pub fn compiled_binary(&self) -> Option<&[u8]> {
        self.compiled_binary.as_deref()
    }

    /// Set the generated source (cache hit or recompilation).
    pub fn set_generated_source(&mut self, source: String) {
        self.generated_source = Some(source);
    }

    /// Set the compiled binary (cache hit or recompilation).
    pub fn set_compiled_binary(&mut self, binary: Vec<u8>) {
        self.compiled_binary = Some(binary);
    }

    /// Filesystem-safe file stem derived from the unit name.
    ///
    /// Keeps ASCII alphanumerics, `-`, `_`, and `.`; everything else
    /// becomes `_`. Distinct names can still collide after sanitization;
    /// callers that allow exotic template names should keep them unique
    /// in sanitized form as well.
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}
