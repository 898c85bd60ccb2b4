//! Extraction options

use crate::reader::chunked::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// How attribute values are escaped when a start tag is re-serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeEscaping {
    /// Only `"` is rewritten, as `%22`. Everything else is copied as decoded.
    ///
    /// This is not XML escaping: a value holding `&` or `<` produces a
    /// fragment that a strict parser rejects. Kept as the default so output
    /// stays byte-compatible with existing consumers.
    #[default]
    Percent,
    /// `&`, `<`, `>`, `"` and `'` are written as entity references.
    Xml,
}

/// Settings for a fragment scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Bytes requested from the source per read
    pub chunk_size: usize,
    /// Continue past malformed markup instead of failing
    pub recover: bool,
    /// Attribute value escaping policy
    pub attribute_escaping: AttributeEscaping,
}

impl ExtractOptions {
    /// Set the read chunk size (clamped to a small minimum)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        self
    }

    /// Disable recovery: the first malformed construct ends the scan with an error
    pub fn strict(mut self) -> Self {
        self.recover = false;
        self
    }

    /// Choose the attribute escaping policy
    pub fn with_attribute_escaping(mut self, escaping: AttributeEscaping) -> Self {
        self.attribute_escaping = escaping;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            recover: true,
            attribute_escaping: AttributeEscaping::Percent,
        }
    }
}
