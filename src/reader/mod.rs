//! XML Reader Module
//!
//! Bounded-memory input: the document is read in chunks and only the
//! unscanned tail stays buffered.

pub mod chunked;

pub use chunked::ChunkedReader;
