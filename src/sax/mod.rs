//! SAX Module
//!
//! Event-driven fragment rebuilding on top of the unified scanner:
//!
//! ```text
//! ChunkedReader ---> UnifiedScanner ---> FragmentCollector ---> FragmentSink
//!                                               |
//!                                               v
//!                                    "<item ...>...</item>"
//! ```
//!
//! The collector never sees the whole document. It keeps only the fragment
//! currently being built and hands each finished one to its sink, which
//! also decides when the scan should pause.

pub mod collector;

pub use collector::{FragmentCollector, FragmentSink};
