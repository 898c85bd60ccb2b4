//! xmlsplit - Streaming extraction of repeated XML elements
//!
//! Every subtree rooted at a chosen element name is returned as a
//! standalone, re-serialized XML string, in document order, while the
//! document is read in bounded chunks:
//!
//! ```no_run
//! for book in xmlsplit::fragments("catalog.xml", "book")? {
//!     let book = book?;
//!     // "<book id=\"1\"><title>...</title></book>"
//!     println!("{book}");
//! }
//! # Ok::<(), xmlsplit::Error>(())
//! ```
//!
//! Pipeline:
//! ChunkedReader -> UnifiedScanner -> RecoveryGuard -> FragmentCollector -> sink
//!
//! Strategies:
//! - Stepped: [`Fragments`], the scan pauses between tokens on the caller's thread
//! - Threaded: [`BackgroundFragments`], the scan runs on a worker thread
//!
//! Fragments are rebuilt from parse events rather than copied from the
//! input: self-closing elements become explicit pairs, entities are
//! decoded and re-escaped, comments and processing instructions are
//! dropped. Malformed markup is skipped by default; see
//! [`ExtractOptions::strict`].

pub mod core;
mod error;
mod extract;
mod options;
pub mod reader;
pub mod sax;
pub mod strategy;

pub use error::{Error, Result};
pub use extract::{fragments, FragmentReader};
pub use options::{AttributeEscaping, ExtractOptions};
pub use sax::{FragmentCollector, FragmentSink};
pub use strategy::{BackgroundFragments, Fragments, ScanPhase};
