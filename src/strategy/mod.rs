//! Pull Strategies
//!
//! Two ways to turn the push-style scan into a pull sequence:
//! - Stepped: the scan pauses between tokens on the caller's thread (default)
//! - Threaded: the scan runs on a worker thread, one fragment per request

pub mod streaming;
pub mod threaded;

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use tracing::debug;

use crate::core::encoding::utf8_reader;
use crate::error::Result;

pub use streaming::{Fragments, ScanPhase};
pub use threaded::BackgroundFragments;

/// Document source, opened on first use
pub(crate) enum Source {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

impl Source {
    /// Open the source as a UTF-8 byte stream
    pub(crate) fn open(self) -> Result<Box<dyn Read + Send>> {
        let raw: Box<dyn Read + Send> = match self {
            Source::Path(path) => {
                debug!(path = %path.display(), "opening document");
                Box::new(File::open(&path)?)
            }
            Source::Reader(reader) => reader,
        };
        Ok(utf8_reader(raw)?)
    }
}
