//! Stepped fragment scan
//!
//! [`Engine`] ties the chunked reader, the scanner and the fragment
//! collector together and runs until the collector's sink asks it to yield
//! or the input ends. Because the scanner can stop between any two tokens,
//! no thread is needed to turn the push-style scan into a pull sequence:
//! [`Fragments`] simply keeps the engine between calls to `next()`.

use std::io::Read;
use std::iter::FusedIterator;

use tracing::{debug, warn};

use super::Source;
use crate::core::recovery::RecoveryGuard;
use crate::core::scanner::is_valid_name;
use crate::core::unified_scanner::{ScanHandler, UnifiedScanner};
use crate::error::{Error, Result};
use crate::options::ExtractOptions;
use crate::reader::chunked::ChunkedReader;
use crate::sax::collector::{FragmentCollector, FragmentSink};

/// Outcome of one [`Engine::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// The sink asked the scan to stop
    Yielded,
    /// End of input reached
    Finished,
}

/// Resumable scan over one document
pub(crate) struct Engine<R: Read, S> {
    reader: ChunkedReader<R>,
    collector: FragmentCollector<S>,
    guard: RecoveryGuard,
    /// Bytes of the current window already scanned
    scanned: usize,
}

impl<R: Read, S: FragmentSink> Engine<R, S> {
    pub fn new(reader: R, tag: &str, options: &ExtractOptions, sink: S) -> Self {
        Self {
            reader: ChunkedReader::with_chunk_size(reader, options.chunk_size),
            collector: FragmentCollector::new(tag, options.attribute_escaping, sink),
            guard: RecoveryGuard::new(options.recover),
            scanned: 0,
        }
    }

    /// Scan until the sink yields, the input ends, or the scan fails.
    ///
    /// On failure any partially built fragment is dropped.
    pub fn run(&mut self) -> Result<Progress> {
        loop {
            let window = self.reader.window();
            if self.scanned < window.len() {
                let base = self.reader.offset() + self.scanned as u64;
                let mut handler = self.guard.wrap(&mut self.collector, base);
                self.scanned += UnifiedScanner::new(&window[self.scanned..]).scan(&mut handler);

                if let Some(error) = self.guard.take_error() {
                    return Err(self.fail(error));
                }
                if self.collector.should_yield() {
                    return Ok(Progress::Yielded);
                }
                continue;
            }

            self.reader.consume(self.scanned);
            self.scanned = 0;

            if self.reader.is_eof() {
                return self.finish();
            }
            if let Err(error) = self.reader.fill_buffer() {
                return Err(self.fail(error.into()));
            }
        }
    }

    pub fn collector_mut(&mut self) -> &mut FragmentCollector<S> {
        &mut self.collector
    }

    /// Problems skipped so far in recovery mode
    pub fn recovered(&self) -> usize {
        self.guard.recovered()
    }

    fn finish(&mut self) -> Result<Progress> {
        if let Err(error) = self.guard.finish(self.reader.offset()) {
            return Err(self.fail(error));
        }
        if self.collector.discard() {
            warn!("input ended inside a fragment; partial fragment dropped");
        }
        debug!(
            fragments = self.collector.emitted(),
            recovered = self.guard.recovered(),
            bytes = self.reader.offset(),
            examined = self.reader.examined(),
            "scan finished"
        );
        Ok(Progress::Finished)
    }

    fn fail(&mut self, error: Error) -> Error {
        if self.collector.discard() {
            warn!(%error, "scan failed inside a fragment; partial fragment dropped");
        } else {
            warn!(%error, "scan failed");
        }
        error
    }
}

/// Reject tags that could never match an element name
pub(crate) fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(Error::InvalidArgument("tag is not set"));
    }
    if !is_valid_name(tag) {
        return Err(Error::InvalidArgument("tag is not a valid element name"));
    }
    Ok(())
}

/// Open the source and build an engine for it
pub(crate) fn start<S: FragmentSink>(
    source: Source,
    tag: &str,
    options: &ExtractOptions,
    sink: S,
) -> Result<Engine<Box<dyn Read + Send>, S>> {
    debug!(
        tag,
        chunk_size = options.chunk_size,
        recover = options.recover,
        "scan started"
    );
    let reader = source.open()?;
    Ok(Engine::new(reader, tag, options, sink))
}

/// Where a pull sequence stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// No fragment requested yet; the source has not been opened
    NotStarted,
    /// A fragment was handed out; the scan is paused right after it
    Suspended,
    /// Input exhausted or scan failed; no more reads will happen
    Finished,
}

enum ScanState {
    NotStarted {
        source: Source,
        tag: Box<str>,
        options: ExtractOptions,
    },
    Suspended(Box<Engine<Box<dyn Read + Send>, Option<String>>>),
    Finished,
}

/// Lazy, forward-only sequence of fragments, scanned on the caller's thread
///
/// Each call to `next()` reads and scans just enough input to complete
/// one fragment. A failure is reported as a single `Err` item, after which
/// the sequence is finished. The source is closed when the sequence
/// finishes or is dropped.
pub struct Fragments {
    state: ScanState,
    recovered: usize,
}

impl Fragments {
    pub(crate) fn new(source: Source, tag: Box<str>, options: ExtractOptions) -> Self {
        Self {
            state: ScanState::NotStarted {
                source,
                tag,
                options,
            },
            recovered: 0,
        }
    }

    /// Extract fragments from any byte source
    pub fn from_reader<R: Read + Send + 'static>(
        reader: R,
        tag: &str,
        options: ExtractOptions,
    ) -> Result<Self> {
        validate_tag(tag)?;
        Ok(Self::new(Source::Reader(Box::new(reader)), tag.into(), options))
    }

    /// Current position in the NotStarted / Suspended / Finished cycle
    pub fn phase(&self) -> ScanPhase {
        match self.state {
            ScanState::NotStarted { .. } => ScanPhase::NotStarted,
            ScanState::Suspended(_) => ScanPhase::Suspended,
            ScanState::Finished => ScanPhase::Finished,
        }
    }

    /// Malformed constructs skipped so far (recovery mode only)
    pub fn recovered(&self) -> usize {
        match &self.state {
            ScanState::Suspended(engine) => engine.recovered(),
            _ => self.recovered,
        }
    }
}

impl Iterator for Fragments {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut engine = match std::mem::replace(&mut self.state, ScanState::Finished) {
            ScanState::Finished => return None,
            ScanState::Suspended(engine) => engine,
            ScanState::NotStarted {
                source,
                tag,
                options,
            } => match start(source, &tag, &options, None) {
                Ok(engine) => Box::new(engine),
                Err(error) => return Some(Err(error)),
            },
        };

        let outcome = engine.run();
        self.recovered = engine.recovered();

        match outcome {
            Ok(Progress::Yielded) => {
                let fragment = engine.collector_mut().sink_mut().take()?;
                self.state = ScanState::Suspended(engine);
                Some(Ok(fragment))
            }
            Ok(Progress::Finished) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

impl FusedIterator for Fragments {}

impl std::fmt::Debug for Fragments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragments")
            .field("phase", &self.phase())
            .field("recovered", &self.recovered())
            .finish()
    }
}
