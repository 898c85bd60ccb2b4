//! Threaded fragment scan
//!
//! Runs the scan on a worker thread and hands fragments over through a pair
//! of channels. The worker only scans after the consumer asks for a
//! fragment and stops again right after producing it, so the two sides
//! strictly alternate and at most one fragment is ever in flight.
//!
//! Dropping the sequence closes the demand channel; the paused worker sees
//! that, stops scanning, closes the source and is joined.

use std::io::Read;
use std::iter::FusedIterator;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use super::streaming::{start, validate_tag, Progress, ScanPhase};
use super::Source;
use crate::error::{Error, Result};
use crate::options::ExtractOptions;
use crate::sax::collector::FragmentSink;

/// Worker side of the handoff
struct Handoff {
    demand: Receiver<()>,
    results: Sender<Result<String>>,
    /// Consumer is gone; stop scanning
    closed: bool,
}

impl FragmentSink for Handoff {
    fn emit(&mut self, fragment: String) {
        // Hand over, then stay paused until the next request
        if self.results.send(Ok(fragment)).is_err() || self.demand.recv().is_err() {
            self.closed = true;
        }
    }

    fn should_yield(&self) -> bool {
        self.closed
    }
}

fn produce(
    source: Source,
    tag: Box<str>,
    options: ExtractOptions,
    demand: Receiver<()>,
    results: Sender<Result<String>>,
) {
    // Nothing is opened until the first fragment is requested
    if demand.recv().is_err() {
        debug!("background scan dropped before first request");
        return;
    }
    debug!("background scan started");

    let failures = results.clone();
    let sink = Handoff {
        demand,
        results,
        closed: false,
    };
    let mut engine = match start(source, &tag, &options, sink) {
        Ok(engine) => engine,
        Err(error) => {
            let _ = failures.send(Err(error));
            return;
        }
    };

    match engine.run() {
        Ok(Progress::Finished) => {}
        Ok(Progress::Yielded) => debug!("consumer dropped the sequence; scan stopped"),
        Err(error) => {
            let _ = failures.send(Err(error));
        }
    }
    debug!("background scan stopped");
}

/// Lazy fragment sequence scanned on a background thread
///
/// Same contract as [`Fragments`](super::Fragments): document order,
/// nothing read before the first `next()`, one `Err` item on failure and
/// then the end of the sequence. A panic on the worker is reported as
/// [`Error::WorkerPanicked`].
pub struct BackgroundFragments {
    demand: Option<Sender<()>>,
    results: Receiver<Result<String>>,
    worker: Option<JoinHandle<()>>,
    phase: ScanPhase,
}

impl BackgroundFragments {
    pub(crate) fn spawn(source: Source, tag: Box<str>, options: ExtractOptions) -> Result<Self> {
        let (demand_tx, demand_rx) = crossbeam_channel::bounded::<()>(1);
        let (results_tx, results_rx) = crossbeam_channel::bounded::<Result<String>>(1);

        let worker = thread::Builder::new()
            .name("xmlsplit-scan".into())
            .spawn(move || produce(source, tag, options, demand_rx, results_tx))?;

        Ok(Self {
            demand: Some(demand_tx),
            results: results_rx,
            worker: Some(worker),
            phase: ScanPhase::NotStarted,
        })
    }

    /// Extract fragments from any byte source on a worker thread
    pub fn from_reader<R: Read + Send + 'static>(
        reader: R,
        tag: &str,
        options: ExtractOptions,
    ) -> Result<Self> {
        validate_tag(tag)?;
        Self::spawn(Source::Reader(Box::new(reader)), tag.into(), options)
    }

    /// Current position in the NotStarted / Suspended / Finished cycle
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Close the demand channel and wait for the worker
    ///
    /// Returns false if the worker panicked.
    fn shutdown(&mut self) -> bool {
        self.phase = ScanPhase::Finished;
        self.demand.take();
        match self.worker.take() {
            Some(worker) => worker.join().is_ok(),
            None => true,
        }
    }
}

impl Iterator for BackgroundFragments {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == ScanPhase::Finished {
            return None;
        }

        let requested = self
            .demand
            .as_ref()
            .is_some_and(|demand| demand.send(()).is_ok());

        let received = if requested { self.results.recv().ok() } else { None };

        match received {
            Some(Ok(fragment)) => {
                self.phase = ScanPhase::Suspended;
                Some(Ok(fragment))
            }
            Some(Err(error)) => {
                self.shutdown();
                Some(Err(error))
            }
            // Worker closed its side: end of input, or it died
            None => {
                if self.shutdown() {
                    None
                } else {
                    Some(Err(Error::WorkerPanicked))
                }
            }
        }
    }
}

impl FusedIterator for BackgroundFragments {}

impl std::fmt::Debug for BackgroundFragments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundFragments")
            .field("phase", &self.phase)
            .finish()
    }
}

impl Drop for BackgroundFragments {
    fn drop(&mut self) {
        self.shutdown();
    }
}
