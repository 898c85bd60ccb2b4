//! Recovery policy for malformed markup
//!
//! The scanner always recovers. [`RecoveryGuard`] decides what that means
//! for a whole document: in recovery mode every problem is logged and
//! counted; in strict mode the first problem is kept as an error and the
//! scan is asked to stop. Strict mode also checks that end tags match the
//! open element, which the scanner cannot do across windows.

use tracing::debug;

use super::unified_scanner::ScanHandler;
use crate::error::Error;

/// Document-wide state for malformed-input handling
#[derive(Debug)]
pub struct RecoveryGuard {
    recover: bool,
    /// Open element names, only tracked in strict mode
    open: Vec<Box<[u8]>>,
    error: Option<Error>,
    recovered: usize,
}

impl RecoveryGuard {
    pub fn new(recover: bool) -> Self {
        Self {
            recover,
            open: Vec::new(),
            error: None,
            recovered: 0,
        }
    }

    /// Wrap a handler for one scan window starting at document offset `base`
    pub fn wrap<'g, H: ScanHandler>(&'g mut self, handler: &'g mut H, base: u64) -> Guarded<'g, H> {
        Guarded {
            handler,
            guard: self,
            base,
        }
    }

    /// Number of problems skipped in recovery mode
    pub fn recovered(&self) -> usize {
        self.recovered
    }

    /// Take the pending strict-mode error, if any
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// End-of-input check: in strict mode, every element must be closed
    pub fn finish(&mut self, offset: u64) -> Result<(), Error> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        match self.open.pop() {
            Some(name) if !self.recover => Err(Error::malformed(
                offset,
                format!("unclosed element <{}>", String::from_utf8_lossy(&name)),
            )),
            _ => Ok(()),
        }
    }

    fn report(&mut self, offset: u64, reason: impl Into<String>) {
        let reason: String = reason.into();
        if self.recover {
            self.recovered += 1;
            debug!(offset, reason = %reason, "recovered from malformed markup");
        } else if self.error.is_none() {
            self.error = Some(Error::malformed(offset, reason));
        }
    }
}

/// Handler wrapper applying a [`RecoveryGuard`] to one scan window
pub struct Guarded<'g, H> {
    handler: &'g mut H,
    guard: &'g mut RecoveryGuard,
    base: u64,
}

impl<H: ScanHandler> ScanHandler for Guarded<'_, H> {
    fn start_element(&mut self, name: &[u8], attrs: &[(&[u8], &[u8])], is_empty: bool) {
        if !self.guard.recover && !is_empty {
            self.guard.open.push(name.into());
        }
        self.handler.start_element(name, attrs, is_empty);
    }

    fn end_element(&mut self, name: &[u8]) {
        if !self.guard.recover {
            // Mismatches are located at the start of the window they were found in
            match self.guard.open.pop() {
                Some(open) if *open == *name => {}
                Some(open) => {
                    let reason = format!(
                        "expected </{}>, found </{}>",
                        String::from_utf8_lossy(&open),
                        String::from_utf8_lossy(name)
                    );
                    self.guard.report(self.base, reason);
                    return;
                }
                None => {
                    let reason = format!(
                        "end tag </{}> without an open element",
                        String::from_utf8_lossy(name)
                    );
                    self.guard.report(self.base, reason);
                    return;
                }
            }
        }
        self.handler.end_element(name);
    }

    fn text(&mut self, text: &[u8], needs_entity_decode: bool) {
        self.handler.text(text, needs_entity_decode);
    }

    fn cdata(&mut self, content: &[u8]) {
        self.handler.cdata(content);
    }

    fn comment(&mut self, content: &[u8]) {
        self.handler.comment(content);
    }

    fn processing_instruction(&mut self, target: &[u8], data: Option<&[u8]>) {
        self.handler.processing_instruction(target, data);
    }

    fn doctype(&mut self, content: &[u8]) {
        self.handler.doctype(content);
    }

    fn malformed(&mut self, offset: usize, reason: &'static str) {
        self.guard.report(self.base + offset as u64, reason);
        self.handler.malformed(offset, reason);
    }

    fn should_yield(&self) -> bool {
        self.guard.error.is_some() || self.handler.should_yield()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::unified_scanner::UnifiedScanner;

    #[derive(Default)]
    struct Counter {
        starts: usize,
        ends: usize,
    }

    impl ScanHandler for Counter {
        fn start_element(&mut self, _name: &[u8], _attrs: &[(&[u8], &[u8])], _is_empty: bool) {
            self.starts += 1;
        }

        fn end_element(&mut self, _name: &[u8]) {
            self.ends += 1;
        }

        fn text(&mut self, _text: &[u8], _needs_entity_decode: bool) {}

        fn cdata(&mut self, _content: &[u8]) {}
    }

    fn run(input: &[u8], recover: bool) -> (RecoveryGuard, Counter) {
        let mut guard = RecoveryGuard::new(recover);
        let mut counter = Counter::default();
        UnifiedScanner::new(input).scan(&mut guard.wrap(&mut counter, 0));
        (guard, counter)
    }

    #[test]
    fn test_recovery_counts_problems() {
        let (mut guard, counter) = run(b"<a><1x></b></a>", true);
        assert_eq!(guard.recovered(), 1);
        assert_eq!(counter.starts, 1);
        assert_eq!(counter.ends, 2);
        assert!(guard.take_error().is_none());
        assert!(guard.finish(15).is_ok());
    }

    #[test]
    fn test_strict_stops_on_invalid_markup() {
        let (mut guard, counter) = run(b"<a><1x><b></b></a>", false);
        assert_eq!(counter.starts, 1);
        match guard.take_error() {
            Some(Error::Malformed { offset, reason }) => {
                assert_eq!(offset, 3);
                assert_eq!(reason, "invalid markup");
            }
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_rejects_mismatched_end_tag() {
        let (mut guard, counter) = run(b"<a><b></a>", false);
        assert_eq!(counter.ends, 0);
        let err = guard.take_error().expect("mismatch should be reported");
        assert!(err.to_string().contains("expected </b>, found </a>"));
    }

    #[test]
    fn test_strict_requires_closed_elements() {
        let (mut guard, _) = run(b"<a><b></b>", false);
        assert!(guard.take_error().is_none());
        let err = guard.finish(10).unwrap_err();
        assert!(err.to_string().contains("unclosed element <a>"));
    }

    #[test]
    fn test_self_closing_needs_no_end_tag() {
        let (mut guard, _) = run(b"<a><b/></a>", false);
        assert!(guard.finish(11).is_ok());
    }
}
