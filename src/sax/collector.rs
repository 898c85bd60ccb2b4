//! Fragment Collector
//!
//! Implements ScanHandler to rebuild every subtree rooted at the target tag
//! as a standalone XML string.
//!
//! Depth counts open target-tag elements only. Everything seen while the
//! depth is positive is re-serialized into the buffer, so non-target
//! nesting of any depth is copied as-is. A nested element with the target
//! name raises the depth instead of starting a new fragment, which means
//! only the outermost instance is ever emitted.

use std::borrow::Cow;

use tracing::trace;

use crate::core::entities::{decode_str, escape_attribute, escape_text};
use crate::core::unified_scanner::ScanHandler;
use crate::options::AttributeEscaping;

/// Receiver for completed fragments
pub trait FragmentSink {
    /// Take ownership of a completed fragment
    fn emit(&mut self, fragment: String);

    /// Whether the scan should stop before the next token
    fn should_yield(&self) -> bool {
        false
    }
}

/// One-slot sink: holds a single fragment and asks the scan to stop until it is taken
impl FragmentSink for Option<String> {
    fn emit(&mut self, fragment: String) {
        debug_assert!(self.is_none(), "fragment slot already occupied");
        *self = Some(fragment);
    }

    fn should_yield(&self) -> bool {
        self.is_some()
    }
}

/// Collect-everything sink, never yields
impl FragmentSink for Vec<String> {
    fn emit(&mut self, fragment: String) {
        self.push(fragment);
    }
}

/// Collector that re-serializes target-tag subtrees
pub struct FragmentCollector<S> {
    tag: Box<str>,
    escaping: AttributeEscaping,
    /// Open target-tag elements at the current position
    depth: usize,
    /// Fragment being built
    buffer: String,
    /// Fragments emitted so far
    emitted: usize,
    sink: S,
}

impl<S: FragmentSink> FragmentCollector<S> {
    /// Create a collector for `tag` that hands fragments to `sink`
    pub fn new(tag: impl Into<Box<str>>, escaping: AttributeEscaping, sink: S) -> Self {
        Self {
            tag: tag.into(),
            escaping,
            depth: 0,
            buffer: String::with_capacity(1024),
            emitted: 0,
            sink,
        }
    }

    /// Element start with decoded attribute values
    pub fn on_element_start(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.open_tag(
            name,
            attrs
                .iter()
                .map(|&(n, v)| (Cow::Borrowed(n), Cow::Borrowed(v))),
        );
    }

    /// Element end
    pub fn on_element_end(&mut self, name: &str) {
        // Nothing captured yet: this close belongs to content outside any target
        if self.buffer.is_empty() {
            return;
        }

        let is_target = name == &*self.tag;
        if is_target {
            self.depth = self.depth.saturating_sub(1);
        }

        if self.depth > 0 {
            self.push_close_tag(name);
        }

        if self.depth == 0 && is_target {
            self.push_close_tag(name);
            let fragment = std::mem::take(&mut self.buffer);
            self.emitted += 1;
            trace!(ordinal = self.emitted, len = fragment.len(), "fragment complete");
            self.sink.emit(fragment);
        }
    }

    /// Decoded character data
    pub fn on_text(&mut self, content: &str) {
        if self.depth > 0 {
            self.buffer.push_str(&escape_text(content));
        }
    }

    /// Drop a partially built fragment
    pub fn discard(&mut self) -> bool {
        let had_partial = !self.buffer.is_empty();
        self.buffer.clear();
        self.depth = 0;
        had_partial
    }

    /// Current target-tag depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of fragments emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Check if a fragment is being built
    pub fn in_fragment(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn open_tag<'v, I>(&mut self, name: &str, attrs: I)
    where
        I: Iterator<Item = (Cow<'v, str>, Cow<'v, str>)>,
    {
        if name == &*self.tag {
            self.depth += 1;
        }
        if self.depth == 0 {
            return;
        }

        self.buffer.push('<');
        self.buffer.push_str(name);
        for (attr_name, value) in attrs {
            self.buffer.push(' ');
            self.buffer.push_str(&attr_name);
            self.buffer.push_str("=\"");
            self.buffer.push_str(&escape_attribute(&value, self.escaping));
            self.buffer.push('"');
        }
        self.buffer.push('>');
    }

    fn push_close_tag(&mut self, name: &str) {
        self.buffer.push_str("</");
        self.buffer.push_str(name);
        self.buffer.push('>');
    }

    /// Fast check on raw bytes before paying for any decoding
    fn wants(&self, name: &[u8]) -> bool {
        self.depth > 0 || name == self.tag.as_bytes()
    }
}

impl<S: FragmentSink> ScanHandler for FragmentCollector<S> {
    fn start_element(&mut self, name: &[u8], attrs: &[(&[u8], &[u8])], is_empty: bool) {
        if !self.wants(name) {
            return;
        }

        let name = String::from_utf8_lossy(name);
        self.open_tag(
            &name,
            attrs
                .iter()
                .map(|&(n, v)| (String::from_utf8_lossy(n), decode_str(v))),
        );

        // Self-closing syntax is rebuilt as an explicit pair
        if is_empty {
            self.on_element_end(&name);
        }
    }

    fn end_element(&mut self, name: &[u8]) {
        if self.buffer.is_empty() {
            return;
        }
        self.on_element_end(&String::from_utf8_lossy(name));
    }

    fn text(&mut self, text: &[u8], needs_entity_decode: bool) {
        if self.depth == 0 {
            return;
        }
        if needs_entity_decode {
            self.on_text(&decode_str(text));
        } else {
            self.on_text(&String::from_utf8_lossy(text));
        }
    }

    fn cdata(&mut self, content: &[u8]) {
        if self.depth > 0 {
            self.on_text(&String::from_utf8_lossy(content));
        }
    }

    fn should_yield(&self) -> bool {
        self.sink.should_yield()
    }
}
