//! Unified Scanner with ScanHandler Trait
//!
//! Push-style tokenizer: the scanner walks a window of input and calls
//! [`ScanHandler`] methods in document order. Names, attribute values and
//! text are handed out as slices of the window, so nothing is copied
//! unless the handler decides to keep it.
//!
//! The scanner is lenient. Anything it cannot make sense of is reported
//! through [`ScanHandler::malformed`] and then skipped or passed on as text;
//! a scan never fails. Unlike a classic SAX loop, the handler can ask the
//! scanner to stop between two tokens ([`ScanHandler::should_yield`]), and
//! [`UnifiedScanner::scan`] reports how far it got so the caller can resume.

use super::scanner::{doctype_end, is_name_start_char, Scanner};

/// Trait for handling scan events
///
/// Implement this trait to receive XML parsing events. Slices borrow from
/// the scanned window and are only valid for the duration of the call.
pub trait ScanHandler {
    /// Called when an element starts
    ///
    /// # Arguments
    /// * `name` - Element name as written (including any prefix)
    /// * `attrs` - Raw (name, value) pairs in document order; values are not entity-decoded
    /// * `is_empty` - True if this is a self-closing element (e.g., `<br/>`)
    fn start_element(&mut self, name: &[u8], attrs: &[(&[u8], &[u8])], is_empty: bool);

    /// Called when an element ends
    fn end_element(&mut self, name: &[u8]);

    /// Called for text content
    ///
    /// # Arguments
    /// * `text` - Raw text between two markup tokens
    /// * `needs_entity_decode` - True if the text contains entity references
    fn text(&mut self, text: &[u8], needs_entity_decode: bool);

    /// Called for CDATA sections (content excludes `<![CDATA[` and `]]>`)
    fn cdata(&mut self, content: &[u8]);

    /// Called for comments (content excludes `<!--` and `-->`)
    fn comment(&mut self, _content: &[u8]) {}

    /// Called for processing instructions, including the XML declaration
    fn processing_instruction(&mut self, _target: &[u8], _data: Option<&[u8]>) {}

    /// Called for DOCTYPE (content starts after `<!`)
    fn doctype(&mut self, _content: &[u8]) {}

    /// Called when the scanner recovers from malformed markup
    ///
    /// `offset` is relative to the start of the scanned window.
    fn malformed(&mut self, _offset: usize, _reason: &'static str) {}

    /// Checked before every token; returning true stops the scan
    fn should_yield(&self) -> bool {
        false
    }
}

/// Unified scanner that uses ScanHandler for event dispatch
pub struct UnifiedScanner<'a> {
    scanner: Scanner<'a>,
    /// Reusable attribute buffer to avoid per-element allocations
    attrs_buf: Vec<(&'a [u8], &'a [u8])>,
}

impl<'a> UnifiedScanner<'a> {
    /// Create a new unified scanner for the input
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            scanner: Scanner::new(input),
            attrs_buf: Vec::with_capacity(8), // Most elements have < 8 attrs
        }
    }

    /// Scan until the input is exhausted or the handler asks to yield.
    ///
    /// Returns the number of bytes consumed. Tokens are never split: when
    /// the scan stops early, the returned position is the start of the
    /// next unscanned token.
    pub fn scan<H: ScanHandler>(&mut self, handler: &mut H) -> usize {
        while !self.scanner.is_eof() && !handler.should_yield() {
            match self.scanner.peek() {
                Some(b'<') => self.scan_markup(handler),
                Some(_) => self.scan_text(handler),
                None => break,
            }
        }
        self.scanner.position()
    }

    /// Scan markup starting with '<'
    fn scan_markup<H: ScanHandler>(&mut self, handler: &mut H) {
        let start = self.scanner.position();
        self.scanner.advance(1); // Skip '<'

        match self.scanner.peek() {
            Some(b'/') => {
                self.scanner.advance(1);
                self.scan_end_tag(handler, start);
            }
            Some(b'!') => {
                self.scanner.advance(1);
                if self.scanner.starts_with(b"--") {
                    self.scanner.advance(2);
                    self.scan_comment(handler, start);
                } else if self.scanner.starts_with(b"[CDATA[") {
                    self.scanner.advance(7);
                    self.scan_cdata(handler, start);
                } else if matches!(self.scanner.peek(), Some(b'D') | Some(b'd')) {
                    self.scan_doctype(handler, start);
                } else {
                    handler.malformed(start, "unknown declaration");
                    self.skip_to_tag_end();
                }
            }
            Some(b'?') => {
                self.scanner.advance(1);
                self.scan_pi(handler, start);
            }
            Some(c) if is_name_start_char(c) => {
                self.scan_start_tag(handler, start);
            }
            _ => {
                // Invalid markup (e.g., "<1invalid/>"), treat '<' as text and
                // continue from the byte after it
                handler.malformed(start, "invalid markup");
                handler.text(self.scanner.slice(start, start + 1), false);
            }
        }
    }

    /// Scan a start tag; the cursor is on the first byte of the name
    fn scan_start_tag<H: ScanHandler>(&mut self, handler: &mut H, start: usize) {
        let Some(name) = self.scanner.read_name() else {
            return;
        };

        self.attrs_buf.clear();
        self.scanner.skip_whitespace();

        while !self.scanner.is_eof() {
            match self.scanner.peek() {
                Some(b'>') => {
                    self.scanner.advance(1);
                    handler.start_element(name, &self.attrs_buf, false);
                    return;
                }
                Some(b'/') if self.scanner.peek_at(1) == Some(b'>') => {
                    self.scanner.advance(2);
                    handler.start_element(name, &self.attrs_buf, true);
                    return;
                }
                Some(c) if is_name_start_char(c) => {
                    let attr_start = self.scanner.position();
                    match self.scan_attribute() {
                        Some(attr) => self.attrs_buf.push(attr),
                        None => handler.malformed(attr_start, "malformed attribute"),
                    }
                }
                _ => {
                    handler.malformed(self.scanner.position(), "unexpected character in tag");
                    self.scanner.advance(1);
                }
            }
            self.scanner.skip_whitespace();
        }

        handler.malformed(start, "unterminated start tag");
    }

    /// Scan an attribute, returning (name, value)
    fn scan_attribute(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let name = self.scanner.read_name()?;
        self.scanner.skip_whitespace();

        if self.scanner.peek() != Some(b'=') {
            return None;
        }
        self.scanner.advance(1);
        self.scanner.skip_whitespace();

        let quote = self.scanner.peek()?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        self.scanner.advance(1);

        let value_start = self.scanner.position();
        let value_end = match self.scanner.find_byte(quote) {
            Some(pos) => {
                self.scanner.set_position(pos + 1);
                pos
            }
            None => return None,
        };

        Some((name, self.scanner.slice(value_start, value_end)))
    }

    /// Scan an end tag; the cursor is after `</`
    fn scan_end_tag<H: ScanHandler>(&mut self, handler: &mut H, start: usize) {
        self.scanner.skip_whitespace();

        let Some(name) = self.scanner.read_name() else {
            handler.malformed(start, "end tag without a name");
            self.skip_to_tag_end();
            return;
        };

        self.scanner.skip_whitespace();
        if self.scanner.peek() == Some(b'>') {
            self.scanner.advance(1);
        } else {
            handler.malformed(start, "malformed end tag");
            self.skip_to_tag_end();
        }

        handler.end_element(name);
    }

    /// Scan text content up to the next '<'
    fn scan_text<H: ScanHandler>(&mut self, handler: &mut H) {
        let start = self.scanner.position();
        let end = self.scanner.find_byte(b'<').unwrap_or_else(|| self.scanner_len());
        self.scanner.set_position(end);

        let text = self.scanner.slice(start, end);
        if !text.is_empty() {
            handler.text(text, memchr::memchr(b'&', text).is_some());
        }
    }

    /// Scan a comment; the cursor is after `<!--`
    fn scan_comment<H: ScanHandler>(&mut self, handler: &mut H, start: usize) {
        let content_start = self.scanner.position();
        match self.scanner.find_sequence(b"-->") {
            Some(end) => {
                self.scanner.set_position(end + 3);
                handler.comment(self.scanner.slice(content_start, end));
            }
            None => {
                handler.malformed(start, "unterminated comment");
                let end = self.scanner_len();
                self.scanner.set_position(end);
                handler.comment(self.scanner.slice(content_start, end));
            }
        }
    }

    /// Scan a CDATA section; the cursor is after `<![CDATA[`
    fn scan_cdata<H: ScanHandler>(&mut self, handler: &mut H, start: usize) {
        let content_start = self.scanner.position();
        match self.scanner.find_sequence(b"]]>") {
            Some(end) => {
                self.scanner.set_position(end + 3);
                handler.cdata(self.scanner.slice(content_start, end));
            }
            None => {
                handler.malformed(start, "unterminated CDATA section");
                let end = self.scanner_len();
                self.scanner.set_position(end);
                handler.cdata(self.scanner.slice(content_start, end));
            }
        }
    }

    /// Scan a processing instruction; the cursor is after `<?`
    fn scan_pi<H: ScanHandler>(&mut self, handler: &mut H, start: usize) {
        let Some(target) = self.scanner.read_name() else {
            handler.malformed(start, "processing instruction without a target");
            self.skip_past(b"?>");
            return;
        };

        self.scanner.skip_whitespace();
        let data_start = self.scanner.position();

        match self.scanner.find_sequence(b"?>") {
            Some(end) => {
                self.scanner.set_position(end + 2);
                let data = (end > data_start).then(|| self.scanner.slice(data_start, end));
                handler.processing_instruction(target, data);
            }
            None => {
                handler.malformed(start, "unterminated processing instruction");
                self.scanner.set_position(self.scanner_len());
                handler.processing_instruction(target, None);
            }
        }
    }

    /// Scan DOCTYPE; the cursor is after `<!`
    fn scan_doctype<H: ScanHandler>(&mut self, handler: &mut H, start: usize) {
        let content_start = self.scanner.position();
        let rest = self.scanner.slice(content_start, self.scanner_len());

        match doctype_end(rest) {
            Some(offset) => {
                let end = content_start + offset;
                self.scanner.set_position(end + 1);
                handler.doctype(self.scanner.slice(content_start, end));
            }
            None => {
                handler.malformed(start, "unterminated DOCTYPE");
                self.scanner.set_position(self.scanner_len());
            }
        }
    }

    /// Skip to the end of a tag (find '>')
    fn skip_to_tag_end(&mut self) {
        match self.scanner.find_tag_end_quoted() {
            Some(pos) => self.scanner.set_position(pos + 1),
            None => self.scanner.set_position(self.scanner_len()),
        }
    }

    /// Skip past the next occurrence of `needle`, or to the end
    fn skip_past(&mut self, needle: &[u8]) {
        match self.scanner.find_sequence(needle) {
            Some(pos) => self.scanner.set_position(pos + needle.len()),
            None => self.scanner.set_position(self.scanner_len()),
        }
    }

    #[inline]
    fn scanner_len(&self) -> usize {
        self.scanner.input_len()
    }
}
