//! Chunked XML Reader
//!
//! Reads XML from any source implementing Read trait in fixed-size chunks.
//! Only the unscanned tail of the document is kept in memory. The reader
//! tracks how much of that tail consists of complete markup, so a scanner
//! never sees a tag, comment or CDATA section cut in half.

use std::io::{self, Read};

use memchr::{memchr, memchr3, memmem};

use crate::core::scanner::is_name_start_char;

/// Buffer size for reading chunks
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Smallest accepted chunk size
pub const MIN_CHUNK_SIZE: usize = 1;

/// Chunked reader for streaming input
pub struct ChunkedReader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    chunk_size: usize,
    boundary: TokenBoundary,
    /// Document offset of `buffer[0]`
    offset: u64,
    eof: bool,
}

impl<R: Read> ChunkedReader<R> {
    /// Create a new chunked reader
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Create a new chunked reader with a specific chunk size
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        ChunkedReader {
            reader,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            boundary: TokenBoundary::default(),
            offset: 0,
            eof: false,
        }
    }

    /// Read one more chunk. Returns false once the source is exhausted.
    pub fn fill_buffer(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        let len = self.buffer.len();
        self.buffer.resize(len + self.chunk_size, 0);
        let read = loop {
            match self.reader.read(&mut self.buffer[len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(len);
                    return Err(e);
                }
            }
        };
        self.buffer.truncate(len + read);

        if read == 0 {
            self.eof = true;
            return Ok(false);
        }

        self.boundary.advance(&self.buffer);
        Ok(true)
    }

    /// Bytes ready for scanning: complete tokens only, or everything at end of input
    pub fn window(&self) -> &[u8] {
        if self.eof {
            &self.buffer
        } else {
            &self.buffer[..self.boundary.complete()]
        }
    }

    /// Drop `n` scanned bytes from the front of the buffer
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n);
        self.boundary.consume(n);
        self.offset += n as u64;
    }

    /// Document offset of the first byte of [`window`](Self::window)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Check if the source is exhausted (buffered bytes may remain)
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of buffered bytes, scanned or not
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes inspected so far while looking for token boundaries
    pub fn examined(&self) -> u64 {
        self.boundary.examined
    }
}

/// Construct starting at the boundary whose end has not arrived yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// A `<` that needs more bytes to classify
    Opener,
    /// Start tag, end tag or unknown declaration; ends at a `>` outside quotes
    Tag { quote: Option<u8> },
    /// Comment, CDATA section or processing instruction
    Delimited {
        terminator: &'static [u8],
        /// Length of the opener; the terminator is searched after it
        opener: usize,
    },
    /// DOCTYPE; ends at a `>` outside the internal subset
    Doctype { depth: usize },
}

/// How a `<` starts, following the scanner's dispatch
enum Opener {
    Incomplete,
    /// Not markup: the scanner takes the `<` as one byte of text
    Stray,
    Pending(Pending),
}

fn classify(rest: &[u8]) -> Opener {
    const COMMENT: &[u8] = b"<!--";
    const CDATA: &[u8] = b"<![CDATA[";

    let Some(&next) = rest.get(1) else {
        return Opener::Incomplete;
    };
    let pending = match next {
        b'/' => Pending::Tag { quote: None },
        b'?' => Pending::Delimited {
            terminator: b"?>",
            opener: 2,
        },
        b'!' if rest.starts_with(COMMENT) => Pending::Delimited {
            terminator: b"-->",
            opener: COMMENT.len(),
        },
        b'!' if rest.starts_with(CDATA) => Pending::Delimited {
            terminator: b"]]>",
            opener: CDATA.len(),
        },
        b'!' if COMMENT.starts_with(rest) || CDATA.starts_with(rest) => {
            return Opener::Incomplete;
        }
        b'!' if matches!(rest.get(2), Some(b'D' | b'd')) => Pending::Doctype { depth: 0 },
        b'!' => Pending::Tag { quote: None },
        c if is_name_start_char(c) => Pending::Tag { quote: None },
        _ => return Opener::Stray,
    };
    Opener::Pending(pending)
}

/// Incremental search for the end of the last complete token
///
/// Text is complete once the `<` that ends it has arrived; markup is
/// complete once its terminator has. The search resumes where the previous
/// call stopped, so every buffered byte is inspected about once no matter
/// how many reads a token spans.
#[derive(Debug, Default)]
pub struct TokenBoundary {
    /// End of the last complete token
    complete: usize,
    /// Everything before this offset has been inspected
    cursor: usize,
    /// Construct starting at `complete`, if its end is still missing
    pending: Option<Pending>,
    examined: u64,
}

impl TokenBoundary {
    /// Extend the search over `buf`, which must start with the bytes seen
    /// by earlier calls. Returns the length of the complete prefix.
    pub fn advance(&mut self, buf: &[u8]) -> usize {
        loop {
            let from = self.cursor.min(buf.len());
            let found = match self.pending {
                None => self.search_text(buf, from),
                Some(Pending::Opener) => self.search_opener(buf),
                Some(Pending::Tag { quote }) => self.search_tag(buf, from, quote),
                Some(Pending::Delimited { terminator, opener }) => {
                    self.search_delimited(buf, from, terminator, opener)
                }
                Some(Pending::Doctype { depth }) => self.search_doctype(buf, from, depth),
            };
            if !found {
                return self.complete;
            }
        }
    }

    /// Length of the complete prefix
    pub fn complete(&self) -> usize {
        self.complete
    }

    /// Total bytes inspected, counting the few that are looked at again
    /// when a search resumes
    pub fn examined(&self) -> u64 {
        self.examined
    }

    /// Shift offsets after `n` bytes were dropped from the front of the buffer
    pub fn consume(&mut self, n: usize) {
        if n > self.complete {
            // Only at end of input, where the whole remainder is scanned
            *self = Self {
                examined: self.examined,
                ..Self::default()
            };
            return;
        }
        self.complete -= n;
        self.cursor -= n;
    }

    fn inspected(&mut self, bytes: usize) {
        self.examined += bytes as u64;
    }

    fn close(&mut self, end: usize) -> bool {
        self.complete = end;
        self.cursor = end;
        self.pending = None;
        true
    }

    fn wait(&mut self, buf: &[u8], pending: Pending) -> bool {
        self.cursor = buf.len();
        self.pending = Some(pending);
        false
    }

    fn search_text(&mut self, buf: &[u8], from: usize) -> bool {
        match memchr(b'<', &buf[from..]) {
            Some(i) => {
                self.inspected(i + 1);
                self.complete = from + i;
                self.cursor = from + i;
                self.pending = Some(Pending::Opener);
                true
            }
            None => {
                self.inspected(buf.len() - from);
                self.cursor = buf.len();
                false
            }
        }
    }

    fn search_opener(&mut self, buf: &[u8]) -> bool {
        let rest = &buf[self.complete..];
        self.inspected(rest.len().min(9));
        match classify(rest) {
            Opener::Incomplete => self.wait(buf, Pending::Opener),
            Opener::Stray => self.close(self.complete + 1),
            Opener::Pending(pending) => {
                self.cursor = match pending {
                    Pending::Delimited { opener, .. } => self.complete + opener,
                    Pending::Doctype { .. } => self.complete + 2,
                    _ => self.complete + 1,
                };
                self.pending = Some(pending);
                true
            }
        }
    }

    fn search_tag(&mut self, buf: &[u8], from: usize, mut quote: Option<u8>) -> bool {
        let mut pos = from;
        loop {
            let hit = match quote {
                Some(q) => memchr(q, &buf[pos..]),
                None => memchr3(b'>', b'"', b'\'', &buf[pos..]),
            };
            let Some(i) = hit else {
                self.inspected(buf.len() - from);
                return self.wait(buf, Pending::Tag { quote });
            };
            let at = pos + i;
            pos = at + 1;
            match (quote, buf[at]) {
                (Some(_), _) => quote = None,
                (None, b'>') => {
                    self.inspected(pos - from);
                    return self.close(pos);
                }
                (None, q) => quote = Some(q),
            }
        }
    }

    fn search_delimited(
        &mut self,
        buf: &[u8],
        from: usize,
        terminator: &'static [u8],
        opener: usize,
    ) -> bool {
        // Back up far enough to catch a terminator split across reads
        let body = self.complete + opener;
        let start = from.saturating_sub(terminator.len() - 1).max(body);
        match memmem::find(&buf[start..], terminator) {
            Some(i) => {
                let end = start + i + terminator.len();
                self.inspected(end - start);
                self.close(end)
            }
            None => {
                self.inspected(buf.len() - start);
                self.wait(buf, Pending::Delimited { terminator, opener })
            }
        }
    }

    fn search_doctype(&mut self, buf: &[u8], from: usize, mut depth: usize) -> bool {
        let mut pos = from;
        while let Some(i) = memchr3(b'[', b']', b'>', &buf[pos..]) {
            let at = pos + i;
            pos = at + 1;
            match buf[at] {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                _ if depth == 0 => {
                    self.inspected(pos - from);
                    return self.close(pos);
                }
                _ => {}
            }
        }
        self.inspected(buf.len() - from);
        self.wait(buf, Pending::Doctype { depth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn complete_prefix(buf: &[u8]) -> usize {
        TokenBoundary::default().advance(buf)
    }

    /// Feed `input` to a boundary `step` bytes at a time
    fn boundary_in_steps(input: &[u8], step: usize) -> TokenBoundary {
        let mut boundary = TokenBoundary::default();
        let mut end = 0;
        while end < input.len() {
            end = (end + step).min(input.len());
            boundary.advance(&input[..end]);
        }
        boundary
    }

    #[test]
    fn test_complete_prefix_stops_before_partial_tag() {
        assert_eq!(complete_prefix(b"<root><item a=\"1"), 6);
        assert_eq!(complete_prefix(b"<root>text"), 6);
        assert_eq!(complete_prefix(b"text only"), 0);
        assert_eq!(complete_prefix(b"<a></a>"), 7);
    }

    #[test]
    fn test_complete_prefix_ignores_gt_inside_constructs() {
        assert_eq!(complete_prefix(b"<a attr=\">\">"), 12);
        assert_eq!(complete_prefix(b"<r><!-- a > b"), 3);
        assert_eq!(complete_prefix(b"<r><![CDATA[ x > y"), 3);
        assert_eq!(complete_prefix(b"<r><?pi a > b"), 3);
        assert_eq!(complete_prefix(b"<!DOCTYPE r [<!ENTITY e \"x\">"), 0);
    }

    #[test]
    fn test_complete_prefix_partial_openers() {
        assert_eq!(complete_prefix(b"<r><!-"), 3);
        assert_eq!(complete_prefix(b"<r><![CDA"), 3);
        assert_eq!(complete_prefix(b"<r><"), 3);
    }

    #[test]
    fn test_reader_windows_only_complete_tokens() {
        let data = b"<root><item>one</item><item>two</item></root>";
        let mut reader = ChunkedReader::with_chunk_size(Cursor::new(data.to_vec()), 10);

        assert!(reader.fill_buffer().unwrap());
        assert_eq!(reader.window(), b"<root>");

        // "<root><item>one</ite" - the end tag is still incomplete
        assert!(reader.fill_buffer().unwrap());
        assert_eq!(reader.window(), b"<root><item>one");

        reader.consume(6);
        assert_eq!(reader.offset(), 6);
        assert_eq!(reader.window(), b"<item>one");

        assert!(reader.fill_buffer().unwrap());
        assert_eq!(reader.window(), b"<item>one</item><item>");
    }

    #[test]
    fn test_reader_eof_exposes_remainder() {
        let data = b"<root>tail";
        let mut reader = ChunkedReader::with_chunk_size(Cursor::new(data.to_vec()), 64);

        assert!(reader.fill_buffer().unwrap());
        assert_eq!(reader.window(), b"<root>");
        assert!(!reader.fill_buffer().unwrap());
        assert!(reader.is_eof());
        assert_eq!(reader.window(), b"<root>tail");
    }

    #[test]
    fn test_consume_everything() {
        let mut reader = ChunkedReader::new(Cursor::new(b"<a/>".to_vec()));
        reader.fill_buffer().unwrap();
        reader.consume(100);
        assert_eq!(reader.buffered_len(), 0);
        assert_eq!(reader.offset(), 4);
    }

    #[test]
    fn test_stray_lt_is_one_byte_token() {
        assert_eq!(complete_prefix(b"<t>a < b</t>"), 12);
        // A quote after a stray '<' must not open a quoted run
        assert_eq!(complete_prefix(b"<t>a <'b</t><t>"), 15);
        assert_eq!(complete_prefix(b"<t>1 <2</t>"), 11);
    }

    #[test]
    fn test_boundary_resumes_inside_text() {
        let mut input = b"<t>".to_vec();
        input.extend(std::iter::repeat(b'x').take(100_000));
        input.extend_from_slice(b"</t>");

        let boundary = boundary_in_steps(&input, 64);
        assert_eq!(boundary.complete(), input.len());
        assert!(boundary.examined() < 2 * input.len() as u64, "{}", boundary.examined());
    }

    #[test]
    fn test_boundary_resumes_inside_quoted_attribute() {
        let mut input = b"<t a=\"".to_vec();
        input.extend(std::iter::repeat(b'>').take(50_000));
        input.extend_from_slice(b"\">");

        let boundary = boundary_in_steps(&input, 7);
        assert_eq!(boundary.complete(), input.len());
        assert!(boundary.examined() < 2 * input.len() as u64, "{}", boundary.examined());
    }

    #[test]
    fn test_terminators_split_across_reads() {
        for input in [
            &b"<!-- a -- b -->"[..],
            b"<![CDATA[ ]] ]]>",
            b"<?pi x ? y?>",
            b"<!DOCTYPE r [<!ENTITY e \"x\">]>",
        ] {
            for step in 1..4 {
                let boundary = boundary_in_steps(input, step);
                assert_eq!(
                    boundary.complete(),
                    input.len(),
                    "{} in steps of {step}",
                    String::from_utf8_lossy(input)
                );
            }
        }
    }

    #[test]
    fn test_reader_read_ahead_bounded_after_stray_lt() {
        let mut data = b"<r><t>a <'b</t>".to_vec();
        for _ in 0..1000 {
            data.extend_from_slice(b"<t>x</t>");
        }
        let mut reader = ChunkedReader::with_chunk_size(Cursor::new(data), 64);

        assert!(reader.fill_buffer().unwrap());
        assert!(reader.fill_buffer().unwrap());
        let window = reader.window().len();
        assert!(window > 100, "window stuck at {window} bytes");
    }
}
