//! XML Encoding Detection and Conversion
//!
//! Handles detection of UTF-16 and other encodings based on BOM and byte patterns.
//! UTF-16 input is converted to UTF-8 on the fly so the scanner only ever sees UTF-8.

use std::io::{self, Cursor, Read};

/// Detect the encoding of XML input based on BOM or byte patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Sniff the first bytes of `reader` and return a reader producing UTF-8
///
/// A UTF-8 BOM is dropped; UTF-16 (with or without BOM) is transcoded.
pub fn utf8_reader<R: Read + Send + 'static>(mut reader: R) -> io::Result<Box<dyn Read + Send>> {
    let mut head = [0u8; 3];
    let mut len = 0;
    while len < head.len() {
        match reader.read(&mut head[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let head = &head[..len];

    Ok(match XmlEncoding::detect(head) {
        XmlEncoding::Utf8 => {
            let skip = if head.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };
            Box::new(Cursor::new(head[skip..].to_vec()).chain(reader))
        }
        encoding => {
            let big_endian = encoding == XmlEncoding::Utf16Be;
            let bom = matches!(head, [0xFF, 0xFE, ..] | [0xFE, 0xFF, ..]);
            let skip = if bom { 2 } else { 0 };
            let source = Cursor::new(head[skip..].to_vec()).chain(reader);
            Box::new(Utf16Reader::new(source, big_endian))
        }
    })
}

/// Streaming UTF-16 to UTF-8 transcoder
///
/// Unpaired surrogates and a dangling odd byte become U+FFFD.
pub struct Utf16Reader<R> {
    inner: R,
    big_endian: bool,
    /// Transcoded bytes not yet handed out
    pending: Vec<u8>,
    pending_pos: usize,
    /// Odd byte left over from the previous read
    carry_byte: Option<u8>,
    /// High surrogate waiting for its pair
    carry_unit: Option<u16>,
    eof: bool,
}

impl<R: Read> Utf16Reader<R> {
    pub fn new(inner: R, big_endian: bool) -> Self {
        Self {
            inner,
            big_endian,
            pending: Vec::new(),
            pending_pos: 0,
            carry_byte: None,
            carry_unit: None,
            eof: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut raw = [0u8; 4096];
        let mut len = 0;
        if let Some(b) = self.carry_byte.take() {
            raw[0] = b;
            len = 1;
        }

        let read = loop {
            match self.inner.read(&mut raw[len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        self.pending.clear();
        self.pending_pos = 0;

        if read == 0 {
            self.eof = true;
            // One replacement each for a dangling surrogate and a dangling byte
            if self.carry_unit.take().is_some() {
                self.pending.extend_from_slice("\u{FFFD}".as_bytes());
            }
            if len > 0 {
                self.pending.extend_from_slice("\u{FFFD}".as_bytes());
            }
            return Ok(());
        }
        len += read;

        if len % 2 == 1 {
            self.carry_byte = Some(raw[len - 1]);
            len -= 1;
        }

        let mut units: Vec<u16> = self.carry_unit.take().into_iter().collect();
        units.extend(raw[..len].chunks_exact(2).map(|pair| {
            if self.big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        }));

        // A trailing high surrogate may be completed by the next read
        if let Some(&last) = units.last() {
            if (0xD800..=0xDBFF).contains(&last) {
                self.carry_unit = units.pop();
            }
        }

        let mut utf8 = [0u8; 4];
        for c in char::decode_utf16(units) {
            let c = c.unwrap_or(char::REPLACEMENT_CHARACTER);
            self.pending
                .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        }
        Ok(())
    }
}

impl<R: Read> Read for Utf16Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending_pos >= self.pending.len() {
            if self.eof {
                return Ok(0);
            }
            self.refill()?;
        }

        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(reader: &mut dyn Read) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    fn utf16le(text: &str, bom: bool) -> Vec<u8> {
        let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_detect() {
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, 0x3C]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0xFE, 0xFF, 0x00]), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(b"<\0r\0"), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(b"\0<\0r"), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(b"<"), XmlEncoding::Utf8);
    }

    #[test]
    fn test_utf8_passthrough_strips_bom() {
        let mut input = UTF8_BOM.to_vec();
        input.extend_from_slice(b"<r>ok</r>");
        let mut reader = utf8_reader(Cursor::new(input)).unwrap();
        assert_eq!(read_all(&mut reader), b"<r>ok</r>");

        let mut reader = utf8_reader(Cursor::new(b"<r/>".to_vec())).unwrap();
        assert_eq!(read_all(&mut reader), b"<r/>");
    }

    #[test]
    fn test_short_and_empty_input() {
        let mut reader = utf8_reader(Cursor::new(Vec::new())).unwrap();
        assert!(read_all(&mut reader).is_empty());

        let mut reader = utf8_reader(Cursor::new(b"x".to_vec())).unwrap();
        assert_eq!(read_all(&mut reader), b"x");
    }

    #[test]
    fn test_utf16_le_with_bom() {
        let text = "<r a=\"é\">😀</r>";
        let mut reader = utf8_reader(Cursor::new(utf16le(text, true))).unwrap();
        assert_eq!(read_all(&mut reader), text.as_bytes());
    }

    #[test]
    fn test_utf16_be_without_bom() {
        let text = "<r>ü</r>";
        let bytes: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let mut reader = utf8_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(read_all(&mut reader), text.as_bytes());
    }

    /// Reader handing out one byte per call, to split surrogate pairs
    struct ByteByByte(Vec<u8>, usize);

    impl Read for ByteByByte {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.1 >= self.0.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[self.1];
            self.1 += 1;
            Ok(1)
        }
    }

    #[test]
    fn test_utf16_split_reads() {
        let text = "a😀b";
        let mut reader = Utf16Reader::new(ByteByByte(utf16le(text, false), 0), false);
        assert_eq!(read_all(&mut reader), text.as_bytes());
    }

    #[test]
    fn test_utf16_dangling_byte() {
        let mut bytes = utf16le("ab", false);
        bytes.push(0x41);
        let mut reader = Utf16Reader::new(Cursor::new(bytes), false);
        assert_eq!(read_all(&mut reader), "ab\u{FFFD}".as_bytes());
    }

    #[test]
    fn test_utf16_dangling_surrogate_and_byte() {
        // "a", a lone high surrogate, then half of another unit
        let mut bytes = utf16le("a", false);
        bytes.extend_from_slice(&0xD83Du16.to_le_bytes());
        bytes.push(0x41);
        let mut reader = Utf16Reader::new(Cursor::new(bytes), false);
        assert_eq!(read_all(&mut reader), "a\u{FFFD}\u{FFFD}".as_bytes());
        assert!(reader.carry_unit.is_none());
    }
}
