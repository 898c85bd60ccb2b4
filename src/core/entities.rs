//! XML Entity Decoding and Escaping
//!
//! Decoding handles the built-in entities (`&lt; &gt; &amp; &quot; &apos;`)
//! and numeric character references (`&#123; &#x7B;`). Unknown references
//! are left as written.
//!
//! Uses Cow for zero-copy when nothing needs to change.

use memchr::memchr;
use std::borrow::Cow;

use crate::options::AttributeEscaping;

/// Longest reference worth decoding, `&` and `;` included (`&#x0010FFFF;` fits)
const MAX_REFERENCE_LEN: usize = 32;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

/// Decode raw bytes into text: entity references resolved, invalid UTF-8 replaced
pub fn decode_str(input: &[u8]) -> Cow<'_, str> {
    match decode_text(input) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
        Cow::Owned(bytes) => Cow::Owned(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }),
    }
}

/// Decode all entity references in the input
pub fn decode_entities(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let Some(amp_pos) = memchr(b'&', &input[pos..]) else {
            result.extend_from_slice(&input[pos..]);
            break;
        };

        // Copy everything before the entity
        result.extend_from_slice(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        let lookahead = &input[pos..(pos + MAX_REFERENCE_LEN).min(input.len())];
        let decoded = memchr(b';', lookahead).and_then(|semi| {
            let entity = &input[pos + 1..pos + semi];
            decode_entity(entity).map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, len)) => {
                let mut utf8 = [0u8; 4];
                result.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                pos += len;
            }
            None => {
                // Unknown entity or stray ampersand, keep as-is
                result.push(b'&');
                pos += 1;
            }
        }
    }

    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<char> {
    match entity {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', numeric @ ..] => decode_numeric_entity(numeric),
        _ => None,
    }
}

/// Decode a numeric character reference
fn decode_numeric_entity(entity: &[u8]) -> Option<char> {
    let codepoint = match entity {
        [b'x' | b'X', hex @ ..] => u32::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?,
        dec => std::str::from_utf8(dec).ok()?.parse::<u32>().ok()?,
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Escape text content for output
///
/// HTML-style: `& < > " '` become `&amp; &lt; &gt; &quot; &#39;`.
pub fn escape_text(input: &str) -> Cow<'_, str> {
    // Fast path: check if any escaping needed
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&' | b'"' | b'\'')) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Escape an attribute value for a double-quoted attribute
pub fn escape_attribute(input: &str, escaping: AttributeEscaping) -> Cow<'_, str> {
    match escaping {
        AttributeEscaping::Percent => {
            if input.contains('"') {
                Cow::Owned(input.replace('"', "%22"))
            } else {
                Cow::Borrowed(input)
            }
        }
        AttributeEscaping::Xml => {
            if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&' | b'"' | b'\'')) {
                return Cow::Borrowed(input);
            }

            let mut result = String::with_capacity(input.len() + 16);
            for c in input.chars() {
                match c {
                    '<' => result.push_str("&lt;"),
                    '>' => result.push_str("&gt;"),
                    '&' => result.push_str("&amp;"),
                    '"' => result.push_str("&quot;"),
                    '\'' => result.push_str("&apos;"),
                    _ => result.push(c),
                }
            }
            Cow::Owned(result)
        }
    }
}
