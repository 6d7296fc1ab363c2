//! Candidate text encodings tried during format sniffing.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::DecoderResult;
use serde::Serialize;

/// A text encoding the sniffer may select for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextEncoding {
    /// Strict UTF-8; a leading BOM is stripped.
    Utf8,
    /// The WHATWG `latin1` label (windows-1252).
    Latin1,
    /// Exact ISO-8859-1: every byte maps to the code point of the same value.
    Iso8859_1,
}

/// Default trial order.
pub const DEFAULT_ENCODINGS: [TextEncoding; 3] =
    [TextEncoding::Utf8, TextEncoding::Latin1, TextEncoding::Iso8859_1];

impl TextEncoding {
    /// Conventional label for logs and error records.
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }

    /// Decode `bytes`, returning `None` on any malformed sequence.
    pub fn decode<'a>(self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Latin1 => {
                encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Iso8859_1 => {
                if bytes.is_ascii() {
                    // ASCII is a valid subset; borrow instead of copying.
                    std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
                } else {
                    Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
                }
            }
        }
    }

    /// Decode a line that was cut short at a read limit.
    ///
    /// Same as [`Self::decode`], except that an incomplete UTF-8 sequence at the very end is
    /// dropped instead of faulting.
    pub fn decode_truncated<'a>(self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                let mut decoder = encoding_rs::UTF_8.new_decoder_without_bom_handling();
                let capacity = decoder.max_utf8_buffer_length_without_replacement(bytes.len())?;
                let mut out = String::with_capacity(capacity);
                // `last = false`: a trailing partial sequence stays buffered in the decoder.
                match decoder.decode_to_string_without_replacement(bytes, &mut out, false) {
                    (DecoderResult::InputEmpty, _) => Some(Cow::Owned(out)),
                    _ => None,
                }
            }
            _ => self.decode(bytes),
        }
    }

    /// Decode a header line. Besides malformed sequences, a header that decodes to control
    /// characters (anything but TAB) counts as a decode fault.
    pub fn decode_header<'a>(self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        reject_control_chars(self.decode(bytes))
    }

    /// [`Self::decode_header`] for a header line cut short at the sniff limit.
    pub fn decode_truncated_header<'a>(self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        reject_control_chars(self.decode_truncated(bytes))
    }
}

fn reject_control_chars(text: Option<Cow<'_, str>>) -> Option<Cow<'_, str>> {
    text.filter(|text| !text.chars().any(|c| c.is_control() && c != '\t'))
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::TextEncoding;

    #[test]
    fn utf8_rejects_latin1_bytes_and_strips_bom() {
        assert!(TextEncoding::Utf8.decode(b"caf\xE9").is_none());
        assert_eq!(
            TextEncoding::Utf8.decode(b"\xEF\xBB\xBFid,name").as_deref(),
            Some("id,name")
        );
    }

    #[test]
    fn single_byte_encodings_decode_accented_text() {
        assert_eq!(TextEncoding::Latin1.decode(b"caf\xE9").as_deref(), Some("café"));
        assert_eq!(TextEncoding::Iso8859_1.decode(b"caf\xE9").as_deref(), Some("café"));
    }

    #[test]
    fn header_with_control_characters_is_a_decode_fault() {
        for enc in [TextEncoding::Utf8, TextEncoding::Latin1, TextEncoding::Iso8859_1] {
            assert!(enc.decode_header(b"\x00\x01\x02garbage").is_none(), "{enc}");
            assert!(enc.decode_header(b"a\tb").is_some(), "{enc}");
        }
        // 0x81 decodes to a C1 control under both single-byte encodings.
        assert!(TextEncoding::Latin1.decode_header(b"a\x81b").is_none());
        assert!(TextEncoding::Iso8859_1.decode_header(b"a\x81b").is_none());
    }

    #[test]
    fn truncated_utf8_drops_only_an_incomplete_trailing_sequence() {
        // "caf" + first byte of "é"
        assert_eq!(TextEncoding::Utf8.decode(b"caf\xC3"), None);
        assert_eq!(
            TextEncoding::Utf8.decode_truncated(b"caf\xC3").as_deref(),
            Some("caf")
        );
        assert_eq!(
            TextEncoding::Utf8.decode_truncated(b"\xEF\xBB\xBFcaf\xC3\xA9").as_deref(),
            Some("café")
        );
        // A malformed sequence before the end still faults.
        assert_eq!(TextEncoding::Utf8.decode_truncated(b"caf\xE9,x"), None);
        assert_eq!(
            TextEncoding::Latin1.decode_truncated(b"caf\xC3").as_deref(),
            Some("caf\u{C3}")
        );
    }
}
