//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding, charset
//! transcoding, and RFC 5322 date parsing.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset};
use std::fmt::Write as _;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Maximum line length for Quoted-Printable encoding.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Encodes bytes that are not printable ASCII or would interfere
/// with email transmission.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::new();
    let mut line_length = 0;

    for byte in text.as_bytes() {
        // Check if we need soft line break
        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        match byte {
            // Printable ASCII except '=' and space (handle separately)
            b'!'..=b'<' | b'>'..=b'~' => {
                result.push(*byte as char);
                line_length += 1;
            }
            // Space needs special handling (encode at line end)
            b' ' => {
                if line_length >= MAX_LINE_LENGTH - 1 {
                    result.push_str("=20");
                    line_length += 3;
                } else {
                    result.push(' ');
                    line_length += 1;
                }
            }
            // Everything else gets encoded
            _ => {
                result.push('=');
                let _ = write!(result, "{byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break
            if chars.peek() == Some(&'\r') {
                chars.next(); // consume \r
                if chars.peek() == Some(&'\n') {
                    chars.next(); // consume \n
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next(); // consume \n
                continue;
            }

            // Hex encoded byte
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else {
            result.push(ch as u8);
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Arguments
///
/// * `text` - Text to encode
/// * `charset` - Character set (e.g., "utf-8")
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_rfc2047(text: &str, charset: &str) -> Result<String> {
    // Only encode if necessary (contains non-ASCII)
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return Ok(text.to_string());
    }

    // Use Base64 encoding (Q encoding is more complex)
    let encoded = encode_base64(text.as_bytes());
    Ok(format!("=?{charset}?B?{encoded}?="))
}

/// Decodes RFC 2047 encoded header value.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Errors
///
/// Returns an error if the input is not valid RFC 2047 format.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    // Check for RFC 2047 format
    if !text.starts_with("=?") || !text.ends_with("?=") {
        return Ok(text.to_string());
    }

    let inner = &text[2..text.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            // Base64
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            // Quoted-Printable (with underscore for space)
            let text_with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(&text_with_spaces)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
    }
}

/// Transcodes bytes in the given charset to a UTF-8 `String`.
///
/// Only a handful of charsets commonly seen in mail headers are supported;
/// anything else is rejected rather than silently mangled.
///
/// # Errors
///
/// Returns an error if the charset is unrecognized, or if the bytes are not
/// valid in the claimed charset (for UTF-8 and US-ASCII).
pub fn transcode_to_utf8(bytes: &[u8], charset: &str) -> Result<String> {
    match charset.trim().to_lowercase().as_str() {
        "utf-8" | "utf8" | "" => {
            String::from_utf8(bytes.to_vec()).map_err(Into::into)
        }
        "us-ascii" | "ascii" => {
            if bytes.iter().any(|b| *b > 0x7F) {
                return Err(Error::InvalidEncoding(
                    "non-ASCII byte in US-ASCII text".to_string(),
                ));
            }
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        // ISO-8859-1 and Windows-1252 both map byte N to code point N for the
        // printable ranges this library cares about; this is an approximation
        // for the 0x80-0x9F Windows-1252 control range but is adequate for
        // decoding mail headers/bodies that declare either charset.
        "iso-8859-1" | "latin1" | "windows-1252" | "cp1252" => {
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        other => Err(Error::UnsupportedCharset(other.to_string())),
    }
}

/// Decodes a mail header value, concatenating adjacent RFC 2047 encoded-words
/// (suppressing the folding whitespace between them per RFC 2047 §6.2) and
/// transcoding each to UTF-8.
///
/// Falls back to the original text unchanged if any encoded word fails to
/// decode, rather than propagating an error up through message parsing.
#[must_use]
pub fn decode_header(text: &str) -> String {
    let words = split_encoded_words(text);
    let mut out = String::new();
    let mut prev_was_encoded = false;

    for word in words {
        match word {
            HeaderWord::Encoded {
                charset,
                encoding,
                payload,
            } => {
                match decode_encoded_word(&charset, encoding, payload) {
                    Ok(decoded) => out.push_str(&decoded),
                    Err(_) => out.push_str(payload),
                }
                prev_was_encoded = true;
            }
            HeaderWord::Plain(text) => {
                if prev_was_encoded && text.trim().is_empty() {
                    // Whitespace between two encoded words is folding
                    // whitespace and is suppressed.
                } else {
                    out.push_str(text);
                }
                prev_was_encoded = false;
            }
        }
    }

    out
}

enum HeaderWord<'a> {
    Encoded {
        charset: &'a str,
        encoding: char,
        payload: &'a str,
    },
    Plain(&'a str),
}

fn decode_encoded_word(charset: &str, encoding: char, payload: &str) -> Result<String> {
    let bytes = match encoding.to_ascii_uppercase() {
        'B' => decode_base64(payload)?,
        'Q' => {
            let with_spaces = payload.replace('_', " ");
            decode_quoted_printable_bytes(&with_spaces)?
        }
        _ => return Err(Error::InvalidEncoding(format!("unknown encoding: {encoding}"))),
    };
    transcode_to_utf8(&bytes, charset)
}

/// Splits a header value into a sequence of encoded-word and plain-text runs.
fn split_encoded_words(text: &str) -> Vec<HeaderWord<'_>> {
    let mut words = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("=?") {
        if start > 0 {
            words.push(HeaderWord::Plain(&rest[..start]));
        }
        let tail = &rest[start..];
        if let Some((word, consumed)) = parse_one_encoded_word(tail) {
            words.push(word);
            rest = &tail[consumed..];
        } else {
            // Not a well-formed encoded word; treat the `=?` literally.
            words.push(HeaderWord::Plain(&tail[..2]));
            rest = &tail[2..];
        }
    }
    if !rest.is_empty() {
        words.push(HeaderWord::Plain(rest));
    }
    words
}

fn parse_one_encoded_word(s: &str) -> Option<(HeaderWord<'_>, usize)> {
    debug_assert!(s.starts_with("=?"));
    let end = s.find("?=")?;
    let inner = &s[2..end];
    let mut parts = inner.splitn(3, '?');
    let charset = parts.next()?;
    let encoding = parts.next()?.chars().next()?;
    let payload = parts.next()?;
    Some((
        HeaderWord::Encoded {
            charset,
            encoding,
            payload,
        },
        end + 2,
    ))
}

/// Quoted-printable decode yielding raw bytes rather than a UTF-8 `String`.
///
/// Used internally so callers can transcode the result with an arbitrary
/// declared charset rather than assuming UTF-8.
///
/// # Errors
///
/// Returns an error if the input contains an incomplete escape sequence.
pub fn decode_quoted_printable_bytes(text: &str) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            if chars.peek() == Some(&'\r') {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                continue;
            } else if chars.peek() == Some(&'\n') {
                chars.next();
                continue;
            }

            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "incomplete escape sequence".to_string(),
                ));
            }
        } else {
            let mut buf = [0u8; 4];
            result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    Ok(result)
}

/// Decodes bytes with a declared transfer encoding and charset, falling back
/// to the original bytes unchanged if decoding fails at any step.
///
/// This implements the soft-failure body decoding policy: a body that claims
/// `quoted-printable` or `base64` but doesn't actually parse as such is
/// returned verbatim rather than causing the whole fetch to fail.
#[must_use]
pub fn decode_body_lossy(data: &[u8], transfer_encoding: &str, charset: Option<&str>) -> Vec<u8> {
    match transfer_encoding.trim().to_lowercase().as_str() {
        "base64" => {
            let text = String::from_utf8_lossy(data);
            let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            decode_base64(&cleaned).unwrap_or_else(|_| data.to_vec())
        }
        "quoted-printable" => {
            let text = String::from_utf8_lossy(data);
            match decode_quoted_printable_bytes(&text) {
                Ok(raw) => {
                    let charset = charset.unwrap_or("utf-8");
                    transcode_to_utf8(&raw, charset)
                        .map(String::into_bytes)
                        .unwrap_or(raw)
                }
                Err(_) => data.to_vec(),
            }
        }
        "7bit" | "8bit" | "binary" | "" => {
            if looks_quoted_printable(data) {
                let text = String::from_utf8_lossy(data);
                if let Ok(raw) = decode_quoted_printable_bytes(&text) {
                    return raw;
                }
            }
            data.to_vec()
        }
        _ => data.to_vec(),
    }
}

/// Heuristic: does this look like quoted-printable text even without a
/// declared transfer encoding (soft-break or `=XX` escapes present)?
fn looks_quoted_printable(data: &[u8]) -> bool {
    let text = String::from_utf8_lossy(data);
    text.contains("=\r\n") || text.contains("=\n") || text.contains("=3D") || {
        // crude scan for =HH sequences
        let bytes = text.as_bytes();
        bytes.windows(3).any(|w| {
            w[0] == b'='
                && w[1].is_ascii_hexdigit()
                && w[2].is_ascii_hexdigit()
        })
    }
}

/// Parses an RFC 5322 date header, tolerating the common format variants
/// seen in the wild (missing weekday, two-digit year, parenthesized
/// timezone comment at the end).
///
/// Returns `None` rather than erroring on an unparseable date; callers
/// should treat that as a soft failure (emit a warning, leave the field
/// empty) rather than aborting the surrounding operation.
#[must_use]
pub fn parse_rfc5322_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = strip_parenthesized_comment(raw.trim());

    const FORMATS: &[&str] = &[
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%a, %d %b %y %H:%M:%S %z",
        "%d %b %y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M %z",
    ];

    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt);
        }
    }
    None
}

fn strip_parenthesized_comment(s: &str) -> String {
    if let Some(open) = s.rfind('(') {
        if s.ends_with(')') {
            return s[..open].trim().to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        let text = "Hello, World!";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "Hello, World!");

        let text = "Héllo, Wørld!";
        let encoded = encode_quoted_printable(text);
        assert!(encoded.contains("=C3"));
    }

    #[test]
    fn test_quoted_printable_decode() {
        let encoded = "Hello, World!";
        let decoded = decode_quoted_printable(encoded).unwrap();
        assert_eq!(decoded, "Hello, World!");

        let encoded = "H=C3=A9llo";
        let decoded = decode_quoted_printable(encoded).unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let encoded = "Hello=\r\nWorld";
        let decoded = decode_quoted_printable(encoded).unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_rfc2047_encode() {
        let text = "Hello";
        let encoded = encode_rfc2047(text, "utf-8").unwrap();
        assert_eq!(encoded, "Hello"); // No encoding needed

        let text = "Héllo";
        let encoded = encode_rfc2047(text, "utf-8").unwrap();
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_rfc2047_decode() {
        let encoded = "Hello";
        let decoded = decode_rfc2047(encoded).unwrap();
        assert_eq!(decoded, "Hello");

        let encoded = "=?utf-8?B?SMOpbGxv?=";
        let decoded = decode_rfc2047(encoded).unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        let encoded = "=?utf-8?Q?H=C3=A9llo?=";
        let decoded = decode_rfc2047(encoded).unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_decode_header_plain_ascii_is_identity() {
        assert_eq!(decode_header("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_decode_header_single_encoded_word() {
        let decoded = decode_header("=?utf-8?Q?Gesch=C3=A4ftsbericht?=");
        assert_eq!(decoded, "Geschäftsbericht");
    }

    #[test]
    fn test_decode_header_adjacent_encoded_words_suppress_folding_space() {
        let decoded = decode_header("=?utf-8?Q?Hello,_?= =?utf-8?Q?World!?=");
        assert_eq!(decoded, "Hello, World!");
    }

    #[test]
    fn test_decode_header_mixed_plain_and_encoded() {
        let decoded = decode_header("Re: =?utf-8?B?SMOpbGxv?= there");
        assert_eq!(decoded, "Re: Héllo there");
    }

    #[test]
    fn test_decode_header_malformed_falls_back_unchanged() {
        let decoded = decode_header("=?broken");
        assert_eq!(decoded, "=?broken");
    }

    #[test]
    fn test_transcode_ascii() {
        assert_eq!(transcode_to_utf8(b"hello", "us-ascii").unwrap(), "hello");
        assert!(transcode_to_utf8(&[0xFF], "us-ascii").is_err());
    }

    #[test]
    fn test_transcode_unsupported_charset_errors() {
        assert!(transcode_to_utf8(b"x", "shift_jis").is_err());
    }

    #[test]
    fn test_decode_body_lossy_base64_roundtrip() {
        let encoded = encode_base64(b"binary body");
        let decoded = decode_body_lossy(encoded.as_bytes(), "base64", None);
        assert_eq!(decoded, b"binary body");
    }

    #[test]
    fn test_decode_body_lossy_invalid_base64_falls_back() {
        let decoded = decode_body_lossy(b"not base64 at all!!", "base64", None);
        assert_eq!(decoded, b"not base64 at all!!");
    }

    #[test]
    fn test_decode_body_lossy_quoted_printable_heuristic() {
        let decoded = decode_body_lossy(b"H=3D1 is in range=\r\nmore", "7bit", None);
        assert_eq!(decoded, b"H=1 is in rangemore");
    }

    #[test]
    fn test_parse_rfc5322_date_with_weekday() {
        let dt = parse_rfc5322_date("Thu, 13 Feb 2020 15:34:01 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2020-02-13");
    }

    #[test]
    fn test_parse_rfc5322_date_strips_tz_comment() {
        let dt = parse_rfc5322_date("Thu, 13 Feb 2020 15:34:01 +0000 (UTC)").unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "15:34:01");
    }

    #[test]
    fn test_parse_rfc5322_date_invalid_returns_none() {
        assert!(parse_rfc5322_date("not a date").is_none());
    }
}
