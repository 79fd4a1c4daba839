//! Glue between wire-level fetched parts and the content-level MIME decoder.
//!
//! [`crate::types::MessagePart`] holds a part exactly as FETCH returned it:
//! still-encoded bytes plus the Content-Type/Content-Transfer-Encoding
//! strings reported in BODYSTRUCTURE. Turning that into text a caller can
//! read means applying the transfer decoding (base64/quoted-printable) and
//! then the charset decoding, which is `mailwire-mime`'s job.

use crate::types::MessagePart;

/// Extracts the `charset` parameter from a `Content-Type` header value, if
/// present (e.g. `text/plain; charset=iso-8859-1` -> `Some("iso-8859-1")`).
fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Decodes a fetched part's raw bytes into its text content, undoing
/// transfer encoding and charset.
///
/// Lossy: invalid byte sequences are replaced rather than rejected, since a
/// caller reading a message body wants best-effort text, not a parse error
/// over one malformed octet.
#[must_use]
pub fn decode_part_text(part: &MessagePart) -> String {
    let encoding = part.encoding.as_deref().unwrap_or("7BIT");
    let charset = extract_charset(&part.content_type);
    let decoded = mailwire_mime::encoding::decode_body_lossy(&part.data, encoding, charset.as_deref());
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Decodes a fetched part's raw bytes into its binary content (transfer
/// decoding only; no charset transcoding), for non-text attachments.
#[must_use]
pub fn decode_part_bytes(part: &MessagePart) -> Vec<u8> {
    let encoding = part.encoding.as_deref().unwrap_or("7BIT");
    mailwire_mime::encoding::decode_body_lossy(&part.data, encoding, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(content_type: &str, encoding: &str, data: &[u8]) -> MessagePart {
        MessagePart {
            section: "1".to_string(),
            content_type: content_type.to_string(),
            disposition: None,
            encoding: Some(encoding.to_string()),
            filename: None,
            content_id: None,
            data: data.to_vec(),
        }
    }

    #[test]
    fn extracts_charset_param() {
        assert_eq!(
            extract_charset("text/plain; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(extract_charset("text/plain"), None);
    }

    #[test]
    fn decodes_base64_text_part() {
        let p = part("text/plain; charset=utf-8", "BASE64", b"aGVsbG8=");
        assert_eq!(decode_part_text(&p), "hello");
    }

    #[test]
    fn decodes_plain_bytes_for_binary_part() {
        let p = part("application/octet-stream", "7BIT", b"raw-bytes");
        assert_eq!(decode_part_bytes(&p), b"raw-bytes");
    }
}
