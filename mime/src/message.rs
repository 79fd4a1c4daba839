//! MIME message structure and handling.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_body_lossy, decode_header, decode_quoted_printable, encode_base64};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;
use std::fmt::Write as _;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes).
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => {
                let body_str = String::from_utf8_lossy(&self.body);
                // Remove whitespace for lenient parsing
                let cleaned: String = body_str.chars().filter(|c| !c.is_whitespace()).collect();
                decode_base64(&cleaned)
            }
            TransferEncoding::QuotedPrintable => {
                let body_str = String::from_utf8_lossy(&self.body);
                let decoded = decode_quoted_printable(&body_str)?;
                Ok(decoded.into_bytes())
            }
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }

    /// Decodes the body according to its declared transfer encoding and
    /// charset, falling back to the original bytes unchanged if decoding
    /// fails rather than returning an error.
    #[must_use]
    pub fn decode_body_lossy(&self) -> Vec<u8> {
        let encoding = self.transfer_encoding().to_string();
        let charset = self.content_type().ok().and_then(|ct| ct.charset().map(String::from));
        decode_body_lossy(&self.body, &encoding, charset.as_deref())
    }
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Body for single-part messages.
    pub body: Option<Vec<u8>>,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub const fn new(headers: Headers) -> Self {
        Self {
            headers,
            parts: Vec::new(),
            body: None,
        }
    }

    /// Creates a single-part message.
    #[must_use]
    pub const fn single_part(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            parts: Vec::new(),
            body: Some(body),
        }
    }

    /// Creates a multipart message.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Part>) -> Self {
        Self {
            headers,
            parts,
            body: None,
        }
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Checks if this is a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if content type cannot be determined.
    pub fn is_multipart(&self) -> Result<bool> {
        Ok(self.content_type()?.is_multipart())
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Gets the Subject header, MIME-decoded per RFC 2047.
    #[must_use]
    pub fn decoded_subject(&self) -> Option<String> {
        self.headers.get("subject").map(decode_header)
    }

    /// Gets the From header, MIME-decoded per RFC 2047.
    #[must_use]
    pub fn decoded_from(&self) -> Option<String> {
        self.headers.get("from").map(decode_header)
    }

    /// Gets the To header, MIME-decoded per RFC 2047.
    #[must_use]
    pub fn decoded_to(&self) -> Option<String> {
        self.headers.get("to").map(decode_header)
    }

    /// Gets the body as text for single-part messages.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a multipart message or decoding fails.
    pub fn body_text(&self) -> Result<String> {
        if !self.parts.is_empty() {
            return Err(Error::InvalidMultipart(
                "Use parts for multipart messages".to_string(),
            ));
        }

        let body = self
            .body
            .as_ref()
            .ok_or_else(|| Error::Parse("No body".to_string()))?;

        // Decode based on transfer encoding
        let transfer_encoding = self
            .headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

        let decoded = match transfer_encoding {
            TransferEncoding::Base64 => {
                let body_str = String::from_utf8_lossy(body);
                let cleaned: String = body_str.chars().filter(|c| !c.is_whitespace()).collect();
                decode_base64(&cleaned)?
            }
            TransferEncoding::QuotedPrintable => {
                let body_str = String::from_utf8_lossy(body);
                let decoded = decode_quoted_printable(&body_str)?;
                decoded.into_bytes()
            }
            _ => body.clone(),
        };

        String::from_utf8(decoded).map_err(Into::into)
    }

    /// Finds the first text/plain part in a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if no text part is found or decoding fails.
    pub fn text_part(&self) -> Result<String> {
        for part in &self.parts {
            let ct = part.content_type()?;
            if ct.main_type == "text" && ct.sub_type == "plain" {
                return part.body_text();
            }
        }

        Err(Error::Parse("No text/plain part found".to_string()))
    }

    /// Finds the first text/html part in a multipart message.
    ///
    /// # Errors
    ///
    /// Returns an error if no HTML part is found or decoding fails.
    pub fn html_part(&self) -> Result<String> {
        for part in &self.parts {
            let ct = part.content_type()?;
            if ct.main_type == "text" && ct.sub_type == "html" {
                return part.body_text();
            }
        }

        Err(Error::Parse("No text/html part found".to_string()))
    }
}

/// An attachment to include in an outbound message built with
/// [`MessageBuilder`].
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Attachment filename, used in the Content-Disposition header.
    pub filename: String,
    /// Content type (e.g. `application/pdf`).
    pub content_type: String,
    /// Raw attachment bytes (base64-encoded when serialized).
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates a new attachment.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// Builds an outbound MIME message for SMTP submission.
///
/// Produces a single `text/plain` part when no HTML body or attachments are
/// given, `multipart/alternative` when both text and HTML bodies are
/// present, and wraps everything in `multipart/mixed` when attachments are
/// present (with the alternative part, if any, nested inside).
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
    extra_headers: Vec<(String, String)>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From address.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Adds a To address.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Sets the Subject, encoding it per RFC 2047 if it contains non-ASCII.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Adds an arbitrary header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Renders the message to bytes suitable for SMTP DATA submission
    /// (headers + body, CRLF line endings, no leading/trailing dot-stuffing
    /// — that is applied by the SMTP client at the transport layer).
    ///
    /// # Errors
    ///
    /// Returns an error if encoding a header value fails.
    pub fn build(&self, boundary_seed: &str) -> Result<Vec<u8>> {
        let mut headers = Headers::new();
        if let Some(from) = &self.from {
            headers.set("From", from.clone());
        }
        if !self.to.is_empty() {
            headers.set("To", self.to.join(", "));
        }
        if let Some(subject) = &self.subject {
            headers.set("Subject", Headers::encode_value(subject)?);
        }
        for (name, value) in &self.extra_headers {
            headers.set(name.clone(), value.clone());
        }
        headers.set("MIME-Version", "1.0");

        let body = if self.attachments.is_empty() {
            self.render_text_alternative(boundary_seed)?
        } else {
            self.render_mixed(&mut headers, boundary_seed)?
        };

        if !self.attachments.is_empty() {
            // render_mixed already set Content-Type on `headers`.
        } else if self.html.is_some() {
            let boundary = alternative_boundary(boundary_seed);
            headers.set(
                "Content-Type",
                ContentType::multipart_alternative(boundary).to_string(),
            );
        } else {
            headers.set("Content-Type", ContentType::text_plain().to_string());
        }

        let mut out = headers.to_string().into_bytes();
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn render_text_alternative(&self, boundary_seed: &str) -> Result<Vec<u8>> {
        match (&self.text, &self.html) {
            (Some(text), None) | (None, Some(text)) => Ok(text.replace('\n', "\r\n").into_bytes()),
            (Some(text), Some(html)) => {
                let boundary = alternative_boundary(boundary_seed);
                Ok(render_alternative_body(&boundary, text, html))
            }
            (None, None) => Ok(Vec::new()),
        }
    }

    fn render_mixed(&self, headers: &mut Headers, boundary_seed: &str) -> Result<Vec<u8>> {
        let mixed_boundary = format!("mixed-{boundary_seed}");
        headers.set(
            "Content-Type",
            ContentType::multipart_mixed(&mixed_boundary).to_string(),
        );

        let mut out = Vec::new();
        let text_body = self.render_text_alternative(boundary_seed)?;
        let inner_content_type = if self.html.is_some() {
            ContentType::multipart_alternative(alternative_boundary(boundary_seed)).to_string()
        } else {
            ContentType::text_plain().to_string()
        };

        write_mime_part(&mut out, &mixed_boundary, &inner_content_type, None, &text_body);

        for attachment in &self.attachments {
            let encoded = encode_base64(&attachment.data);
            let mut part_headers = format!(
                "Content-Type: {}; name=\"{}\"\r\n",
                attachment.content_type, attachment.filename
            );
            part_headers.push_str("Content-Transfer-Encoding: base64\r\n");
            let _ = write!(
                part_headers,
                "Content-Disposition: attachment; filename=\"{}\"\r\n",
                attachment.filename
            );
            out.extend_from_slice(format!("--{mixed_boundary}\r\n").as_bytes());
            out.extend_from_slice(part_headers.as_bytes());
            out.extend_from_slice(b"\r\n");
            for line in encoded.as_bytes().chunks(76) {
                out.extend_from_slice(line);
                out.extend_from_slice(b"\r\n");
            }
        }

        out.extend_from_slice(format!("--{mixed_boundary}--\r\n").as_bytes());
        Ok(out)
    }
}

fn alternative_boundary(seed: &str) -> String {
    format!("alt-{seed}")
}

fn render_alternative_body(boundary: &str, text: &str, html: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_mime_part(
        &mut out,
        boundary,
        &ContentType::text_plain().to_string(),
        None,
        text.replace('\n', "\r\n").as_bytes(),
    );
    write_mime_part(
        &mut out,
        boundary,
        &ContentType::text_html().to_string(),
        None,
        html.replace('\n', "\r\n").as_bytes(),
    );
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

fn write_mime_part(
    out: &mut Vec<u8>,
    boundary: &str,
    content_type: &str,
    transfer_encoding: Option<&str>,
    body: &[u8],
) {
    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    if let Some(cte) = transfer_encoding {
        out.extend_from_slice(format!("Content-Transfer-Encoding: {cte}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_part_new() {
        let headers = Headers::new();
        let body = b"Hello, World!".to_vec();
        let part = Part::new(headers, body);
        assert_eq!(part.body, b"Hello, World!");
    }

    #[test]
    fn test_part_body_text() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain; charset=utf-8");
        let body = b"Hello, World!".to_vec();
        let part = Part::new(headers, body);

        let text = part.body_text().unwrap();
        assert_eq!(text, "Hello, World!");
    }

    #[test]
    fn test_message_single_part() {
        let mut headers = Headers::new();
        headers.add("from", "sender@example.com");
        headers.add("to", "recipient@example.com");
        headers.add("subject", "Test");

        let body = b"Hello, World!".to_vec();
        let message = Message::single_part(headers, body);

        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.to(), Some("recipient@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert_eq!(message.body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_message_multipart() {
        let mut headers = Headers::new();
        headers.add("content-type", "multipart/mixed; boundary=abc123");

        let mut part1_headers = Headers::new();
        part1_headers.add("content-type", "text/plain");
        let part1 = Part::new(part1_headers, b"Part 1".to_vec());

        let mut part2_headers = Headers::new();
        part2_headers.add("content-type", "text/plain");
        let part2 = Part::new(part2_headers, b"Part 2".to_vec());

        let message = Message::multipart(headers, vec![part1, part2]);

        assert!(message.is_multipart().unwrap());
        assert_eq!(message.parts.len(), 2);
    }

    #[test]
    fn test_builder_text_only() {
        let bytes = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject("hi")
            .text("hello there")
            .build("seed1")
            .unwrap();
        let rendered = String::from_utf8(bytes).unwrap();
        assert!(rendered.contains("Content-Type: text/plain"));
        assert!(rendered.contains("hello there"));
        assert!(!rendered.contains("multipart"));
    }

    #[test]
    fn test_builder_text_and_html_is_alternative() {
        let bytes = MessageBuilder::new()
            .text("plain")
            .html("<b>html</b>")
            .build("seed2")
            .unwrap();
        let rendered = String::from_utf8(bytes).unwrap();
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("plain"));
        assert!(rendered.contains("<b>html</b>"));
    }

    #[test]
    fn test_builder_with_attachment_is_mixed() {
        let bytes = MessageBuilder::new()
            .text("see attached")
            .attachment(Attachment::new("a.txt", "text/plain", b"attachment body".to_vec()))
            .build("seed3")
            .unwrap();
        let rendered = String::from_utf8(bytes).unwrap();
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("filename=\"a.txt\""));
        assert!(rendered.contains("Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn test_decoded_subject_mime_decodes() {
        let mut headers = Headers::new();
        headers.add("subject", "=?utf-8?Q?Gesch=C3=A4ftsbericht?=");
        let message = Message::new(headers);
        assert_eq!(message.decoded_subject().as_deref(), Some("Geschäftsbericht"));
    }
}
