//! Fetched message records.

use super::{Flags, SeqNum, Uid};
use std::collections::HashMap;

/// Envelope and flag metadata for a single message, independent of any
/// fetched body content (RFC 3501 §7.4.2 ENVELOPE + FLAGS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// The message's sequence number at fetch time.
    pub seq: SeqNum,
    /// The message's UID, if UID FETCH or a UID-returning FETCH item was used.
    pub uid: Option<Uid>,
    /// Subject header, raw (not MIME-decoded).
    pub subject: Option<String>,
    /// From header, raw (not MIME-decoded).
    pub from: Option<String>,
    /// To header, raw (not MIME-decoded).
    pub to: Option<String>,
    /// Date header, raw.
    pub date: Option<String>,
    /// Message-Id header.
    pub message_id: Option<String>,
    /// Current flags.
    pub flags: Flags,
    /// Raw top-level headers as fetched by `BODY[HEADER]` or similar, keyed
    /// by lower-cased header name.
    pub headers: HashMap<String, String>,
}

impl MessageInfo {
    /// Creates a bare `MessageInfo` with only a sequence number populated.
    #[must_use]
    pub fn new(seq: SeqNum) -> Self {
        Self {
            seq,
            uid: None,
            subject: None,
            from: None,
            to: None,
            date: None,
            message_id: None,
            flags: Flags::new(),
            headers: HashMap::new(),
        }
    }
}

/// One fetched MIME part's content, located by its IMAP section path.
#[derive(Debug, Clone)]
pub struct MessagePart {
    /// IMAP part number, e.g. "1", "1.2", "2.1.1".
    pub section: String,
    /// Content-Type, e.g. "text/plain", "image/png".
    pub content_type: String,
    /// Content-Disposition type, e.g. "attachment", "inline".
    pub disposition: Option<String>,
    /// Content-Transfer-Encoding, e.g. "base64", "quoted-printable".
    pub encoding: Option<String>,
    /// Suggested filename from Content-Disposition or Content-Type `name=`.
    pub filename: Option<String>,
    /// Content-Id, for inline parts referenced from HTML bodies.
    pub content_id: Option<String>,
    /// Raw, still-encoded bytes as received on the wire.
    pub data: Vec<u8>,
}

/// A fully fetched message: its envelope/flags plus whichever body parts
/// were requested.
#[derive(Debug, Clone)]
pub struct Message {
    /// Envelope metadata and flags.
    pub info: MessageInfo,
    /// Fetched body parts, in the order they were returned.
    pub parts: Vec<MessagePart>,
}

impl Message {
    /// Returns the part at the given IMAP section path, if fetched.
    #[must_use]
    pub fn part(&self, section: &str) -> Option<&MessagePart> {
        self.parts.iter().find(|p| p.section == section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_info_has_no_metadata() {
        let info = MessageInfo::new(SeqNum::new(1).unwrap());
        assert!(info.subject.is_none());
        assert!(info.flags.is_empty());
    }

    #[test]
    fn message_part_lookup_by_section() {
        let message = Message {
            info: MessageInfo::new(SeqNum::new(1).unwrap()),
            parts: vec![MessagePart {
                section: "1".to_string(),
                content_type: "text/plain".to_string(),
                disposition: None,
                encoding: Some("quoted-printable".to_string()),
                filename: None,
                content_id: None,
                data: b"hello".to_vec(),
            }],
        };
        assert!(message.part("1").is_some());
        assert!(message.part("2").is_none());
    }
}
