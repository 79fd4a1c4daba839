//! Core IMAP types.
//!
//! This module defines the fundamental types used throughout the IMAP library,
//! following RFC 9051 (`IMAP4rev2`) and RFC 3501 (`IMAP4rev1`).

#![allow(clippy::missing_const_for_fn)]

mod body_structure;
mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod message;
mod message_id;
mod quota;
mod response_code;

pub use body_structure::{BodyExtension, BodyFields, BodyKind, BodyStructure};
pub use capability::{Capability, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute, MailboxStatus};
pub use message::{Message, MessageInfo, MessagePart};
pub use message_id::{MessageIdentifier, MessageIdentifierSet};
pub use quota::{Quota, QuotaResource};
pub use response_code::ResponseCode;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_num_new() {
        assert!(SeqNum::new(0).is_none());
        assert!(SeqNum::new(1).is_some());
        assert_eq!(SeqNum::new(42).unwrap().get(), 42);
    }

    #[test]
    fn test_uid_new() {
        assert!(Uid::new(0).is_none());
        assert!(Uid::new(1).is_some());
        assert_eq!(Uid::new(123).unwrap().get(), 123);
    }

    #[test]
    fn test_capability_parse() {
        assert_eq!(Capability::parse("IMAP4rev1"), Capability::Imap4Rev1);
        assert_eq!(Capability::parse("IMAP4REV2"), Capability::Imap4Rev2);
        assert_eq!(Capability::parse("idle"), Capability::Idle);
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("UNKNOWN"),
            Capability::Unknown("UNKNOWN".to_string())
        );
    }

    #[test]
    fn test_flag_parse() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\FLAGGED"), Flag::Flagged);
        assert_eq!(Flag::parse("custom"), Flag::Keyword("custom".to_string()));
    }

    #[test]
    fn test_flags_collection() {
        let mut flags = Flags::new();
        assert!(flags.is_empty());

        flags.insert(Flag::Seen);
        assert!(flags.is_seen());
        assert!(!flags.is_flagged());

        flags.insert(Flag::Flagged);
        assert!(flags.is_flagged());
        assert_eq!(flags.len(), 2);

        flags.remove(&Flag::Seen);
        assert!(!flags.is_seen());
    }

    #[test]
    fn test_message_identifier_set_display() {
        let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
        set.insert(SeqNum::new(1).unwrap());
        assert_eq!(set.to_string(), "1");
        set.insert_range(SeqNum::new(2).unwrap(), SeqNum::new(10).unwrap());
        assert_eq!(set.to_string(), "1:10");
    }

    #[test]
    fn test_mailbox_attribute_parse() {
        assert_eq!(
            MailboxAttribute::parse("\\NoSelect"),
            MailboxAttribute::NoSelect
        );
        assert_eq!(
            MailboxAttribute::parse("\\HasChildren"),
            MailboxAttribute::HasChildren
        );
        assert_eq!(MailboxAttribute::parse("\\Trash"), MailboxAttribute::Trash);
    }
}
