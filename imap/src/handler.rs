//! Per-command response handlers.
//!
//! Each IMAP command has a handler that folds the untagged responses
//! gathered while the command was in flight into a typed result once the
//! tagged completion arrives. Handlers operate on the already-parsed
//! [`UntaggedResponse`] sequence produced by [`crate::parser::ResponseParser`]
//! rather than on raw bytes.
//!
//! A connection never has more than one command in flight, so the
//! fold-the-whole-batch style used here is equivalent to feeding events to a
//! handler one at a time as they arrive.

use crate::parser::{Address, Envelope, FetchItem, UntaggedResponse};
use crate::types::{
    Capability, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, MessageInfo, Quota,
    ResponseCode, SeqNum, Status,
};
use crate::{Error, Result};

/// Which error variant a failed tagged response should be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// LOGIN / AUTHENTICATE.
    Login,
    /// SELECT / EXAMINE.
    Select,
    /// FETCH / UID FETCH.
    Fetch,
    /// STORE / UID STORE.
    Store,
    /// COPY / UID COPY.
    Copy,
    /// EXPUNGE / UID EXPUNGE.
    Expunge,
    /// Any other command.
    Generic,
}

fn command_error(kind: CommandKind, text: String) -> Error {
    match kind {
        CommandKind::Login => Error::LoginFailed(text),
        CommandKind::Select => Error::SelectFailed(text),
        CommandKind::Fetch => Error::FetchFailed(text),
        CommandKind::Store => Error::StoreFailed(text),
        CommandKind::Copy => Error::CopyFailed(text),
        CommandKind::Expunge => Error::ExpungeFailed(text),
        CommandKind::Generic => Error::CommandFailed(text),
    }
}

/// Evaluates a tagged status, mapping NO/BAD/BYE to a command-specific error.
pub(crate) fn evaluate_tagged(status: Status, text: String, kind: CommandKind) -> Result<()> {
    match status {
        Status::Ok => Ok(()),
        Status::No | Status::Bad => Err(command_error(kind, text)),
        Status::Bye => Err(Error::ConnectionLost(text)),
        Status::PreAuth => Err(Error::Protocol(format!("unexpected PREAUTH: {text}"))),
    }
}

/// Reduces a CAPABILITY response batch into the latest capability list.
#[must_use]
pub fn reduce_capability(untagged: &[UntaggedResponse]) -> Vec<Capability> {
    untagged
        .iter()
        .rev()
        .find_map(|r| match r {
            UntaggedResponse::Capability(caps) => Some(caps.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Extracts capabilities advertised via an OK response code (e.g. after
/// LOGIN or in the greeting), if present.
#[must_use]
pub fn capability_from_ok_code(untagged: &[UntaggedResponse]) -> Option<Vec<Capability>> {
    untagged.iter().find_map(|r| match r {
        UntaggedResponse::Ok {
            code: Some(ResponseCode::Capability(caps)),
            ..
        } => Some(caps.clone()),
        _ => None,
    })
}

/// Reduces a SELECT/EXAMINE response batch into a `MailboxStatus`.
#[must_use]
pub fn reduce_select(untagged: &[UntaggedResponse], read_only: bool) -> MailboxStatus {
    let mut status = MailboxStatus {
        read_only,
        ..MailboxStatus::default()
    };

    for r in untagged {
        match r {
            UntaggedResponse::Exists(n) => status.exists = *n,
            UntaggedResponse::Recent(n) => status.recent = *n,
            UntaggedResponse::Flags(flags) => status.available_flags = flags.clone(),
            UntaggedResponse::Ok { code, .. } => match code {
                Some(ResponseCode::UidValidity(v)) => status.uid_validity = Some(*v),
                Some(ResponseCode::UidNext(v)) => status.uid_next = Some(*v),
                Some(ResponseCode::Unseen(n)) => status.first_unseen = Some(*n),
                Some(ResponseCode::PermanentFlags(flags)) => {
                    status.permanent_flags = Flags::from_vec(flags.clone());
                }
                Some(ResponseCode::ReadOnly) => status.read_only = true,
                Some(ResponseCode::ReadWrite) => status.read_only = false,
                Some(ResponseCode::HighestModSeq(v)) => status.highest_mod_seq = Some(*v),
                _ => {}
            },
            _ => {}
        }
    }

    if status.unseen_count.is_none() {
        if let Some(first_unseen) = status.first_unseen {
            let first_unseen = first_unseen.get();
            if first_unseen > 0 {
                status.unseen_count = Some(status.exists.saturating_sub(first_unseen) + 1);
            }
        }
    }

    status
}

/// Reduces a LIST response batch into mailbox entries.
#[must_use]
pub fn reduce_list(untagged: &[UntaggedResponse]) -> Vec<ListResponse> {
    untagged
        .iter()
        .filter_map(|r| match r {
            UntaggedResponse::List(list) => Some(list.clone()),
            _ => None,
        })
        .collect()
}

/// Reduces a SEARCH response batch into the returned sequence/UID numbers.
#[must_use]
pub fn reduce_search(untagged: &[UntaggedResponse]) -> Vec<u32> {
    untagged
        .iter()
        .filter_map(|r| match r {
            UntaggedResponse::Search(nums) => Some(nums.iter().map(|s| s.get())),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Reduces an EXPUNGE response batch into the sequence numbers removed.
#[must_use]
pub fn reduce_expunge(untagged: &[UntaggedResponse]) -> Vec<SeqNum> {
    untagged
        .iter()
        .filter_map(|r| match r {
            UntaggedResponse::Expunge(seq) => Some(*seq),
            _ => None,
        })
        .collect()
}

/// Reduces a GETQUOTA/GETQUOTAROOT response batch into the quota roots
/// returned, in the order the server reported them.
#[must_use]
pub fn reduce_quota(untagged: &[UntaggedResponse]) -> Vec<Quota> {
    untagged
        .iter()
        .filter_map(|r| match r {
            UntaggedResponse::Quota(q) => Some(q.clone()),
            _ => None,
        })
        .collect()
}

/// Reduces a FETCH response batch into `(seq, items)` pairs, one per
/// untagged FETCH response observed.
#[must_use]
pub fn reduce_fetch(untagged: &[UntaggedResponse]) -> Vec<(SeqNum, Vec<FetchItem>)> {
    untagged
        .iter()
        .filter_map(|r| match r {
            UntaggedResponse::Fetch { seq, items } => Some((*seq, items.clone())),
            _ => None,
        })
        .collect()
}

/// Renders an envelope address the way a mail header would: `"Name" <a@b>`
/// when a display name is present, bare `a@b` otherwise.
fn display_address(addr: &Address) -> Option<String> {
    let email = addr.email()?;
    Some(match &addr.name {
        Some(name) if !name.is_empty() => format!("{name} <{email}>"),
        _ => email,
    })
}

fn apply_envelope(info: &mut MessageInfo, envelope: Envelope) {
    info.subject = envelope
        .subject
        .as_deref()
        .map(mailwire_mime::encoding::decode_header);
    info.from = envelope.from.first().and_then(display_address);
    info.to = envelope.to.first().and_then(display_address);
    info.date = envelope.date;
    info.message_id = envelope.message_id;
}

fn apply_fetch_item(info: &mut MessageInfo, item: FetchItem) {
    match item {
        FetchItem::Uid(uid) => info.uid = Some(uid),
        FetchItem::Flags(flags) => info.flags = flags,
        FetchItem::InternalDate(date) if info.date.is_none() => info.date = Some(date),
        FetchItem::Envelope(envelope) => apply_envelope(info, *envelope),
        FetchItem::Body {
            section: Some(section),
            data: Some(data),
            ..
        } if section.eq_ignore_ascii_case("HEADER") => {
            if let Ok(text) = String::from_utf8(data) {
                for line in text.split("\r\n") {
                    if let Some((name, value)) = line.split_once(':') {
                        info.headers
                            .insert(name.trim().to_lowercase(), value.trim().to_string());
                    }
                }
            }
        }
        _ => {}
    }
}

/// Builds `MessageInfo` records from a FETCH response batch requested with
/// ENVELOPE/UID/FLAGS/INTERNALDATE/BODY.PEEK\[HEADER\] items.
#[must_use]
pub fn reduce_fetch_message_info(untagged: &[UntaggedResponse]) -> Vec<MessageInfo> {
    reduce_fetch(untagged)
        .into_iter()
        .map(|(seq, items)| {
            let mut info = MessageInfo::new(seq);
            for item in items {
                apply_fetch_item(&mut info, item);
            }
            info
        })
        .collect()
}

/// Event observed while the connection is idling (RFC 2177).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleEvent {
    /// Mailbox message count changed.
    Exists(u32),
    /// A message was expunged.
    Expunge(SeqNum),
    /// Recent-message count changed.
    Recent(u32),
    /// Mailbox-level flags changed.
    Flags(Flags),
    /// A message's attributes changed.
    Fetch(MessageInfo),
    /// The server sent BYE; the connection is terminating.
    Bye(String),
}

/// Turns one untagged response observed during IDLE into the public event
/// type, or `None` if it carries nothing a caller needs to see.
#[must_use]
pub fn idle_event(untagged: &UntaggedResponse) -> Option<IdleEvent> {
    match untagged {
        UntaggedResponse::Exists(n) => Some(IdleEvent::Exists(*n)),
        UntaggedResponse::Recent(n) => Some(IdleEvent::Recent(*n)),
        UntaggedResponse::Expunge(seq) => Some(IdleEvent::Expunge(*seq)),
        UntaggedResponse::Flags(flags) => Some(IdleEvent::Flags(flags.clone())),
        UntaggedResponse::Bye { text, .. } => Some(IdleEvent::Bye(text.clone())),
        UntaggedResponse::Fetch { seq, items } => {
            let mut info = MessageInfo::new(*seq);
            for item in items.clone() {
                apply_fetch_item(&mut info, item);
            }
            Some(IdleEvent::Fetch(info))
        }
        _ => None,
    }
}

/// Resolves a caller-preferred destination mailbox for a convenience
/// operation (move-to-trash/archive/junk/draft) from the server's
/// `LIST "" "*"` special-use attributes, falling back to name heuristics
/// (e.g. Gmail's `[Gmail]/Trash`) when SPECIAL-USE is not advertised.
#[must_use]
pub fn resolve_special_mailbox(
    mailboxes: &[ListResponse],
    attribute: MailboxAttribute,
    name_fallbacks: &[&str],
) -> Option<Mailbox> {
    mailboxes
        .iter()
        .find(|m| m.attributes.contains(&attribute))
        .map(|m| m.mailbox.clone())
        .or_else(|| {
            name_fallbacks.iter().find_map(|candidate| {
                mailboxes
                    .iter()
                    .find(|m| m.mailbox.as_str().eq_ignore_ascii_case(candidate))
                    .map(|m| m.mailbox.clone())
            })
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Uid;

    #[test]
    fn reduces_capability_from_latest_response() {
        let untagged = vec![
            UntaggedResponse::Capability(vec![Capability::Imap4Rev1]),
            UntaggedResponse::Capability(vec![Capability::Imap4Rev1, Capability::Idle]),
        ];
        let caps = reduce_capability(&untagged);
        assert!(caps.contains(&Capability::Idle));
    }

    #[test]
    fn select_derives_unseen_count() {
        let untagged = vec![
            UntaggedResponse::Exists(10),
            UntaggedResponse::Ok {
                code: Some(ResponseCode::Unseen(SeqNum::new(4).unwrap())),
                text: String::new(),
            },
        ];
        let status = reduce_select(&untagged, false);
        assert_eq!(status.exists, 10);
        assert_eq!(status.unseen_count, Some(7));
    }

    #[test]
    fn select_leaves_unseen_count_unset_without_first_unseen() {
        let untagged = vec![UntaggedResponse::Exists(3)];
        let status = reduce_select(&untagged, false);
        assert!(status.unseen_count.is_none());
    }

    #[test]
    fn fetch_message_info_collects_uid_and_flags() {
        let untagged = vec![UntaggedResponse::Fetch {
            seq: SeqNum::new(1).unwrap(),
            items: vec![
                FetchItem::Uid(Uid::new(99).unwrap()),
                FetchItem::Flags(Flags::new()),
            ],
        }];
        let infos = reduce_fetch_message_info(&untagged);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].uid, Some(Uid::new(99).unwrap()));
    }

    #[test]
    fn fetch_message_info_decodes_envelope_subject() {
        let envelope = Envelope {
            subject: Some("=?utf-8?Q?Gesch=C3=A4ftsbericht?=".to_string()),
            from: vec![Address {
                name: Some("Sender".to_string()),
                adl: None,
                mailbox: Some("sender".to_string()),
                host: Some("example.com".to_string()),
            }],
            ..Envelope::default()
        };
        let untagged = vec![UntaggedResponse::Fetch {
            seq: SeqNum::new(1).unwrap(),
            items: vec![FetchItem::Envelope(Box::new(envelope))],
        }];
        let infos = reduce_fetch_message_info(&untagged);
        assert_eq!(infos[0].subject.as_deref(), Some("Geschäftsbericht"));
        assert_eq!(infos[0].from.as_deref(), Some("Sender <sender@example.com>"));
    }

    #[test]
    fn resolves_special_mailbox_by_attribute_then_name() {
        let trash = ListResponse {
            mailbox: Mailbox::new("Deleted Items"),
            delimiter: Some('/'),
            attributes: vec![MailboxAttribute::Trash],
        };
        let gmail_trash = ListResponse {
            mailbox: Mailbox::new("[Gmail]/Trash"),
            delimiter: Some('/'),
            attributes: vec![],
        };
        let by_attr =
            resolve_special_mailbox(std::slice::from_ref(&trash), MailboxAttribute::Trash, &["trash"]);
        assert_eq!(by_attr, Some(trash.mailbox));

        let by_name = resolve_special_mailbox(
            std::slice::from_ref(&gmail_trash),
            MailboxAttribute::Trash,
            &["[Gmail]/Trash"],
        );
        assert_eq!(by_name, Some(gmail_trash.mailbox));
    }

    #[test]
    fn idle_event_maps_bye() {
        let untagged = UntaggedResponse::Bye {
            code: None,
            text: "server shutting down".to_string(),
        };
        assert_eq!(
            idle_event(&untagged),
            Some(IdleEvent::Bye("server shutting down".to_string()))
        );
    }
}
