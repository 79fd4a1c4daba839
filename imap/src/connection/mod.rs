//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers: configuration
//! (host, port, security mode), the TLS/plaintext stream abstraction, framed
//! I/O, and the [`Connection`] facade that ties them together into the
//! public async API.
//!
//! `Connection` tracks its IMAP state (`NotAuthenticated` / `Authenticated` /
//! `Selected`) at runtime rather than in the type system: a single struct
//! with one method per command, checked against an internal state enum. A
//! command issued from the wrong state fails with [`Error::InvalidState`]
//! instead of a compile error.

mod config;
mod framed;
mod idle;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

pub use config::{Config, ConfigBuilder, Security};
pub use framed::{FramedStream, ResponseAccumulator};
pub use idle::IdleStream;
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector};

use crate::command::{Command, FetchItems, SearchCriteria, StoreAction, TagGenerator};
use crate::handler::{self, CommandKind, IdleEvent};
use crate::mime_bridge;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::quirks::{ServerQuirks, ServerType};
use crate::time::{Clock, SystemClock};
use crate::types::{
    Capability, Flag, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, Message,
    MessageIdentifier, MessageIdentifierSet, MessageInfo, MessagePart, Quota, ResponseCode,
    SeqNum, Status, Uid,
};
use crate::{Error, Result};

/// Runtime-tracked IMAP connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectionState {
    NotAuthenticated,
    Authenticated,
    Selected {
        mailbox: Mailbox,
        status: MailboxStatus,
    },
}

impl ConnectionState {
    const fn kind(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected { .. } => "selected",
        }
    }
}

/// FETCH items requested for [`Connection::fetch_message_info`]: everything
/// needed to populate a [`MessageInfo`] in one round trip.
const MESSAGE_INFO_ITEMS: &[crate::command::FetchAttribute] = &[
    crate::command::FetchAttribute::Uid,
    crate::command::FetchAttribute::Flags,
    crate::command::FetchAttribute::InternalDate,
    crate::command::FetchAttribute::Envelope,
];

/// An IMAP client connection.
///
/// Every operation sends exactly one command and awaits its tagged
/// completion before returning, so a `Connection` never has more than one
/// command in flight; callers requiring concurrency should open multiple
/// connections, as real IMAP clients do.
pub struct Connection<S> {
    stream: FramedStream<S>,
    tag_gen: TagGenerator,
    capabilities: Vec<Capability>,
    quirks: ServerQuirks,
    state: ConnectionState,
    /// Set once the server sends BYE outside of a normal LOGOUT (e.g. during
    /// IDLE), after which every command fails with [`Error::ConnectionLost`]
    /// without a round trip.
    closed: bool,
    /// Clock used to measure per-command deadlines; swappable in tests via
    /// [`Connection::with_clock`].
    clock: Arc<dyn Clock>,
    /// Deadline for cheap commands (LOGIN, SELECT, STORE, ...).
    command_timeout: Duration,
    /// Deadline for FETCH and other bulk-retrieval commands.
    fetch_timeout: Duration,
    /// Cancellation handle shared with callers via
    /// [`Connection::cancellation_token`]. Checked before a command's bytes
    /// hit the wire; a command already written always runs to completion.
    cancel: CancellationToken,
    /// Set by an [`IdleStream`] dropped without calling `done()`. Flushed
    /// (best effort) the next time a command is run, so a cancelled/aborted
    /// IDLE doesn't leave the server waiting for `DONE` forever.
    pending_done: Option<String>,
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("capabilities", &self.capabilities)
            .field("state", &self.state.kind())
            .finish_non_exhaustive()
    }
}

impl Connection<ImapStream> {
    /// Connects to `config.host:config.port` and performs the TLS handshake
    /// implied by `config.security`, then reads the server greeting.
    pub async fn connect(config: &Config) -> Result<Self> {
        let connect_fut = async {
            match config.security {
                Security::Implicit => connect_tls(&config.host, config.port).await,
                Security::None | Security::StartTls => {
                    connect_plain(&config.host, config.port).await
                }
            }
        };
        let stream = tokio::time::timeout(config.connect_timeout, connect_fut)
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))??;

        let mut connection = Self::from_stream(stream).await?;
        connection.command_timeout = config.command_timeout;
        connection.fetch_timeout = config.fetch_timeout;

        if config.security == Security::StartTls {
            connection = connection.starttls(config).await?;
        }

        Ok(connection)
    }

    async fn starttls(mut self, config: &Config) -> Result<Self> {
        let tag = self.tag_gen.next();
        let cmd = Command::StartTls.serialize(&tag);
        self.stream.write_command(&cmd).await?;
        self.read_command_response(&tag, CommandKind::Generic).await?;

        let plain = self.stream.into_inner();
        let tls = plain.upgrade_to_tls(&config.host).await?;
        self.stream = FramedStream::new(tls);
        self.fetch_capabilities().await?;
        Ok(self)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-connected stream, reading the server greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_response().await?;
        let parsed = ResponseParser::parse(&greeting)?;

        let (code, greeting_text) = match parsed {
            Response::Untagged(UntaggedResponse::Ok { code, text }) => (code, Some(text)),
            Response::Untagged(UntaggedResponse::PreAuth { code, text }) => (code, Some(text)),
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::GreetingFailed(text));
            }
            _ => (None, None),
        };

        let capabilities = match code {
            Some(ResponseCode::Capability(caps)) => caps,
            _ => Vec::new(),
        };
        let server_type = ServerType::detect(&capabilities, greeting_text.as_deref());

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            quirks: ServerQuirks::for_server(server_type),
            state: ConnectionState::NotAuthenticated,
            closed: false,
            clock: Arc::new(SystemClock),
            command_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(20),
            cancel: CancellationToken::new(),
            pending_done: None,
        })
    }

    /// Overrides the clock used to measure per-command deadlines, e.g. with
    /// a [`crate::time::MockClock`] in tests that exercise timeout behavior
    /// without real sleeps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a [`CancellationToken`] the caller can hold onto and cancel
    /// to abort a not-yet-written command. Cancelling after a command's
    /// bytes are already on the wire has no effect on that command; it
    /// still runs to completion.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the capabilities most recently observed from the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns true if the server has advertised the given capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    fn require_state(&self, expected: &str) -> Result<()> {
        let matches = match (&self.state, expected) {
            (ConnectionState::NotAuthenticated, "not authenticated")
            | (ConnectionState::Authenticated, "authenticated")
            | (ConnectionState::Selected { .. }, "selected") => true,
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "expected {expected} state, connection is {}",
                self.state.kind()
            )))
        }
    }

    /// Returns the deadline applied to a command of the given kind: the
    /// longer `fetch_timeout` for FETCH and other bulk-retrieval commands,
    /// `command_timeout` for everything else. IDLE bypasses `run_command`
    /// entirely and carries no deadline.
    const fn command_deadline(&self, kind: CommandKind) -> Duration {
        match kind {
            CommandKind::Fetch | CommandKind::Store | CommandKind::Copy | CommandKind::Expunge => {
                self.fetch_timeout
            }
            _ => self.command_timeout,
        }
    }

    /// Sends a best-effort `DONE` for an IDLE session that was dropped
    /// without calling [`IdleStream::done`], so the next command issued on
    /// this connection doesn't confuse a server still expecting `DONE`.
    /// Failures here are swallowed: the worst case is a stale connection
    /// that the next real command will surface as [`Error::ConnectionLost`]
    /// or a parse error.
    async fn flush_pending_done(&mut self) {
        let Some(tag) = self.pending_done.take() else {
            return;
        };
        if self
            .stream
            .write_command(&Command::Done.serialize(""))
            .await
            .is_err()
        {
            return;
        }
        let mut accumulator = ResponseAccumulator::new(&tag);
        let _ = accumulator.read_until_tagged(&mut self.stream).await;
    }

    /// Runs one command to completion: writes it, collects untagged
    /// responses until the matching tagged response arrives, and maps a
    /// failing tagged status to a `kind`-specific error.
    async fn run_command(&mut self, cmd: &Command, kind: CommandKind) -> Result<Vec<UntaggedResponse>> {
        if self.closed {
            return Err(Error::ConnectionLost(
                "connection closed by server".to_string(),
            ));
        }
        self.flush_pending_done().await;
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let tag = self.tag_gen.next();
        let bytes = cmd.serialize(&tag);
        self.stream.write_command(&bytes).await?;
        self.read_command_response(&tag, kind).await
    }

    async fn read_command_response(
        &mut self,
        tag: &str,
        kind: CommandKind,
    ) -> Result<Vec<UntaggedResponse>> {
        let deadline = self.command_deadline(kind);
        let start = self.clock.now();
        let mut accumulator = ResponseAccumulator::new(tag);
        let raw = match tokio::time::timeout(
            deadline,
            accumulator.read_until_tagged(&mut self.stream),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                self.closed = true;
                return Err(Error::Timeout(self.clock.elapsed(start)));
            }
        };

        let mut untagged = Vec::with_capacity(raw.len());
        let mut outcome: Option<(Status, String)> = None;

        for bytes in &raw {
            match ResponseParser::parse(bytes)? {
                Response::Untagged(u) => untagged.push(u),
                Response::Tagged { status, text, .. } => outcome = Some((status, text)),
                Response::Continuation { .. } => {}
            }
        }

        let (status, text) = outcome.ok_or_else(|| {
            Error::Protocol(format!("missing tagged response for {tag}"))
        })?;
        handler::evaluate_tagged(status, text, kind)?;
        Ok(untagged)
    }

    fn update_capabilities_if_present(&mut self, untagged: &[UntaggedResponse]) {
        let caps = handler::reduce_capability(untagged);
        if !caps.is_empty() {
            self.capabilities = caps;
        }
    }

    /// Authenticates with LOGIN.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.require_state("not authenticated")?;
        let cmd = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let untagged = self.run_command(&cmd, CommandKind::Login).await?;
        self.update_capabilities_if_present(&untagged);
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    /// Sends ID (RFC 2971) and returns the server's identification fields,
    /// if it returned any.
    ///
    /// The server's own ID reply is consumed along with the tagged response
    /// but is not parsed into structured fields, so this always returns
    /// `None` on success; a future RFC 2971 parser can populate it.
    pub async fn id(
        &mut self,
        parameters: Option<Vec<(String, String)>>,
    ) -> Result<Option<Vec<(String, String)>>> {
        let cmd = Command::Id { parameters };
        self.run_command(&cmd, CommandKind::Generic).await?;
        Ok(None)
    }

    /// Refreshes and returns the server's capability list.
    pub async fn fetch_capabilities(&mut self) -> Result<Vec<Capability>> {
        let untagged = self.run_command(&Command::Capability, CommandKind::Generic).await?;
        let caps = handler::reduce_capability(&untagged);
        if !caps.is_empty() {
            self.capabilities = caps.clone();
        }
        Ok(caps)
    }

    /// Lists mailboxes matching `wildcard` (e.g. `"*"` for all).
    pub async fn list_mailboxes(&mut self, wildcard: &str) -> Result<Vec<ListResponse>> {
        self.require_state("authenticated")?;
        let cmd = Command::List {
            reference: String::new(),
            pattern: wildcard.to_string(),
        };
        let untagged = self.run_command(&cmd, CommandKind::Generic).await?;
        Ok(handler::reduce_list(&untagged))
    }

    /// Lists mailboxes and keeps only the ones carrying a RFC 6154
    /// SPECIAL-USE attribute (Trash, Archive, Junk, Drafts, Sent, All,
    /// Flagged).
    pub async fn list_special_use_mailboxes(&mut self) -> Result<Vec<ListResponse>> {
        let all = self.list_mailboxes("*").await?;
        Ok(all
            .into_iter()
            .filter(|m| {
                m.attributes.iter().any(|a| {
                    matches!(
                        a,
                        MailboxAttribute::Trash
                            | MailboxAttribute::Archive
                            | MailboxAttribute::Junk
                            | MailboxAttribute::Drafts
                            | MailboxAttribute::Sent
                            | MailboxAttribute::All
                            | MailboxAttribute::Flagged
                    )
                })
            })
            .collect())
    }

    /// Selects a mailbox for read-write access.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.select_inner(mailbox, false).await
    }

    /// Selects a mailbox for read-only access (EXAMINE).
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.select_inner(mailbox, true).await
    }

    async fn select_inner(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus> {
        if matches!(self.state, ConnectionState::NotAuthenticated) {
            return Err(Error::InvalidState(
                "expected authenticated state, connection is not authenticated".to_string(),
            ));
        }

        let mbox = Mailbox::new(mailbox);
        let cmd = if read_only {
            Command::Examine {
                mailbox: mbox.clone(),
            }
        } else {
            Command::Select {
                mailbox: mbox.clone(),
                condstore: self.has_capability(&Capability::CondStore),
            }
        };

        let untagged = self.run_command(&cmd, CommandKind::Select).await?;
        let status = handler::reduce_select(&untagged, read_only);
        self.state = ConnectionState::Selected {
            mailbox: mbox,
            status: status.clone(),
        };
        Ok(status)
    }

    /// Closes the selected mailbox, expunging `\Deleted` messages, and
    /// returns to the authenticated state.
    pub async fn close_mailbox(&mut self) -> Result<()> {
        self.require_state("selected")?;
        self.run_command(&Command::Close, CommandKind::Generic).await?;
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    /// Deselects the current mailbox without expunging (RFC 3691 UNSELECT),
    /// returning to the authenticated state.
    pub async fn unselect_mailbox(&mut self) -> Result<()> {
        self.require_state("selected")?;
        self.run_command(&Command::Unselect, CommandKind::Generic).await?;
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    fn selected_status(&self) -> Result<&MailboxStatus> {
        match &self.state {
            ConnectionState::Selected { status, .. } => Ok(status),
            _ => Err(Error::InvalidState("no mailbox selected".to_string())),
        }
    }

    fn apply_limit(set: MessageIdentifierSet<SeqNum>, limit: Option<usize>) -> MessageIdentifierSet<SeqNum> {
        match limit {
            None => set,
            Some(n) => {
                let mut limited: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
                let mut remaining = n;
                for seq in 1..=set.cardinality() as u32 {
                    if remaining == 0 {
                        break;
                    }
                    if set.contains_value(seq)
                        && let Some(s) = SeqNum::new(seq)
                    {
                        limited.insert(s);
                        remaining -= 1;
                    }
                }
                limited
            }
        }
    }

    /// Fetches envelope/flag metadata for messages in `set`, optionally
    /// capped to the first `limit` matches.
    pub async fn fetch_message_info(
        &mut self,
        set: &MessageIdentifierSet<SeqNum>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageInfo>> {
        self.require_state("selected")?;
        if set.is_empty() {
            return Err(Error::EmptyIdentifierSet);
        }
        let sequence = Self::apply_limit(set.clone(), limit);
        let cmd = Command::Fetch {
            sequence,
            items: FetchItems::Items(MESSAGE_INFO_ITEMS.to_vec()),
            uid: false,
        };
        let untagged = self.run_command(&cmd, CommandKind::Fetch).await?;
        Ok(handler::reduce_fetch_message_info(&untagged))
    }

    fn identifier_command_set(id: MessageIdentifier) -> (MessageIdentifierSet<SeqNum>, bool) {
        match id {
            MessageIdentifier::SequenceNumber(seq) => {
                let mut set: MessageIdentifierSet<SeqNum> = MessageIdentifierSet::new();
                set.insert(seq);
                (set, false)
            }
            MessageIdentifier::Uid(uid) => {
                let mut set: MessageIdentifierSet<Uid> = MessageIdentifierSet::new();
                set.insert(uid);
                (set.recast(), true)
            }
        }
    }

    /// Fetches the BODYSTRUCTURE of a single message.
    pub async fn fetch_structure(
        &mut self,
        id: MessageIdentifier,
    ) -> Result<crate::types::BodyStructure> {
        self.require_state("selected")?;
        let (sequence, uid) = Self::identifier_command_set(id);
        let cmd = Command::Fetch {
            sequence,
            items: FetchItems::Items(vec![crate::command::FetchAttribute::BodyStructure]),
            uid,
        };
        let untagged = self.run_command(&cmd, CommandKind::Fetch).await?;
        handler::reduce_fetch(&untagged)
            .into_iter()
            .find_map(|(_, items)| {
                items.into_iter().find_map(|item| match item {
                    crate::parser::FetchItem::BodyStructure(s) => Some(s),
                    _ => None,
                })
            })
            .ok_or_else(|| Error::FetchFailed("server returned no BODYSTRUCTURE".to_string()))
    }

    /// Fetches one MIME part's raw bytes by IMAP section number (e.g. `"1.2"`).
    pub async fn fetch_part(&mut self, id: MessageIdentifier, section: &str) -> Result<MessagePart> {
        self.require_state("selected")?;
        let (sequence, uid) = Self::identifier_command_set(id);
        let cmd = Command::Fetch {
            sequence,
            items: FetchItems::Items(vec![crate::command::FetchAttribute::Body {
                section: Some(section.to_string()),
                peek: true,
                partial: None,
            }]),
            uid,
        };
        let untagged = self.run_command(&cmd, CommandKind::Fetch).await?;
        handler::reduce_fetch(&untagged)
            .into_iter()
            .find_map(|(_, items)| {
                items.into_iter().find_map(|item| match item {
                    crate::parser::FetchItem::Body {
                        data: Some(data), ..
                    } => Some(MessagePart {
                        section: section.to_string(),
                        content_type: String::new(),
                        disposition: None,
                        encoding: None,
                        filename: None,
                        content_id: None,
                        data,
                    }),
                    _ => None,
                })
            })
            .ok_or_else(|| Error::FetchFailed(format!("server returned no data for section {section}")))
    }

    /// Fetches every leaf MIME part of a message, depth-first per the
    /// BODYSTRUCTURE's part numbering, filling in content-type/encoding/
    /// disposition/filename metadata from the structure.
    pub async fn fetch_all_message_parts(&mut self, id: MessageIdentifier) -> Result<Vec<MessagePart>> {
        let structure = self.fetch_structure(id).await?;
        let mut leaves = Vec::new();
        collect_leaf_fields(&structure, "", &mut leaves);

        let mut parts = Vec::with_capacity(leaves.len());
        for (section, fields) in leaves {
            let mut part = self.fetch_part(id, &section).await?;
            part.content_type = fields.content_type;
            part.encoding = fields.encoding;
            part.disposition = fields.disposition;
            part.filename = fields.filename;
            part.content_id = fields.content_id;
            parts.push(part);
        }
        Ok(parts)
    }

    /// Fetches a message's envelope and every leaf MIME part in one call.
    pub async fn fetch_message(&mut self, info: &MessageInfo) -> Result<Message> {
        let id = info
            .uid
            .map(MessageIdentifier::Uid)
            .unwrap_or(MessageIdentifier::SequenceNumber(info.seq));
        let parts = self.fetch_all_message_parts(id).await?;
        Ok(Message {
            info: info.clone(),
            parts,
        })
    }

    /// Fetches envelope/flag metadata for a set of messages and then every
    /// leaf part of each, optionally capped to the first `limit` matches.
    pub async fn fetch_messages(
        &mut self,
        set: &MessageIdentifierSet<SeqNum>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let infos = self.fetch_message_info(set, limit).await?;
        let mut messages = Vec::with_capacity(infos.len());
        for info in infos {
            messages.push(self.fetch_message(&info).await?);
        }
        Ok(messages)
    }

    /// Searches the selected mailbox, optionally restricted to `set`.
    pub async fn search(
        &mut self,
        set: Option<&MessageIdentifierSet<SeqNum>>,
        criteria: SearchCriteria,
    ) -> Result<Vec<u32>> {
        self.require_state("selected")?;
        let criteria = match set {
            Some(set) if !set.is_empty() => {
                SearchCriteria::And(vec![SearchCriteria::SequenceSet(set.clone()), criteria])
            }
            _ => criteria,
        };
        let cmd = Command::Search {
            criteria,
            uid: false,
        };
        let untagged = self.run_command(&cmd, CommandKind::Generic).await?;
        Ok(handler::reduce_search(&untagged))
    }

    /// Applies a flag change to messages in `set`.
    pub async fn store(
        &mut self,
        set: &MessageIdentifierSet<SeqNum>,
        action: StoreAction,
    ) -> Result<Vec<MessageInfo>> {
        self.require_state("selected")?;
        if set.is_empty() {
            return Err(Error::EmptyIdentifierSet);
        }
        let cmd = Command::Store {
            sequence: set.clone(),
            action,
            uid: false,
            silent: false,
        };
        let untagged = self.run_command(&cmd, CommandKind::Store).await?;
        Ok(handler::reduce_fetch_message_info(&untagged))
    }

    /// Copies messages in `set` to `mailbox`.
    pub async fn copy(&mut self, set: &MessageIdentifierSet<SeqNum>, mailbox: &str) -> Result<()> {
        self.require_state("selected")?;
        if set.is_empty() {
            return Err(Error::EmptyIdentifierSet);
        }
        let cmd = Command::Copy {
            sequence: set.clone(),
            mailbox: Mailbox::new(mailbox),
            uid: false,
        };
        self.run_command(&cmd, CommandKind::Copy).await?;
        Ok(())
    }

    /// Moves messages in `set` to `mailbox`. Uses MOVE (RFC 6851) if the
    /// server advertises it, otherwise falls back to COPY + STORE
    /// `+\Deleted` + EXPUNGE.
    pub async fn r#move(&mut self, set: &MessageIdentifierSet<SeqNum>, mailbox: &str) -> Result<()> {
        self.require_state("selected")?;
        if set.is_empty() {
            return Err(Error::EmptyIdentifierSet);
        }

        if self.has_capability(&Capability::Move) {
            let cmd = Command::Move {
                sequence: set.clone(),
                mailbox: Mailbox::new(mailbox),
                uid: false,
            };
            self.run_command(&cmd, CommandKind::Generic).await?;
            return Ok(());
        }

        self.copy(set, mailbox).await?;
        self.store(set, StoreAction::AddFlags(vec![Flag::Deleted]))
            .await?;
        self.expunge().await?;
        Ok(())
    }

    /// Permanently removes `\Deleted`-flagged messages from the selected
    /// mailbox.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        self.require_state("selected")?;
        let untagged = self.run_command(&Command::Expunge, CommandKind::Expunge).await?;
        Ok(handler::reduce_expunge(&untagged))
    }

    /// Enters IDLE (RFC 2177), returning a stream of unsolicited events.
    /// The stream terminates on BYE, after which the connection is
    /// considered disconnected.
    pub async fn idle(&mut self) -> Result<IdleStream<'_, S>> {
        self.require_state("selected")?;
        if !self.has_capability(&Capability::Idle) {
            return Err(Error::CommandNotSupported("IDLE".to_string()));
        }
        self.flush_pending_done().await;
        let tag = self.tag_gen.next();
        let cmd = Command::Idle.serialize(&tag);
        self.stream.write_command(&cmd).await?;

        let continuation = self.stream.read_response().await?;
        if !continuation.starts_with(b"+") {
            return Err(Error::Protocol(
                "expected continuation response to IDLE".to_string(),
            ));
        }

        Ok(IdleStream::new(self, tag))
    }

    /// Fetches the quota roots and usage for `mailbox_or_root`. Pass a
    /// mailbox name to use GETQUOTAROOT (which also resolves which root(s)
    /// apply), or a known root name directly for GETQUOTA.
    pub async fn quota(&mut self, mailbox_or_root: &str) -> Result<Vec<Quota>> {
        let cmd = Command::GetQuotaRoot {
            mailbox: Mailbox::new(mailbox_or_root),
        };
        let untagged = self.run_command(&cmd, CommandKind::Generic).await?;
        let quotas = handler::reduce_quota(&untagged);
        if !quotas.is_empty() {
            return Ok(quotas);
        }

        let cmd = Command::GetQuota {
            root: mailbox_or_root.to_string(),
        };
        let untagged = self.run_command(&cmd, CommandKind::Generic).await?;
        Ok(handler::reduce_quota(&untagged))
    }

    /// Sends NAMESPACE (RFC 2342) and returns whether the server accepted
    /// it; namespace parsing beyond presence/absence isn't otherwise
    /// exposed by this client.
    pub async fn namespace(&mut self) -> Result<bool> {
        self.run_command(&Command::Namespace, CommandKind::Generic).await?;
        Ok(true)
    }

    /// Sends NOOP, used to poll for unsolicited updates or keep the
    /// connection alive.
    pub async fn noop(&mut self) -> Result<()> {
        self.run_command(&Command::Noop, CommandKind::Generic).await?;
        Ok(())
    }

    /// Gracefully logs out (sends LOGOUT and waits for the server to close).
    pub async fn logout(mut self) -> Result<()> {
        self.flush_pending_done().await;
        let tag = self.tag_gen.next();
        let cmd = Command::Logout.serialize(&tag);
        self.stream.write_command(&cmd).await?;
        let _ = self.read_command_response(&tag, CommandKind::Generic).await;
        Ok(())
    }

    /// Drops the connection without a graceful LOGOUT.
    pub fn disconnect(self) {
        drop(self);
    }

    fn resolve_special_use<'a>(
        &self,
        mailboxes: &'a [ListResponse],
        attribute: MailboxAttribute,
        kind: &str,
    ) -> Result<Mailbox> {
        let fallbacks = self.quirks.name_fallbacks(kind);
        handler::resolve_special_mailbox(mailboxes, attribute, &fallbacks)
            .ok_or_else(|| Error::UndefinedFolder(kind.to_string()))
    }

    async fn move_to_special(
        &mut self,
        set: &MessageIdentifierSet<SeqNum>,
        attribute: MailboxAttribute,
        kind: &str,
    ) -> Result<()> {
        let mailboxes = self.list_mailboxes("*").await?;
        let target = self.resolve_special_use(&mailboxes, attribute, kind)?;
        self.r#move(set, target.as_str()).await
    }

    /// Moves messages to the server's Trash mailbox (SPECIAL-USE `\Trash`,
    /// falling back to common names like `Trash` or Gmail's
    /// `[Gmail]/Trash`).
    pub async fn move_to_trash(&mut self, set: &MessageIdentifierSet<SeqNum>) -> Result<()> {
        self.move_to_special(set, MailboxAttribute::Trash, "trash").await
    }

    /// Moves messages to the server's Archive mailbox.
    pub async fn archive(&mut self, set: &MessageIdentifierSet<SeqNum>) -> Result<()> {
        self.move_to_special(set, MailboxAttribute::Archive, "archive").await
    }

    /// Moves messages to the server's Junk/Spam mailbox.
    pub async fn mark_as_junk(&mut self, set: &MessageIdentifierSet<SeqNum>) -> Result<()> {
        self.move_to_special(set, MailboxAttribute::Junk, "junk").await
    }

    /// Appends `message` as a draft to the server's Drafts mailbox.
    pub async fn save_as_draft(&mut self, message: &[u8]) -> Result<()> {
        let mailboxes = self.list_mailboxes("*").await?;
        let target = self.resolve_special_use(&mailboxes, MailboxAttribute::Drafts, "drafts")?;
        self.append(target.as_str(), Some(vec![Flag::Draft]), message).await
    }

    /// Appends a complete RFC 5322 message to `mailbox`.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: Option<Vec<Flag>>,
        message: &[u8],
    ) -> Result<()> {
        let literal_plus = self.has_capability(&Capability::LiteralPlus);
        let cmd = Command::Append {
            mailbox: Mailbox::new(mailbox),
            flags,
            message: message.to_vec(),
            literal_plus,
        };
        let tag = self.tag_gen.next();
        let bytes = cmd.serialize(&tag);

        if literal_plus {
            self.stream.write_command(&bytes).await?;
        } else {
            let split = find_literal_boundary(&bytes);
            self.stream.write_command(&bytes[..split]).await?;
            let continuation = self.stream.read_response().await?;
            if !continuation.starts_with(b"+") {
                return Err(Error::Protocol(
                    "expected continuation response to APPEND".to_string(),
                ));
            }
            self.stream.write_command(&bytes[split..]).await?;
        }

        self.read_command_response(&tag, CommandKind::Generic).await?;
        Ok(())
    }

    /// Reads the decoded text of one fetched MIME part.
    #[must_use]
    pub fn decode_part_text(part: &MessagePart) -> String {
        mime_bridge::decode_part_text(part)
    }
}

/// Metadata for a single leaf body part, carried alongside its IMAP section
/// number so `fetch_part` results can be annotated without a second
/// BODYSTRUCTURE round trip.
struct LeafFields {
    content_type: String,
    encoding: Option<String>,
    disposition: Option<String>,
    filename: Option<String>,
    content_id: Option<String>,
}

fn collect_leaf_fields(
    node: &crate::types::BodyStructure,
    prefix: &str,
    out: &mut Vec<(String, LeafFields)>,
) {
    use crate::types::{BodyKind, BodyStructure};

    match node {
        BodyStructure::SinglePart {
            kind,
            fields,
            extension,
        } => {
            let section = if prefix.is_empty() {
                "1".to_string()
            } else {
                prefix.to_string()
            };
            let content_type = match kind {
                BodyKind::Basic {
                    media_type,
                    media_subtype,
                } => format!("{media_type}/{media_subtype}"),
                BodyKind::Text { media_subtype, .. } => format!("text/{media_subtype}"),
                BodyKind::MessageRfc822 { .. } => "message/rfc822".to_string(),
            };
            let (disposition, filename) = extension
                .as_ref()
                .and_then(|ext| ext.disposition.as_ref())
                .map(|(kind, params)| {
                    let filename = params
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case("filename"))
                        .map(|(_, v)| v.clone());
                    (Some(kind.clone()), filename)
                })
                .unwrap_or((None, None));

            out.push((
                section,
                LeafFields {
                    content_type,
                    encoding: Some(fields.encoding.clone()),
                    disposition,
                    filename,
                    content_id: fields.content_id.clone(),
                },
            ));
        }
        BodyStructure::MultiPart { children, .. } => {
            for (i, child) in children.iter().enumerate() {
                let number = i + 1;
                let child_prefix = if prefix.is_empty() {
                    number.to_string()
                } else {
                    format!("{prefix}.{number}")
                };
                collect_leaf_fields(child, &child_prefix, out);
            }
        }
    }
}

/// Finds the byte offset right after the `{n}\r\n` literal marker in a
/// serialized APPEND command, so the command line can be sent separately
/// from the literal bytes when LITERAL+ isn't available.
fn find_literal_boundary(bytes: &[u8]) -> usize {
    bytes
        .windows(2)
        .position(|w| w == b"\r\n")
        .map_or(bytes.len(), |pos| pos + 2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::time::MockClock;

    #[tokio::test]
    async fn cancelled_before_write_does_not_touch_the_wire() {
        // No `.write(...)` expectation: if `run_command` wrote anything, the
        // mock would panic on the unexpected I/O.
        let mock = tokio_test::io::Builder::new().read(b"* OK ready\r\n").build();
        let mut connection = Connection::from_stream(mock).await.unwrap();

        connection.cancellation_token().cancel();
        let err = connection
            .run_command(&Command::Noop, CommandKind::Generic)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_times_out_and_closes_the_connection() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A1 NOOP\r\n")
            .build();
        let mut connection = Connection::from_stream(mock).await.unwrap();
        connection.command_timeout = Duration::from_millis(100);
        connection.clock = Arc::new(MockClock::new());

        let handle = tokio::spawn(async move {
            let result = connection
                .run_command(&Command::Noop, CommandKind::Generic)
                .await;
            (connection, result)
        });

        tokio::time::advance(Duration::from_secs(1)).await;
        let (connection, result) = handle.await.unwrap();

        assert!(matches!(result.unwrap_err(), Error::Timeout(_)));
        assert!(connection.closed);
    }

    #[tokio::test]
    async fn with_clock_overrides_the_default_system_clock() {
        let mock = tokio_test::io::Builder::new().read(b"* OK ready\r\n").build();
        let connection = Connection::from_stream(mock).await.unwrap().with_clock(Arc::new(MockClock::new()));
        let start = connection.clock.now();
        assert_eq!(connection.clock.elapsed(start), Duration::ZERO);
    }
}
