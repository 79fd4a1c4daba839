//! # mailwire-imap
//!
//! An async IMAP client library implementing RFC 9051 (`IMAP4rev2`) with
//! fallback support for RFC 3501 (`IMAP4rev1`).
//!
//! ## Features
//!
//! - **Single flat `Connection`**: IMAP state (`NotAuthenticated` /
//!   `Authenticated` / `Selected`) is tracked at runtime rather than in the
//!   type system, so every command is one method call away.
//! - **Full protocol support**: LOGIN, SELECT, FETCH, STORE, COPY, MOVE,
//!   SEARCH, APPEND, EXPUNGE, IDLE, and RFC 2087 QUOTA/QUOTAROOT
//! - **TLS via rustls**: Secure connections without an OpenSSL dependency
//! - **Server quirks handling**: Built-in workarounds for Gmail's
//!   `[Gmail]/...` special-use folders
//! - **Sans-I/O parser**: Protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_imap::{Connection, Config};
//!
//! #[tokio::main]
//! async fn main() -> mailwire_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let mut connection = Connection::connect(&config).await?;
//!
//!     connection.login("user@example.com", "password").await?;
//!
//!     let folders = connection.list_mailboxes("*").await?;
//!     for folder in &folders {
//!         println!("Folder: {}", folder.mailbox.as_str());
//!     }
//!
//!     let status = connection.select("INBOX").await?;
//!     println!("Messages: {}", status.exists);
//!
//!     connection.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: IMAP command builders and types
//! - [`connection`]: Connection configuration, transport, and the
//!   [`Connection`] facade
//! - [`handler`]: Pure response-reduction functions shared by the facade
//! - [`parser`]: Sans-I/O response parser
//! - [`quirks`]: Server-specific workarounds
//! - [`time`]: `Clock` abstraction backing per-command deadlines
//! - [`types`]: Core IMAP types (flags, mailboxes, identifiers, etc.)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod handler;
pub mod mime_bridge;
pub mod parser;
pub mod quirks;
pub mod time;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Config, ConfigBuilder, Connection, FramedStream, IdleStream, ImapStream, ResponseAccumulator,
    Security,
};
pub use error::{Error, Result};
pub use handler::IdleEvent;
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use quirks::{ServerQuirks, ServerType};
pub use time::{BoxClock, Clock, MockClock, SystemClock};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus,
    MessageIdentifier, MessageIdentifierSet, ResponseCode, SeqNum, Status, Tag, Uid, UidValidity,
};

/// IMAP protocol version supported.
pub const IMAP_VERSION: &str = "IMAP4rev2";
