//! # mailwire-mime
//!
//! MIME header and body decoding/encoding for email clients.
//!
//! ## Features
//!
//! - **Header decoding**: RFC 2047 encoded-words (Q and B), with charset
//!   transcoding and adjacent-word concatenation.
//! - **Body decoding**: Base64 and Quoted-Printable, with soft fallback to
//!   the original bytes when decoding fails rather than erroring.
//! - **Date parsing**: RFC 5322 date header, tolerating common real-world
//!   format variants.
//! - **Message composition**: [`MessageBuilder`] renders outbound
//!   text/HTML/attachment trees (`multipart/mixed`, `multipart/alternative`)
//!   for SMTP submission.
//!
//! ## Quick Start
//!
//! ```
//! use mailwire_mime::encoding::decode_header;
//!
//! let subject = decode_header("=?utf-8?Q?Gesch=C3=A4ftsbericht?=");
//! assert_eq!(subject, "Geschäftsbericht");
//! ```
//!
//! ```
//! use mailwire_mime::MessageBuilder;
//!
//! let bytes = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Test Message")
//!     .text("Hello, World!")
//!     .build("unique-boundary-seed")
//!     .unwrap();
//! assert!(String::from_utf8(bytes).unwrap().contains("Hello, World!"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Attachment, Message, MessageBuilder, Part, TransferEncoding};
