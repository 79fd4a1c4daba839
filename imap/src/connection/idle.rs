//! IMAP IDLE command support (RFC 2177).
//!
//! IDLE lets the client receive unsolicited mailbox updates without
//! polling. [`Connection::idle`](super::Connection::idle) writes the
//! command and waits for the server's `+` continuation, then hands back an
//! [`IdleStream`] that yields one [`IdleEvent`] per untagged response until
//! the caller sends `DONE` or the server sends `BYE`.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Connection;
use crate::command::Command;
use crate::handler::{self, CommandKind, IdleEvent};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::Result;

/// A live IDLE session borrowed from a [`Connection`].
///
/// Calling [`IdleStream::done`] is the clean way to end a session, but
/// dropping the stream without it (a cancelled future, an early `?`) is
/// also safe: `Drop` leaves a pending `DONE` on the connection that gets
/// flushed, best effort, before the next command is sent.
pub struct IdleStream<'a, S> {
    connection: &'a mut Connection<S>,
    tag: String,
    terminated: bool,
}

impl<'a, S> IdleStream<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) const fn new(connection: &'a mut Connection<S>, tag: String) -> Self {
        Self {
            connection,
            tag,
            terminated: false,
        }
    }

    /// Reads the next unsolicited event, or `None` once the session has
    /// ended (BYE, or the server unexpectedly completed the tagged IDLE
    /// response on its own).
    pub async fn next(&mut self) -> Result<Option<IdleEvent>> {
        if self.terminated {
            return Ok(None);
        }
        loop {
            let raw = self.connection.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Untagged(untagged) => {
                    let bye = matches!(untagged, UntaggedResponse::Bye { .. });
                    if let Some(event) = handler::idle_event(&untagged) {
                        if bye {
                            self.terminated = true;
                            self.connection.closed = true;
                        }
                        return Ok(Some(event));
                    }
                    // Untagged response IDLE doesn't surface as an event
                    // (e.g. a bare CAPABILITY); keep reading.
                }
                Response::Tagged { .. } => {
                    // Server closed out IDLE on its own without a DONE.
                    self.terminated = true;
                    return Ok(None);
                }
                Response::Continuation { .. } => {}
            }
        }
    }

    /// Ends the IDLE session by sending `DONE` and awaiting its tagged
    /// response. A no-op if the session already ended via BYE.
    pub async fn done(mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        let cmd = Command::Done.serialize("");
        self.connection.stream.write_command(&cmd).await?;
        self.terminated = true;

        loop {
            let raw = self.connection.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Tagged { tag, status, text, .. } if tag.as_str() == self.tag => {
                    return handler::evaluate_tagged(status, text, CommandKind::Generic);
                }
                _ => {}
            }
        }
    }
}

impl<'a, S> Drop for IdleStream<'a, S> {
    /// Leaves a pending `DONE` on the connection if the session ended
    /// without [`IdleStream::done`] being called. `Drop` can't await the
    /// server's tagged response itself, so the actual write happens the
    /// next time a command runs on the connection.
    fn drop(&mut self) {
        if !self.terminated {
            self.connection.pending_done = Some(std::mem::take(&mut self.tag));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Connection;

    #[tokio::test]
    async fn drop_without_done_sets_pending_done() {
        let mock = tokio_test::io::Builder::new().read(b"* OK ready\r\n").build();
        let mut connection = Connection::from_stream(mock).await.unwrap();

        {
            let stream = IdleStream::new(&mut connection, "A1".to_string());
            drop(stream);
        }

        assert_eq!(connection.pending_done.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn done_does_not_leave_a_pending_done() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"DONE\r\n")
            .read(b"A1 OK IDLE terminated\r\n")
            .build();
        let mut connection = Connection::from_stream(mock).await.unwrap();

        let stream = IdleStream::new(&mut connection, "A1".to_string());
        stream.done().await.unwrap();

        assert!(connection.pending_done.is_none());
    }

    #[tokio::test]
    async fn bye_terminated_stream_does_not_queue_a_second_done() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .read(b"* BYE server shutting down\r\n")
            .build();
        let mut connection = Connection::from_stream(mock).await.unwrap();

        {
            let mut stream = IdleStream::new(&mut connection, "A1".to_string());
            let event = stream.next().await.unwrap();
            assert!(matches!(event, Some(IdleEvent::Bye(_))));
        }

        assert!(connection.pending_done.is_none());
        assert!(connection.closed);
    }
}
