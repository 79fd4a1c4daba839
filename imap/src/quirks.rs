//! Server quirks and workarounds.
//!
//! Most servers behave close enough to RFC 9051 that no special-casing is
//! needed. The one quirk worth tracking centrally is Gmail's folder model:
//! it exposes labels as mailboxes under a `[Gmail]/` prefix and often omits
//! RFC 6154 SPECIAL-USE attributes on them, so name-based fallback is the
//! only way to find Trash/Archive/Junk/Drafts reliably.

use crate::types::Capability;

/// Known IMAP server types relevant to folder-resolution quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerType {
    /// Unknown or generic IMAP server.
    #[default]
    Unknown,
    /// Gmail IMAP (imap.gmail.com).
    Gmail,
}

impl ServerType {
    /// Detects the server type from capabilities and, if available, the
    /// server's greeting text.
    #[must_use]
    pub fn detect(capabilities: &[Capability], greeting: Option<&str>) -> Self {
        let has_gmail_extension = capabilities.iter().any(|c| {
            matches!(c, Capability::Unknown(s) if s.to_uppercase().starts_with("X-GM-"))
        });
        if has_gmail_extension {
            return Self::Gmail;
        }

        if let Some(greeting) = greeting {
            let lower = greeting.to_lowercase();
            if lower.contains("gimap") || lower.contains("gmail") {
                return Self::Gmail;
            }
        }

        Self::Unknown
    }
}

/// Server-specific quirks affecting folder resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerQuirks {
    /// The detected server type.
    pub server_type: ServerType,
}

impl ServerQuirks {
    /// Creates quirks configuration for the detected server type.
    #[must_use]
    pub fn for_server(server_type: ServerType) -> Self {
        Self { server_type }
    }

    /// Name fallbacks to try for a special-use mailbox kind when the server
    /// doesn't advertise SPECIAL-USE attributes, ordered most to least
    /// likely.
    #[must_use]
    pub fn name_fallbacks(&self, kind: &str) -> Vec<&'static str> {
        match (self.server_type, kind.to_lowercase().as_str()) {
            (ServerType::Gmail, "trash") => vec!["[Gmail]/Trash", "[Gmail]/Bin"],
            (ServerType::Gmail, "archive") => vec!["[Gmail]/All Mail"],
            (ServerType::Gmail, "junk") => vec!["[Gmail]/Spam"],
            (ServerType::Gmail, "drafts") => vec!["[Gmail]/Drafts"],
            (ServerType::Gmail, "sent") => vec!["[Gmail]/Sent Mail"],
            (_, "trash") => vec!["Trash", "Deleted Items"],
            (_, "archive") => vec!["Archive"],
            (_, "junk") => vec!["Junk", "Spam"],
            (_, "drafts") => vec!["Drafts"],
            (_, "sent") => vec!["Sent", "Sent Items"],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gmail_from_capability() {
        let caps = vec![Capability::Unknown("X-GM-EXT-1".to_string())];
        assert_eq!(ServerType::detect(&caps, None), ServerType::Gmail);
    }

    #[test]
    fn detects_gmail_from_greeting() {
        assert_eq!(
            ServerType::detect(&[], Some("* OK Gimap ready")),
            ServerType::Gmail
        );
    }

    #[test]
    fn unknown_server_falls_back_to_generic_names() {
        let quirks = ServerQuirks::for_server(ServerType::Unknown);
        assert_eq!(quirks.name_fallbacks("trash"), vec!["Trash", "Deleted Items"]);
    }

    #[test]
    fn gmail_server_falls_back_to_bracketed_names() {
        let quirks = ServerQuirks::for_server(ServerType::Gmail);
        assert_eq!(quirks.name_fallbacks("archive"), vec!["[Gmail]/All Mail"]);
    }
}
