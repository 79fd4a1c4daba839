//! MIME body structure as reported by a FETCH BODYSTRUCTURE response.
//!
//! This mirrors RFC 3501 §7.4.2/§6.4.5: a message's MIME tree, with IMAP
//! part numbers (e.g. `1`, `1.2`, `2.1.1`) assigned depth-first, leaves
//! first within a multipart before descending further.

use std::collections::HashMap;

/// The basic MIME type of a leaf body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    /// Any non-text, non-message leaf part (`image/png`, `application/pdf`, ...).
    Basic {
        /// Top-level MIME type (e.g. "application").
        media_type: String,
        /// MIME subtype (e.g. "pdf").
        media_subtype: String,
    },
    /// A `text/*` leaf part, which additionally reports a line count.
    Text {
        /// MIME subtype (e.g. "plain", "html").
        media_subtype: String,
        /// Number of lines in the encoded body.
        lines: u32,
    },
    /// A `message/rfc822` leaf part, which embeds an envelope and nested structure.
    MessageRfc822 {
        /// Number of lines in the encoded body.
        lines: u32,
    },
}

/// Common body fields present on every leaf part (RFC 3501 §7.4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyFields {
    /// Body parameters (e.g. `charset=utf-8`).
    pub params: HashMap<String, String>,
    /// Content-Id header value, if present.
    pub content_id: Option<String>,
    /// Content-Description header value, if present.
    pub description: Option<String>,
    /// Content-Transfer-Encoding value (defaults to "7BIT" if absent).
    pub encoding: String,
    /// Size of the body in octets.
    pub size: u32,
}

/// Extension data following the required body fields (RFC 3501 §7.4.2).
///
/// Servers may omit any suffix of these fields; unparsed trailing fields
/// are simply absent rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyExtension {
    /// MD5 of the body, if reported.
    pub md5: Option<String>,
    /// Content-Disposition type and parameters, if reported.
    pub disposition: Option<(String, HashMap<String, String>)>,
    /// Content-Language, if reported.
    pub language: Vec<String>,
    /// Content-Location, if reported.
    pub location: Option<String>,
}

/// A node in a message's MIME body structure tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// A leaf (non-multipart) body part.
    SinglePart {
        /// The part's basic kind and type-specific fields.
        kind: BodyKind,
        /// Fields common to all leaf parts.
        fields: BodyFields,
        /// Optional extension data, if the server reported it.
        extension: Option<BodyExtension>,
    },
    /// A `multipart/*` body, containing zero or more child parts.
    MultiPart {
        /// Multipart subtype (e.g. "mixed", "alternative", "related").
        subtype: String,
        /// Child body structures, in wire order.
        children: Vec<BodyStructure>,
    },
}

impl BodyStructure {
    /// Returns the IMAP part numbers of every leaf (non-multipart) part,
    /// assigned depth-first per RFC 3501 §6.4.5.
    ///
    /// A non-multipart top-level message has the implicit part number `1`.
    #[must_use]
    pub fn leaf_part_numbers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaf_numbers("", &mut out);
        out
    }

    fn collect_leaf_numbers(&self, prefix: &str, out: &mut Vec<String>) {
        match self {
            Self::SinglePart { .. } => {
                out.push(if prefix.is_empty() {
                    "1".to_string()
                } else {
                    prefix.to_string()
                });
            }
            Self::MultiPart { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    let number = i + 1;
                    let child_prefix = if prefix.is_empty() {
                        number.to_string()
                    } else {
                        format!("{prefix}.{number}")
                    };
                    child.collect_leaf_numbers(&child_prefix, out);
                }
            }
        }
    }

    /// Returns true if this node is a `multipart/*` container.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::MultiPart { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(subtype: &str) -> BodyStructure {
        BodyStructure::SinglePart {
            kind: BodyKind::Text {
                media_subtype: subtype.to_string(),
                lines: 10,
            },
            fields: BodyFields {
                encoding: "7BIT".to_string(),
                size: 100,
                ..Default::default()
            },
            extension: None,
        }
    }

    #[test]
    fn single_leaf_message_is_part_one() {
        let body = leaf("plain");
        assert_eq!(body.leaf_part_numbers(), vec!["1".to_string()]);
    }

    #[test]
    fn multipart_numbers_children_depth_first() {
        let body = BodyStructure::MultiPart {
            subtype: "mixed".to_string(),
            children: vec![
                leaf("plain"),
                BodyStructure::MultiPart {
                    subtype: "alternative".to_string(),
                    children: vec![leaf("plain"), leaf("html")],
                },
            ],
        };
        assert_eq!(
            body.leaf_part_numbers(),
            vec!["1".to_string(), "2.1".to_string(), "2.2".to_string()]
        );
    }

    #[test]
    fn is_multipart() {
        let multi = BodyStructure::MultiPart {
            subtype: "mixed".to_string(),
            children: vec![leaf("plain")],
        };
        assert!(multi.is_multipart());
        assert!(!leaf("plain").is_multipart());
    }
}
