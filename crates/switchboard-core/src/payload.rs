//! Opaque message bodies moved between connections.

use std::sync::Arc;

use bytes::Bytes;

/// A frame body. The router never looks inside; cloning is a refcount bump
/// so one payload can be handed to every recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(Arc<str>),
    /// Binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Build a text payload.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// Build a binary payload.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// The text body, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&**t),
            Self::Binary(_) => None,
        }
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_accessors() {
        let p = Payload::text("hi");
        assert_eq!(p.as_text(), Some("hi"));
        assert_eq!(p.len(), 2);
        assert!(!p.is_empty());
    }

    #[test]
    fn binary_has_no_text() {
        let p = Payload::binary(vec![1_u8, 2, 3]);
        assert!(p.as_text().is_none());
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn clones_share_the_body() {
        let p = Payload::text("shared");
        let q = p.clone();
        match (&p, &q) {
            (Payload::Text(a), Payload::Text(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected text payloads"),
        }
    }

    #[test]
    fn empty_string_is_empty() {
        assert!(Payload::from(String::new()).is_empty());
    }
}
