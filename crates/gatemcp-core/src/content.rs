//! Content items produced by resource and tool handlers.
//!
//! A [`ContentItem`] owns its MIME type and payload buffers. Items are
//! acquired from the [`ObjectPool`](crate::ObjectPool) rather than
//! allocated per request; releasing an item recycles its buffers.

use serde::{Deserialize, Serialize};

/// The kind of payload a content item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// UTF-8 text.
    Text,
    /// A JSON document (UTF-8 bytes of its serialization).
    Json,
    /// Opaque binary data.
    Binary,
}

/// One piece of a resource's or tool's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    content_type: ContentType,
    mime_type: String,
    data: Vec<u8>,
}

impl ContentItem {
    /// Creates an empty text item. Pools use this for fresh slots.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            content_type: ContentType::Text,
            mime_type: String::new(),
            data: Vec::new(),
        }
    }

    /// Replaces this item's type, MIME type, and payload.
    pub fn set(&mut self, content_type: ContentType, mime_type: &str, data: &[u8]) {
        self.content_type = content_type;
        self.mime_type.clear();
        self.mime_type.push_str(mime_type);
        self.data.clear();
        self.data.extend_from_slice(data);
    }

    /// Copies another item's contents into this one.
    pub fn copy_from(&mut self, other: &ContentItem) {
        self.set(other.content_type, &other.mime_type, &other.data);
    }

    /// Clears the payload while keeping buffer capacity for reuse.
    pub fn recycle(&mut self) {
        self.content_type = ContentType::Text;
        self.mime_type.clear();
        self.data.clear();
    }

    /// Returns the payload kind.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the MIME type string.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the raw payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the payload as text, if this is a text item with valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self.content_type {
            ContentType::Text => std::str::from_utf8(&self.data).ok(),
            ContentType::Json | ContentType::Binary => None,
        }
    }
}

impl Default for ContentItem {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read_back() {
        let mut item = ContentItem::empty();
        item.set(ContentType::Text, "text/plain", b"hello");
        assert_eq!(item.content_type(), ContentType::Text);
        assert_eq!(item.mime_type(), "text/plain");
        assert_eq!(item.size(), 5);
        assert_eq!(item.as_text(), Some("hello"));
    }

    #[test]
    fn recycle_keeps_capacity() {
        let mut item = ContentItem::empty();
        item.set(ContentType::Binary, "application/octet-stream", &[0u8; 256]);
        let cap = item.data.capacity();
        item.recycle();
        assert_eq!(item.size(), 0);
        assert_eq!(item.mime_type(), "");
        assert!(item.data.capacity() >= cap);
    }

    #[test]
    fn binary_has_no_text_view() {
        let mut item = ContentItem::empty();
        item.set(ContentType::Binary, "application/octet-stream", b"hello");
        assert_eq!(item.as_text(), None);
    }
}
