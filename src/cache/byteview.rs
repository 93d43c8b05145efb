//! Cached Value Types
//!
//! `ByteView` is the immutable value handed out by the cache. It wraps a
//! reference-counted buffer, so clones are cheap and no consumer can mutate
//! bytes that other readers (or the cache itself) still hold.

use std::fmt;

use bytes::Bytes;

/// Size accounting for values stored in an [`LruCache`](super::LruCache).
pub trait ByteSize {
    /// Number of bytes this value counts against the cache budget.
    fn byte_size(&self) -> usize;
}

impl ByteSize for Bytes {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

/// Immutable view over a cached value's bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Create a view holding a private copy of `data`.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            b: Bytes::copy_from_slice(data),
        }
    }

    /// Length of the value in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// Check if the value is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Borrow the value's bytes
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.b
    }

    /// Owned copy of the value's bytes
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Shared handle to the underlying buffer (no copy)
    pub fn bytes(&self) -> Bytes {
        self.b.clone()
    }
}

impl ByteSize for ByteView {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

/// Takes ownership of the loader's buffer; nothing else can hold it.
impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        Self { b: Bytes::from(v) }
    }
}

impl From<Bytes> for ByteView {
    fn from(b: Bytes) -> Self {
        Self { b }
    }
}

impl From<&'static str> for ByteView {
    fn from(s: &'static str) -> Self {
        Self {
            b: Bytes::from_static(s.as_bytes()),
        }
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.b
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
