//! The character-input contract.
//!
//! The parser never owns the text it parses. It pulls bytes through the
//! [`Input`] trait, chunk by chunk, which lets callers stream from ropes,
//! gap buffers, or plain strings without copying the whole document.

/// A source of UTF-8 text, addressed by absolute byte offset.
pub trait Input {
    /// Return the bytes starting at `byte_offset`. An empty slice signals
    /// end of input. The returned chunk may be arbitrarily short; the lexer
    /// re-reads across chunk boundaries as needed.
    fn read(&mut self, byte_offset: u32) -> &[u8];
}

/// An [`Input`] over an in-memory string, optionally served in fixed-size
/// chunks to exercise chunk-boundary handling.
#[derive(Debug, Clone)]
pub struct StringInput {
    text: String,
    chunk_size: usize,
}

impl StringInput {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunk_size: usize::MAX,
        }
    }

    /// Serve at most `chunk_size` bytes per read.
    #[must_use]
    pub fn with_chunk_size(text: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            text: text.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Input for StringInput {
    fn read(&mut self, byte_offset: u32) -> &[u8] {
        let bytes = self.text.as_bytes();
        let start = (byte_offset as usize).min(bytes.len());
        let end = start.saturating_add(self.chunk_size).min(bytes.len());
        &bytes[start..end]
    }
}
