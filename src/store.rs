//! Immutable word store shared by every server session.
//!
//! The store is built once at startup and never mutated. Cloning is cheap
//! (`Arc<[String]>`), so each connection task holds its own handle and reads
//! without locks.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, WordfeedError};
use crate::protocol::{is_sentinel, TOKEN_DELIMITER};

/// Ordered, 0-indexed token sequence.
#[derive(Debug, Clone)]
pub struct WordStore {
    words: Arc<[String]>,
}

impl WordStore {
    /// Build a store from already tokenized words.
    pub fn from_words(words: Vec<String>) -> Self {
        Self {
            words: words.into(),
        }
    }

    /// Tokenize `text` and build a store from it.
    pub fn from_text(text: &str) -> Self {
        Self::from_words(tokenize(text))
    }

    /// Read and tokenize the document at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| WordfeedError::Corpus {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::from_text(&text);
        tracing::info!(path = %path.display(), words = store.len(), "Corpus loaded");
        Ok(store)
    }

    /// Number of words (N).
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if the store holds no words.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word at position `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// Words in `[offset, min(offset + count, N))`; empty if `offset >= N`.
    pub fn slice(&self, offset: usize, count: usize) -> &[String] {
        if offset >= self.words.len() {
            return &[];
        }
        let end = offset.saturating_add(count).min(self.words.len());
        &self.words[offset..end]
    }

    /// All words in order.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// Split a document into words.
///
/// Commas and ASCII whitespace both separate words, empty fragments are
/// dropped, and the reserved sentinels `EOF` / `$$` are removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut reserved = 0usize;
    let words: Vec<String> = text
        .split(|c: char| c == TOKEN_DELIMITER as char || c.is_ascii_whitespace())
        .filter(|w| !w.is_empty())
        .filter(|w| {
            let keep = !is_sentinel(w);
            if !keep {
                reserved += 1;
            }
            keep
        })
        .map(str::to_string)
        .collect();

    if reserved > 0 {
        tracing::warn!(count = reserved, "Dropped reserved sentinel tokens from corpus");
    }

    words
}
