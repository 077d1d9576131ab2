//! Word frequency table built by one client session.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::protocol::is_sentinel;

/// Word -> occurrence count, ordered by word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `word`. Sentinels are ignored.
    ///
    /// Returns true if the word was counted.
    pub fn record(&mut self, word: &str) -> bool {
        if word.is_empty() || is_sentinel(word) {
            return false;
        }
        match self.counts.get_mut(word) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(word.to_string(), 1);
            }
        }
        true
    }

    /// Count every word in `words`, returning how many were counted.
    pub fn record_all<S: AsRef<str>>(&mut self, words: &[S]) -> u64 {
        let mut counted = 0;
        for word in words {
            if self.record(word.as_ref()) {
                counted += 1;
            }
        }
        counted
    }

    /// Occurrences of `word`.
    pub fn get(&self, word: &str) -> u64 {
        self.counts.get(word).copied().unwrap_or(0)
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries sorted by word.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(w, c)| (w.as_str(), *c))
    }

    /// Write `word, count` lines sorted by word.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        for (word, count) in self.iter() {
            writeln!(out, "{}, {}", word, count)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write the table to `path`, replacing any existing file.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_to(BufWriter::new(file))
    }
}
