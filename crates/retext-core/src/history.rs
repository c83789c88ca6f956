//! Linear version history over successive text states.
//!
//! The history is a growable list of snapshots plus a cursor. Index 0 is the
//! original text of the session. Appending while the cursor is behind the end
//! drops every later version first (standard undo/redo semantics); navigating
//! never drops anything.

/// A snapshot of text at a given position in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextVersion<'a> {
    /// Zero-based index into the history.
    pub index: usize,
    pub text: &'a str,
}

/// In-memory undo/redo ledger for one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionHistory {
    original: String,
    versions: Vec<String>,
    cursor: usize,
}

impl VersionHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history whose first version is `text` (empty text yields an
    /// empty history).
    pub fn with_original(text: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.reset(text);
        history
    }

    /// Starts over with `text` as the original.
    pub fn reset(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.versions = if text.is_empty() {
            Vec::new()
        } else {
            vec![text.clone()]
        };
        self.original = text;
        self.cursor = 0;
    }

    /// Appends a new version after the cursor, discarding any forward history.
    pub fn append(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.versions.is_empty() {
            self.original.clone_from(&text);
        } else {
            self.versions.truncate(self.cursor + 1);
        }
        self.versions.push(text);
        self.cursor = self.versions.len() - 1;
    }

    /// Returns the text at the cursor, or `""` when the history is empty.
    pub fn current(&self) -> &str {
        self.versions.get(self.cursor).map_or("", String::as_str)
    }

    /// Returns the text the session started with.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Returns the version just before the cursor.
    ///
    /// `None` at the first version; there is nothing before the original.
    pub fn previous(&self) -> Option<&str> {
        let index = self.cursor.checked_sub(1)?;
        self.versions.get(index).map(String::as_str)
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.versions.len()
    }

    /// Moves one version back. Returns `None` without moving at the start.
    pub fn go_back(&mut self) -> Option<&str> {
        if !self.can_go_back() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Moves one version forward. Returns `None` without moving at the end.
    pub fn go_forward(&mut self) -> Option<&str> {
        if !self.can_go_forward() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    /// Jumps to the first version without touching later versions.
    pub fn restore_original(&mut self) -> &str {
        self.cursor = 0;
        self.current()
    }

    /// Number of stored versions.
    pub fn count(&self) -> usize {
        self.versions.len()
    }

    /// 1-based cursor position for display; 0 when empty.
    pub fn position(&self) -> usize {
        if self.versions.is_empty() {
            0
        } else {
            self.cursor + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Iterates over every stored version in order.
    pub fn versions(&self) -> impl Iterator<Item = TextVersion<'_>> {
        self.versions
            .iter()
            .enumerate()
            .map(|(index, text)| TextVersion { index, text })
    }
}
