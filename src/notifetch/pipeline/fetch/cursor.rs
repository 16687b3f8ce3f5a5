use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::notifetch::pipeline::error::Result;

/// Position within a paginated fetch.
///
/// A cursor is never mutated; [`FetchCursor::advance`] returns the next one.
/// `retrieved` counts every record handed to the caller so far, and the
/// token is the continuation the remote service gave for the page after
/// them. An exhausted cursor means the service reported no further pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCursor {
    token: Option<String>,
    retrieved: u64,
    #[serde(default)]
    exhausted: bool,
}

impl FetchCursor {
    /// The cursor of a fetch that has not requested anything yet.
    pub fn start() -> Self {
        Self::default()
    }

    /// Rebuilds a cursor from a previously reported token and count.
    pub fn resume(token: impl Into<String>, retrieved: u64) -> Self {
        Self {
            token: Some(token.into()),
            retrieved,
            exhausted: false,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn retrieved(&self) -> u64 {
        self.retrieved
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The cursor after a page of `batch` records whose response named
    /// `next_token` as the continuation (or `None` for the last page).
    pub fn advance(&self, next_token: Option<String>, batch: usize) -> Self {
        Self {
            exhausted: next_token.is_none(),
            token: next_token,
            retrieved: self.retrieved + batch as u64,
        }
    }

    /// Reads a cursor previously written with [`FetchCursor::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_counts_records_and_marks_the_last_page() {
        let start = FetchCursor::start();
        let first = start.advance(Some("c1".to_string()), 3);
        let last = first.advance(None, 2);

        assert_eq!(start.retrieved(), 0);
        assert_eq!(first.token(), Some("c1"));
        assert!(!first.is_exhausted());
        assert_eq!(last.retrieved(), 5);
        assert!(last.is_exhausted());
    }
}
