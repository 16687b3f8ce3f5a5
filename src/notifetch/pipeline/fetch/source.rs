use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notifetch::pipeline::error::{Result, ToolError};

/// Identifier of a page or database on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Accepts a bare identifier (with or without hyphens) or a share URL.
    ///
    /// For URLs the last path segment is used with any query string or
    /// fragment removed; page slugs such as `Roadmap-0123...` keep only the
    /// trailing 32 hex digits.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || ToolError::InvalidSourceId(input.to_string());

        let mut candidate = input.trim();
        if candidate.contains("notion.so") || candidate.contains("notion.site") {
            candidate = candidate
                .split(['?', '#'])
                .next()
                .unwrap_or(candidate)
                .trim_end_matches('/');
            candidate = candidate.rsplit('/').next().unwrap_or(candidate);
        }

        let compact: Vec<char> = candidate.chars().filter(|ch| *ch != '-').collect();
        if compact.len() < 32 {
            return Err(invalid());
        }
        let tail: String = compact[compact.len() - 32..].iter().collect();
        let uuid = Uuid::try_parse(&tail).map_err(|_| invalid())?;
        Ok(Self(uuid))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// What a source identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Rows are fetched through the database query endpoint.
    Database,
    /// Top-level content blocks are fetched through the block-children
    /// endpoint.
    Page,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Database => write!(f, "database"),
            SourceKind::Page => write!(f, "page"),
        }
    }
}
