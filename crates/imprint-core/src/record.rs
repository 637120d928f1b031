//! The content record projection consumed by the canonicalizer.
//!
//! This is deliberately narrower than whatever the persistence layer stores:
//! only the fields that feed the canonical form are modelled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a content record (a post).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the author of a content record.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub String);

impl AuthorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorId({})", self.0)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AuthorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A user-generated content record, as handed over by the persistence layer.
///
/// Read-only from the point of view of this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: RecordId,
    pub author_id: AuthorId,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_refs: Vec<String>,
    #[serde(default)]
    pub video_refs: Vec<String>,
    /// A single cover image kept apart from `image_refs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Create a text-only record with no tags.
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(id),
            author_id: AuthorId::new(author_id),
            body: body.into(),
            tags: Vec::new(),
            image_refs: Vec::new(),
            video_refs: Vec::new(),
            primary_image: None,
            created_at,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_image(mut self, reference: impl Into<String>) -> Self {
        self.image_refs.push(reference.into());
        self
    }

    pub fn with_video(mut self, reference: impl Into<String>) -> Self {
        self.video_refs.push(reference.into());
        self
    }

    pub fn with_primary_image(mut self, reference: impl Into<String>) -> Self {
        self.primary_image = Some(reference.into());
        self
    }

    /// Number of image references, counting the primary image.
    pub fn image_count(&self) -> usize {
        self.image_refs.len() + usize::from(self.primary_image.is_some())
    }

    pub fn video_count(&self) -> usize {
        self.video_refs.len()
    }
}
