//! Canonical form of a content record.
//!
//! The canonical form is the only input to the fingerprint, so its byte
//! encoding is a cross-implementation contract:
//! - Compact JSON, no insignificant whitespace, UTF-8
//! - Object keys in a fixed order (not alphabetical):
//!   `authorId`, `body`, `contentType`, `timestamp`,
//!   `metadata` { `hasMedia`, `mediaCount`, `tags` }, `recordId`
//! - Body trimmed at both ends, internal whitespace untouched
//! - Tags sorted ascending by byte order, duplicates kept
//! - Timestamp as ISO-8601 UTC with millisecond precision
//!
//! Key order follows struct field declaration order under `serde_json`; do not
//! reorder the fields below.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, ValidationError};
use crate::record::ContentRecord;

/// Media classification derived from a record's references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Mixed,
}

impl ContentType {
    /// Classify from image and video reference counts.
    pub fn classify(images: usize, videos: usize) -> Self {
        match (images > 0, videos > 0) {
            (true, true) => ContentType::Mixed,
            (true, false) => ContentType::Image,
            (false, true) => ContentType::Video,
            (false, false) => ContentType::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The metadata block nested in the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMetadata {
    pub has_media: bool,
    pub media_count: u64,
    pub tags: Vec<String>,
}

/// The deterministic representation of a content record.
///
/// Never persisted; recomputed whenever a fingerprint is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalForm {
    pub author_id: String,
    pub body: String,
    pub content_type: ContentType,
    pub timestamp: String,
    pub metadata: CanonicalMetadata,
    pub record_id: String,
}

impl CanonicalForm {
    /// The canonical string: compact JSON with the fixed key order.
    pub fn to_canonical_string(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// UTF-8 bytes of the canonical string.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.to_canonical_string().map(String::into_bytes)
    }
}

impl fmt::Display for CanonicalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let canonical = self.to_canonical_string().map_err(|_| fmt::Error)?;
        f.write_str(&canonical)
    }
}

/// Canonicalize a content record.
///
/// Fails only when the record id or author id is missing.
pub fn canonicalize(record: &ContentRecord) -> Result<CanonicalForm, ValidationError> {
    if record.id.is_blank() {
        return Err(ValidationError::MissingRecordId);
    }
    if record.author_id.is_blank() {
        return Err(ValidationError::MissingAuthorId);
    }

    let images = record.image_count();
    let videos = record.video_count();

    let mut tags = record.tags.clone();
    tags.sort();

    Ok(CanonicalForm {
        author_id: record.author_id.as_str().to_string(),
        body: record.body.trim().to_string(),
        content_type: ContentType::classify(images, videos),
        timestamp: record
            .created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        metadata: CanonicalMetadata {
            has_media: images + videos > 0,
            media_count: (images + videos) as u64,
            tags,
        },
        record_id: record.id.as_str().to_string(),
    })
}
