//! Proptest generators for property-based testing.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use imprint_core::ContentRecord;

/// Generate a non-blank identifier.
pub fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,23}".prop_map(String::from)
}

/// Generate a body, including surrounding and internal whitespace.
pub fn body() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ \t\n]{0,3}[a-zA-Z0-9 .,!?\n]{0,120}[ \t\n]{0,3}".prop_map(String::from),
        any::<String>(),
    ]
}

/// Generate a tag list, possibly with repeats.
pub fn tags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z]{1,8}", 0..6)
}

/// Generate a list of media references.
pub fn media_refs(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("https://cdn\\.example/[a-z0-9]{1,12}", 0..=max)
}

/// Generate a creation time with millisecond precision.
pub fn created_at() -> impl Strategy<Value = DateTime<Utc>> {
    // 2001-09-09 .. 2033-05-18
    (1_000_000_000_000i64..2_000_000_000_000i64).prop_map(|ms| {
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    })
}

/// Parameters for generating a content record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub tags: Vec<String>,
    pub image_refs: Vec<String>,
    pub video_refs: Vec<String>,
    pub primary_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            identifier(),
            identifier(),
            body(),
            tags(),
            media_refs(3),
            media_refs(2),
            prop::option::of("https://cdn\\.example/cover/[a-z0-9]{1,8}"),
            created_at(),
        )
            .prop_map(
                |(id, author_id, body, tags, image_refs, video_refs, primary_image, created_at)| {
                    RecordParams {
                        id,
                        author_id,
                        body,
                        tags,
                        image_refs,
                        video_refs,
                        primary_image,
                        created_at,
                    }
                },
            )
            .boxed()
    }
}

/// Build a content record from parameters.
pub fn record_from_params(params: &RecordParams) -> ContentRecord {
    ContentRecord {
        id: params.id.as_str().into(),
        author_id: params.author_id.as_str().into(),
        body: params.body.clone(),
        tags: params.tags.clone(),
        image_refs: params.image_refs.clone(),
        video_refs: params.video_refs.clone(),
        primary_image: params.primary_image.clone(),
        created_at: params.created_at,
    }
}
