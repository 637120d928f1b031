//! Golden test vectors for deterministic verification.
//!
//! These vectors pin canonicalization and hashing so that any implementation
//! computing fingerprints for the same records produces identical hex.

use imprint_core::{canonicalize, fingerprint, ContentRecord, Fingerprint};

use crate::fixtures;

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The record to canonicalize.
    pub record: ContentRecord,
    /// Expected canonical string.
    pub expected_canonical: &'static str,
    /// Expected fingerprint (hex).
    pub expected_fingerprint: &'static str,
}

/// SHA-256 of the ASCII bytes `abc`.
pub const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    let mut changed_body = fixtures::hello_world_record();
    changed_body.body = "Different content".to_string();

    vec![
        GoldenVector {
            name: "image post with padded body and unsorted tags",
            record: fixtures::hello_world_record(),
            expected_canonical: r#"{"authorId":"user-42","body":"Hello world!","contentType":"image","timestamp":"2024-01-01T00:00:00.000Z","metadata":{"hasMedia":true,"mediaCount":1,"tags":["ai","blockchain","tech"]},"recordId":"post-1"}"#,
            expected_fingerprint: "8e1a0c374036cdceefd65ef2192d644bb519ab62e46cfb6663bcae0e0fe41d1f",
        },
        GoldenVector {
            name: "same post with a different body",
            record: changed_body,
            expected_canonical: r#"{"authorId":"user-42","body":"Different content","contentType":"image","timestamp":"2024-01-01T00:00:00.000Z","metadata":{"hasMedia":true,"mediaCount":1,"tags":["ai","blockchain","tech"]},"recordId":"post-1"}"#,
            expected_fingerprint: "dae6e0efaca42beed84a9e827079928462df5cf2382cc7a53a05090ba088f9cb",
        },
        GoldenVector {
            name: "text post with escaped characters",
            record: fixtures::text_record(),
            expected_canonical: r#"{"authorId":"user-7","body":"line one\n\tline two \"quoted\"","contentType":"text","timestamp":"2023-06-15T12:30:45.123Z","metadata":{"hasMedia":false,"mediaCount":0,"tags":[]},"recordId":"post-2"}"#,
            expected_fingerprint: "e5c09f9f973a5c13268782d9f6f2071db2dd4eb70def06bf1e6d1baeeb06ef93",
        },
        GoldenVector {
            name: "mixed post with non-ASCII body and repeated tags",
            record: fixtures::mixed_record(),
            expected_canonical: "{\"authorId\":\"user-9\",\"body\":\"caf\u{e9} \u{2615} \\u0001\",\"contentType\":\"mixed\",\"timestamp\":\"2024-02-29T23:59:59.999Z\",\"metadata\":{\"hasMedia\":true,\"mediaCount\":3,\"tags\":[\"Zeta\",\"alpha\",\"alpha\"]},\"recordId\":\"post-3\"}",
            expected_fingerprint: "295878bd03ec8c6fee104d024123143402b2ffdc997c327136f419189aa9e4a8",
        },
    ]
}

/// Check every vector, returning `(name, matches, computed fingerprint hex)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let computed = canonicalize(&v.record)
                .map_err(|e| e.to_string())
                .and_then(|canonical| {
                    let text = canonical.to_canonical_string().map_err(|e| e.to_string())?;
                    let fp = fingerprint(&canonical).map_err(|e| e.to_string())?;
                    Ok((text, fp.to_hex()))
                });
            match computed {
                Ok((text, hex)) => {
                    let matches = text == v.expected_canonical && hex == v.expected_fingerprint;
                    (v.name.to_string(), matches, hex)
                }
                Err(e) => (v.name.to_string(), false, e),
            }
        })
        .collect()
}

/// The fingerprint a vector is expected to produce.
pub fn expected_fingerprint(vector: &GoldenVector) -> Option<Fingerprint> {
    Fingerprint::from_hex(vector.expected_fingerprint).ok()
}
