//! Content-type matching.
//!
//! Pure functions used during session setup:
//!
//! - [`pick_transmit_content_type`] picks the single format one side should
//!   send to the other.
//! - [`compare_store_candidate`] ranks remote stores when the router binds a
//!   local store automatically.
//!
//! Neither function fails. "No compatible type" is an ordinary `None`.

use std::cmp::Ordering;

use crate::ctype::ContentTypeInfo;
use crate::store::Store;

/// Similarity below which two URIs count as unrelated.
pub const URI_SIMILARITY_CUTOFF: f64 = 0.6;

/// The format chosen for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeChoice {
    pub ctype: String,
    /// `None` only when the source lists the type without any version.
    pub version: Option<String>,
}

impl ContentTypeChoice {
    fn new(ctype: &str, version: Option<&str>) -> Self {
        Self {
            ctype: ctype.to_string(),
            version: version.map(str::to_string),
        }
    }
}

/// One attempt of the priority list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tier {
    /// Only transmit-capable source entries against receive-capable targets.
    directional: bool,
    /// Require a version both sides list.
    check_version: bool,
    /// Number of sides that flagged the type as preferred.
    score: u8,
}

const fn tier(directional: bool, check_version: bool, score: u8) -> Tier {
    Tier {
        directional,
        check_version,
        score,
    }
}

/// Attempts in strict priority order. The first non-empty result wins, so
/// the order must not change.
const TIERS: [Tier; 12] = [
    tier(true, true, 2),
    tier(true, true, 1),
    tier(true, true, 0),
    tier(true, false, 2),
    tier(true, false, 1),
    tier(true, false, 0),
    tier(false, true, 2),
    tier(false, true, 1),
    tier(false, true, 0),
    tier(false, false, 2),
    tier(false, false, 1),
    tier(false, false, 0),
];

/// Select the best `(type, version)` for `source` to send to `target`.
pub fn pick_transmit_content_type(
    source: &[ContentTypeInfo],
    target: &[ContentTypeInfo],
) -> Option<ContentTypeChoice> {
    TIERS.iter().find_map(|tier| try_tier(source, target, *tier))
}

fn try_tier(
    source: &[ContentTypeInfo],
    target: &[ContentTypeInfo],
    tier: Tier,
) -> Option<ContentTypeChoice> {
    for sct in source.iter().filter(|c| !tier.directional || c.transmit) {
        for tct in target.iter().filter(|c| !tier.directional || c.receive) {
            if sct.ctype != tct.ctype {
                continue;
            }
            if u8::from(sct.preferred) + u8::from(tct.preferred) != tier.score {
                continue;
            }
            if !tier.check_version {
                return Some(ContentTypeChoice::new(&sct.ctype, sct.preferred_version()));
            }
            // walk the source's versions from most to least preferred
            if let Some(version) = sct.versions.iter().rev().find(|v| tct.versions.contains(v)) {
                return Some(ContentTypeChoice::new(&sct.ctype, Some(version)));
            }
        }
    }
    None
}

/// Rank two candidate stores for binding to `reference`.
///
/// Returns [`Ordering::Less`] when `a` is the better candidate,
/// [`Ordering::Greater`] when `b` is, and [`Ordering::Equal`] when nothing
/// separates them (callers then fall back to declaration order). Criteria,
/// in order: compatibility count over preferred types only, compatibility
/// count over all types, URI similarity.
pub fn compare_store_candidate(reference: &Store, a: &Store, b: &Store) -> Ordering {
    let preferred = |store: &Store| -> Vec<ContentTypeInfo> {
        store
            .content_types
            .iter()
            .filter(|c| c.preferred)
            .cloned()
            .collect()
    };
    let ref_preferred = preferred(reference);

    let a_count = compatibility_count(&ref_preferred, &preferred(a));
    let b_count = compatibility_count(&ref_preferred, &preferred(b));
    if a_count != b_count {
        return b_count.cmp(&a_count);
    }

    let a_count = compatibility_count(&reference.content_types, &a.content_types);
    let b_count = compatibility_count(&reference.content_types, &b.content_types);
    if a_count != b_count {
        return b_count.cmp(&a_count);
    }

    let a_sim = close_similarity(&reference.uri, &a.uri);
    let b_sim = close_similarity(&reference.uri, &b.uri);
    b_sim.total_cmp(&a_sim)
}

/// Pick the best candidate for `reference`, first-declared on ties.
pub fn best_store_candidate<'a>(reference: &Store, candidates: &'a [Store]) -> Option<&'a Store> {
    candidates
        .iter()
        .min_by(|a, b| compare_store_candidate(reference, a, b))
}

/// Number of compatible pairings in both directions.
pub fn compatibility_count(reference: &[ContentTypeInfo], candidate: &[ContentTypeInfo]) -> usize {
    let mut count = 0;
    for rct in reference {
        for cct in candidate.iter().filter(|c| c.ctype == rct.ctype) {
            if rct.transmit && cct.receive {
                count += 1;
            }
            if rct.receive && cct.transmit {
                count += 1;
            }
        }
    }
    count
}

/// True when the two catalogs share at least one usable type in either direction.
pub fn is_compatible(a: &[ContentTypeInfo], b: &[ContentTypeInfo]) -> bool {
    pick_transmit_content_type(a, b).is_some() || pick_transmit_content_type(b, a).is_some()
}

/// Similarity ratio in `[0, 1]`, clamped to zero below the cutoff.
fn close_similarity(a: &str, b: &str) -> f64 {
    let ratio = similarity(a, b);
    if ratio < URI_SIMILARITY_CUTOFF {
        0.0
    } else {
        ratio
    }
}

/// `2 * lcs / (len(a) + len(b))`, case-insensitive.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let lcs = prev[b.len()];
    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}
