//! Deterministic cache keys for normalized search requests.
//!
//! The key is an explicit canonical serialization — not a reflection over
//! request fields — so exactly which fields vary the key is visible here and
//! testable in isolation. Two requests that differ only in filter ordering or
//! incidental whitespace collide; any semantic difference does not.

use sha2::{Digest, Sha256};

use crate::types::SearchRequest;

/// Build the cache key for a resolved request.
///
/// The key is prefixed with the destination id so admin invalidation can
/// target a destination with a prefix delete; the remainder is a SHA-256
/// digest over the canonical request string.
#[must_use]
pub fn cache_key(destination_id: &str, request: &SearchRequest) -> String {
    let canonical = canonical_string(destination_id, request);
    let digest = format!("{:x}", Sha256::digest(canonical.as_bytes()));
    format!("{destination_id}:{digest}")
}

/// Canonical, order-independent serialization of the semantic request fields.
fn canonical_string(destination_id: &str, request: &SearchRequest) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("dest={destination_id}"));
    parts.push(format!("start={}", request.dates.start));
    parts.push(format!(
        "end={}",
        request.dates.end.map_or_else(|| "none".to_string(), |d| d.to_string())
    ));

    let mut categories: Vec<String> = request
        .filters
        .categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    parts.push(format!("categories={}", categories.join(",")));

    let price = request.filters.price_range.as_ref().map_or_else(
        || "none".to_string(),
        |r| format!("{}..{}", fmt_opt_f64(r.min), fmt_opt_f64(r.max)),
    );
    parts.push(format!("price={price}"));

    parts.push(format!(
        "rating={}",
        fmt_opt_f64(request.filters.rating_min)
    ));

    let duration = request.filters.duration_minutes.as_ref().map_or_else(
        || "none".to_string(),
        |r| {
            format!(
                "{}..{}",
                r.min.map_or_else(|| "*".to_string(), |v| v.to_string()),
                r.max.map_or_else(|| "*".to_string(), |v| v.to_string())
            )
        },
    );
    parts.push(format!("duration={duration}"));

    let mut flags: Vec<String> = request
        .filters
        .flags
        .iter()
        .map(|f| f.trim().to_uppercase())
        .filter(|f| !f.is_empty())
        .collect();
    flags.sort();
    flags.dedup();
    parts.push(format!("flags={}", flags.join(",")));

    parts.push(format!("sort={}", request.sorting.sort_by.as_str()));
    parts.push(format!("order={}", request.sorting.order.as_str()));
    parts.push(format!("page={}", request.pagination.page));
    parts.push(format!("limit={}", request.pagination.limit));
    parts.push(format!("currency={}", request.currency));
    parts.push(format!("language={}", request.language));

    parts.join("|")
}

fn fmt_opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "*".to_string(), |v| format!("{v}"))
}
