//! Transformation of raw marketplace payloads into the internal result shape.

use crate::taxonomy::TaxonomyIndex;
use crate::types::{
    Activity, ActivityDuration, ActivityImage, ActivityPricing, ActivityRating, ImageVariants,
};
use roamly_provider::ProductSummary;

/// Listings carry at most this many category labels.
const MAX_CATEGORIES: usize = 5;

/// Map one provider product summary to an [`Activity`].
///
/// Image variants are bucketed by height (small ≤ 200, medium ≤ 600, large
/// above), duration is rendered human-readable, and tag ids are back-mapped
/// to category labels through the current taxonomy snapshot.
#[must_use]
pub fn map_product_summary(product: &ProductSummary, taxonomy: &TaxonomyIndex) -> Activity {
    let images = product.images.iter().map(map_image).collect();

    let pricing_summary = product.pricing.as_ref().and_then(|p| p.summary.as_ref());
    let original_price = pricing_summary.and_then(|s| s.from_price_before_discount);
    let pricing = ActivityPricing {
        from_price: pricing_summary.and_then(|s| s.from_price).unwrap_or(0.0),
        currency: product
            .pricing
            .as_ref()
            .and_then(|p| p.currency.clone())
            .unwrap_or_else(|| "EUR".to_string()),
        original_price,
        is_discounted: original_price.is_some(),
    };

    let rating = ActivityRating {
        average: product
            .reviews
            .as_ref()
            .and_then(|r| r.combined_average_rating)
            .unwrap_or(0.0),
        count: product
            .reviews
            .as_ref()
            .and_then(|r| r.total_reviews)
            .unwrap_or(0),
    };

    let minutes = product
        .duration
        .as_ref()
        .and_then(|d| d.fixed_duration_in_minutes)
        .unwrap_or(0);
    let duration = ActivityDuration {
        minutes,
        formatted: format_duration(minutes),
    };

    let primary_destination = product.destinations.first();

    Activity {
        id: product.product_code.clone(),
        title: product.title.clone(),
        description: product.description.clone(),
        images,
        pricing,
        rating,
        duration,
        categories: categories_from_tags(&product.tags, taxonomy),
        flags: product.flags.clone(),
        booking_url: product.product_url.clone().unwrap_or_default(),
        confirmation_type: product
            .confirmation_type
            .clone()
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        destination: primary_destination.and_then(|d| d.name.clone()),
        country: primary_destination.and_then(|d| d.country.clone()),
        availability: "available".to_string(),
    }
}

fn map_image(image: &roamly_provider::ProductImage) -> ActivityImage {
    let mut variants = ImageVariants::default();
    for variant in &image.variants {
        if variant.height <= 200 {
            variants.small = Some(variant.url.clone());
        } else if variant.height <= 600 {
            variants.medium = Some(variant.url.clone());
        } else {
            variants.large = Some(variant.url.clone());
        }
    }

    ActivityImage {
        url: image
            .variants
            .first()
            .map(|v| v.url.clone())
            .unwrap_or_default(),
        is_cover: image.is_cover,
        variants,
    }
}

/// Render a minute count as a short human-readable duration.
///
/// Zero means the provider left the duration open ("Flexible").
fn format_duration(minutes: i64) -> String {
    if minutes == 0 {
        return "Flexible".to_string();
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 && mins > 0 {
        format!("{hours}h {mins}min")
    } else if hours > 0 {
        format!("{hours}h")
    } else {
        format!("{mins}min")
    }
}

/// Back-map provider tag ids to category labels via the taxonomy snapshot.
///
/// Ids missing from the snapshot keep a stable `tag_<id>` placeholder so the
/// information is not lost between syncs; no tags at all maps to "general".
fn categories_from_tags(tags: &[i64], taxonomy: &TaxonomyIndex) -> Vec<String> {
    if tags.is_empty() {
        return vec!["general".to_string()];
    }
    tags.iter()
        .take(MAX_CATEGORIES)
        .map(|&tag_id| {
            taxonomy
                .tag_name(tag_id)
                .unwrap_or_else(|| format!("tag_{tag_id}"))
        })
        .collect()
}
