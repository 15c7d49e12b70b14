use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Identity key of a listing; the provider's item token.
pub type ListingId = String;

/// One normalized apartment posting.
///
/// The `id` is not part of the persisted record: the snapshot document keys
/// records by id, and the store fills it back in on load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    #[serde(skip)]
    pub id: ListingId,
    pub price: Option<i64>,
    pub rooms: Option<f64>,
    #[serde(alias = "sqm")]
    pub size_sqm: Option<f64>,
    /// Normalized neighborhood identifier, compared exactly by the filter.
    pub neighborhood: Option<String>,
    pub seller_id: Option<String>,
    #[serde(alias = "phone")]
    pub seller_phone: Option<String>,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub last_notified_price: Option<i64>,
    /// Set when the last notification for this entry could not be delivered.
    pub delivery_failed: bool,

    // Display-only attributes, never used for classification.
    pub neighborhood_name: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
    pub floor: Option<String>,
    pub is_private: bool,
}

impl Listing {
    /// Deep link to the posting, built from the identity key.
    pub fn deep_link(&self, item_url_base: &str) -> String {
        format!("{}/{}", item_url_base.trim_end_matches('/'), self.id)
    }

    /// Seller phone reduced to its digits, if any remain.
    pub fn phone_digits(&self) -> Option<String> {
        let digits: String = self
            .seller_phone
            .as_deref()?
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        (!digits.is_empty()).then_some(digits)
    }
}

/// Extracts the item token from a posting URL such as `https://host/item/abc123`.
///
/// Returns `None` for anything that does not parse as an absolute URL with a
/// non-empty final path segment.
pub fn token_from_item_url(raw: &str) -> Option<ListingId> {
    let url = Url::parse(raw.trim()).ok()?;
    let segment = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    Some(segment.to_string())
}
