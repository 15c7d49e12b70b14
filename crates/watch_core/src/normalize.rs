use serde_json::Value;

use crate::listing::{token_from_item_url, Listing, ListingId};
use crate::{Malformed, NeighborhoodDirectory};

// JSON pointers into the provider's feed record. The shape is controlled by
// the provider, so every lookup tolerates absence.
const TOKEN_PATHS: &[&str] = &["/token", "/id"];
const LINK_PATHS: &[&str] = &["/link", "/url"];
const PRICE_PATHS: &[&str] = &["/price"];
const ROOMS_PATHS: &[&str] = &["/additionalDetails/roomsCount", "/rooms"];
const SIZE_PATHS: &[&str] = &["/additionalDetails/squareMeter", "/squareMeter"];
const NEIGHBORHOOD_ID_PATHS: &[&str] = &["/address/neighborhood/id"];
const NEIGHBORHOOD_NAME_PATHS: &[&str] = &["/address/neighborhood/text", "/neighborhood"];
const CITY_PATHS: &[&str] = &["/address/city/text", "/city"];
const STREET_PATHS: &[&str] = &["/address/street/text", "/street"];
const FLOOR_PATHS: &[&str] = &["/address/house/floor", "/floor"];
const SELLER_ID_PATHS: &[&str] = &["/customer/customerId", "/customer/id", "/customerId"];
const PHONE_PATHS: &[&str] = &[
    "/contactPhone",
    "/customer/brokerPhone",
    "/customer/phone",
    "/phone",
];

/// Key under which contact enrichment stores a looked-up phone.
pub const CONTACT_PHONE_FIELD: &str = "contactPhone";

/// Converts raw provider records into canonical listings.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    directory: &'a NeighborhoodDirectory,
}

impl<'a> Normalizer<'a> {
    pub fn new(directory: &'a NeighborhoodDirectory) -> Self {
        Self { directory }
    }

    /// Builds a [`Listing`] from one record. Only a missing or unusable identity
    /// key rejects the record; every other field degrades to absent.
    pub fn normalize(&self, raw: &Value) -> Result<Listing, Malformed> {
        if !raw.is_object() {
            return Err(Malformed::NotAnObject);
        }
        let id = identity(raw)?;

        let neighborhood_id = first_text(raw, NEIGHBORHOOD_ID_PATHS);
        let neighborhood_name = first_text(raw, NEIGHBORHOOD_NAME_PATHS);
        let neighborhood = self
            .directory
            .identify(neighborhood_id.as_deref(), neighborhood_name.as_deref());

        Ok(Listing {
            id,
            price: first(raw, PRICE_PATHS, coerce_i64),
            rooms: first(raw, ROOMS_PATHS, coerce_f64),
            size_sqm: first(raw, SIZE_PATHS, coerce_f64),
            neighborhood,
            seller_id: first_text(raw, SELLER_ID_PATHS),
            seller_phone: first_text(raw, PHONE_PATHS),
            neighborhood_name,
            city: first_text(raw, CITY_PATHS),
            street: first_text(raw, STREET_PATHS),
            floor: first_text(raw, FLOOR_PATHS),
            is_private: raw.get("adType").and_then(Value::as_str) == Some("private"),
            ..Listing::default()
        })
    }
}

fn identity(raw: &Value) -> Result<ListingId, Malformed> {
    if let Some(token) = first_text(raw, TOKEN_PATHS) {
        return validate_identity(token);
    }
    if let Some(link) = first_text(raw, LINK_PATHS) {
        return token_from_item_url(&link)
            .ok_or(Malformed::InvalidIdentity(link))
            .and_then(validate_identity);
    }
    Err(Malformed::MissingIdentity)
}

fn validate_identity(token: String) -> Result<ListingId, Malformed> {
    let usable = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if usable {
        Ok(token)
    } else {
        Err(Malformed::InvalidIdentity(token))
    }
}

fn first<T>(raw: &Value, paths: &[&str], coerce: fn(&Value) -> Option<T>) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| raw.pointer(path))
        .find_map(coerce)
}

fn first_text(raw: &Value, paths: &[&str]) -> Option<String> {
    first(raw, paths, coerce_text)
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whole, non-negative currency units. `"2,350,000 ₪"` and `"2.350.000"` both
/// read as 2350000; a single `.` followed by one or two digits is a decimal point.
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            .filter(|amount| *amount >= 0),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn parse_amount(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.starts_with('-') {
        return None;
    }
    let groups: Vec<String> = text
        .split('.')
        .map(|part| part.chars().filter(char::is_ascii_digit).collect())
        .collect();
    let digits = match groups.as_slice() {
        [whole] => whole.clone(),
        [whole, fraction] if !fraction.is_empty() && fraction.len() <= 2 => whole.clone(),
        [_, rest @ ..] if rest.iter().all(|group| group.len() == 3) => groups.concat(),
        _ => return None,
    };
    digits.parse().ok()
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite()),
        _ => None,
    }
}
