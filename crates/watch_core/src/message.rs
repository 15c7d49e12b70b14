use std::fmt::Write;

use crate::{ChangeEvent, Listing};

pub const CURRENCY_SYMBOL: &str = "₪";

/// Renders change events as plain notification text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormatter {
    item_url_base: String,
}

impl MessageFormatter {
    pub fn new(item_url_base: impl Into<String>) -> Self {
        Self {
            item_url_base: item_url_base.into(),
        }
    }

    /// `None` for events that are not delivered.
    pub fn format(&self, event: &ChangeEvent) -> Option<String> {
        let mut text = String::new();
        match event {
            ChangeEvent::New(listing) => {
                text.push_str("🔔 New apartment\n");
                self.push_details(&mut text, listing);
                push_line(&mut text, "Price", &price_or_unknown(listing.price));
                text.push_str(seller_kind(listing));
                text.push('\n');
                self.push_contact_and_link(&mut text, listing);
            }
            ChangeEvent::PriceChanged {
                listing,
                old_price,
                new_price,
            } => {
                text.push_str("💸 Price change\n");
                self.push_details(&mut text, listing);
                push_line(&mut text, "Old price", &format_price(*old_price));
                push_line(&mut text, "New price", &format_price(*new_price));
                push_line(
                    &mut text,
                    "Change",
                    &format_delta(new_price.saturating_sub(*old_price)),
                );
                self.push_contact_and_link(&mut text, listing);
            }
            ChangeEvent::PossibleRepost { listing, prior } => {
                text.push_str("🔁 Possible repost by the same seller\n");
                self.push_details(&mut text, listing);
                push_line(&mut text, "Previous price", &price_or_unknown(prior.price));
                push_line(&mut text, "Price", &price_or_unknown(listing.price));
                if let Some(phone) = &listing.seller_phone {
                    push_line(&mut text, "Phone", phone);
                }
                push_line(&mut text, "New link", &listing.deep_link(&self.item_url_base));
                push_line(&mut text, "Previous link", &prior.deep_link(&self.item_url_base));
            }
            ChangeEvent::Unchanged(_) => return None,
        }
        Some(text.trim_end().to_string())
    }

    fn push_details(&self, text: &mut String, listing: &Listing) {
        let place: Vec<&str> = [&listing.city, &listing.neighborhood_name, &listing.street]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect();
        if !place.is_empty() {
            text.push_str(&place.join(", "));
            text.push('\n');
        }

        let mut facts = Vec::new();
        if let Some(rooms) = listing.rooms {
            facts.push(format!("{} rooms", format_number(rooms)));
        }
        if let Some(sqm) = listing.size_sqm {
            facts.push(format!("{} sqm", format_number(sqm)));
        }
        if let Some(floor) = &listing.floor {
            facts.push(format!("floor {floor}"));
        }
        if !facts.is_empty() {
            text.push_str(&facts.join(" | "));
            text.push('\n');
        }
    }

    fn push_contact_and_link(&self, text: &mut String, listing: &Listing) {
        if let Some(phone) = &listing.seller_phone {
            push_line(text, "Phone", phone);
        }
        text.push_str(&listing.deep_link(&self.item_url_base));
    }
}

fn push_line(text: &mut String, label: &str, value: &str) {
    let _ = writeln!(text, "{label}: {value}");
}

fn seller_kind(listing: &Listing) -> &'static str {
    if listing.is_private {
        "(private seller)"
    } else {
        "(agency)"
    }
}

fn price_or_unknown(price: Option<i64>) -> String {
    price.map(format_price).unwrap_or_else(|| "not listed".to_string())
}

/// `2350000` becomes `2,350,000 ₪`.
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} {CURRENCY_SYMBOL}")
}

fn format_delta(delta: i64) -> String {
    if delta > 0 {
        format!("+{}", format_price(delta))
    } else {
        format_price(delta)
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_are_grouped_by_thousands() {
        assert_eq!(format_price(2_350_000), "2,350,000 ₪");
        assert_eq!(format_price(950), "950 ₪");
        assert_eq!(format_price(-50_000), "-50,000 ₪");
        assert_eq!(format_price(0), "0 ₪");
        assert_eq!(format_delta(25_000), "+25,000 ₪");
    }

    #[test]
    fn half_rooms_keep_their_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.5), "3.5");
    }
}
