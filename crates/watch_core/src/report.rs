use std::collections::BTreeMap;
use std::fmt;

use crate::listing::ListingId;
use crate::message::{format_number, format_price};
use crate::SeenStore;

/// Listings sharing location and size; likely the same unit under several ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub location: String,
    pub members: Vec<(ListingId, Option<i64>)>,
}

/// Asking prices of listings with the same room count and a 10 sqm size bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRange {
    pub rooms: String,
    /// Lower bound of the bucket; it spans `size_from..size_from + 10`.
    pub size_from: i64,
    pub count: usize,
    pub min: i64,
    pub max: i64,
    pub average: i64,
}

/// Data-quality overview of a persisted store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReport {
    pub total: usize,
    pub with_phone: usize,
    pub private: usize,
    pub delivery_failed: usize,
    pub by_neighborhood: BTreeMap<String, usize>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub price_ranges: Vec<PriceRange>,
}

type GroupKey = (String, String, String, String, String, String);

/// Rooms in tenths, so half rooms order correctly, then the bucket floor.
type RangeKey = (i64, i64);

impl StoreReport {
    pub fn build(store: &SeenStore) -> Self {
        let mut report = Self {
            total: store.len(),
            ..Self::default()
        };
        let mut groups: BTreeMap<GroupKey, Vec<(ListingId, Option<i64>)>> = BTreeMap::new();
        let mut ranges: BTreeMap<RangeKey, (f64, Vec<i64>)> = BTreeMap::new();

        for listing in store.iter() {
            if listing.phone_digits().is_some() {
                report.with_phone += 1;
            }
            if listing.is_private {
                report.private += 1;
            }
            if listing.delivery_failed {
                report.delivery_failed += 1;
            }
            let neighborhood = listing
                .neighborhood_name
                .clone()
                .or_else(|| listing.neighborhood.clone())
                .unwrap_or_else(|| "unknown".to_string());
            *report.by_neighborhood.entry(neighborhood.clone()).or_default() += 1;

            if let (Some(rooms), Some(sqm), Some(price)) =
                (listing.rooms, listing.size_sqm, listing.price)
            {
                if rooms > 0.0 && sqm > 0.0 && price > 0 {
                    let key = ((rooms * 10.0).round() as i64, (sqm / 10.0).floor() as i64 * 10);
                    ranges.entry(key).or_insert((rooms, Vec::new())).1.push(price);
                }
            }

            let Some(street) = listing.street.clone() else {
                continue;
            };
            let key = (
                listing.city.clone().unwrap_or_default(),
                neighborhood,
                street,
                listing.floor.clone().unwrap_or_default(),
                listing.rooms.map(|r| r.to_string()).unwrap_or_default(),
                listing.size_sqm.map(|s| s.to_string()).unwrap_or_default(),
            );
            groups
                .entry(key)
                .or_default()
                .push((listing.id.clone(), listing.price));
        }

        report.duplicate_groups = groups
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|((city, neighborhood, street, floor, rooms, size), members)| {
                let place = if city.is_empty() {
                    format!("{neighborhood}, {street}")
                } else {
                    format!("{city}, {neighborhood}, {street}")
                };
                DuplicateGroup {
                    location: format!("{place}, floor {floor}, {rooms} rooms, {size} sqm"),
                    members,
                }
            })
            .collect();

        report.price_ranges = ranges
            .into_iter()
            .map(|((_, size_from), (rooms, prices))| price_range(rooms, size_from, &prices))
            .collect();
        report
    }

    pub fn without_phone(&self) -> usize {
        self.total - self.with_phone
    }
}

fn price_range(rooms: f64, size_from: i64, prices: &[i64]) -> PriceRange {
    let total: i128 = prices.iter().map(|&p| i128::from(p)).sum();
    let count = prices.len();
    let average = (total + count as i128 / 2) / count as i128;
    PriceRange {
        rooms: format_number(rooms),
        size_from,
        count,
        min: prices.iter().copied().min().unwrap_or_default(),
        max: prices.iter().copied().max().unwrap_or_default(),
        average: average as i64,
    }
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Listings: {}", self.total)?;
        writeln!(
            f,
            "With phone: {} | without phone: {}",
            self.with_phone,
            self.without_phone()
        )?;
        writeln!(
            f,
            "Private: {} | agency: {}",
            self.private,
            self.total - self.private
        )?;
        writeln!(f, "Undelivered notifications: {}", self.delivery_failed)?;
        writeln!(f, "By neighborhood:")?;
        let mut ranked: Vec<_> = self.by_neighborhood.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, count) in ranked {
            writeln!(f, "  {name}: {count}")?;
        }
        writeln!(f, "Duplicate groups: {}", self.duplicate_groups.len())?;
        for group in &self.duplicate_groups {
            writeln!(f, "  {} ({} listings)", group.location, group.members.len())?;
            for (id, price) in &group.members {
                let price = price.map(format_price).unwrap_or_else(|| "?".to_string());
                writeln!(f, "    {id}: {price}")?;
            }
        }
        writeln!(f, "Price ranges by rooms and size:")?;
        for range in &self.price_ranges {
            writeln!(
                f,
                "  {} rooms, {}-{} sqm: {} - {} (avg {}, {} listings)",
                range.rooms,
                range.size_from,
                range.size_from + 10,
                format_price(range.min),
                format_price(range.max),
                format_price(range.average),
                range.count
            )?;
        }
        Ok(())
    }
}
