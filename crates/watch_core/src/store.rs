use std::collections::btree_map::{self, BTreeMap};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::listing::{token_from_item_url, Listing, ListingId};
use crate::NeighborhoodDirectory;

/// Everything seen so far, keyed by identity key.
///
/// Serializes as a flat JSON object of `id -> record`; the record itself does
/// not repeat the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SeenStore {
    entries: BTreeMap<ListingId, Listing>,
}

/// What [`SeenStore::from_document`] had to rewrite on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries stored under an item URL and re-keyed to the bare token.
    pub rekeyed: usize,
    /// Legacy entries whose key collided with an already loaded id.
    pub collisions: usize,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.rekeyed == 0 && self.collisions == 0
    }
}

impl SeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Listing> {
        self.entries.get(id)
    }

    /// In-memory insert or replace; persisting is a separate batched step.
    pub fn upsert(&mut self, listing: Listing) {
        self.entries.insert(listing.id.clone(), listing);
    }

    /// Entries in identity-key order.
    pub fn iter(&self) -> btree_map::Values<'_, ListingId, Listing> {
        self.entries.values()
    }

    /// Marks the outcome of the notification sent for `id`. Unknown ids are ignored.
    pub fn record_delivery(&mut self, id: &str, delivered: bool) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.delivery_failed = !delivered;
        }
    }

    /// Rebuilds a store from a parsed snapshot document.
    ///
    /// Accepts both the current layout and the legacy one, where keys are item
    /// URLs, sizes live under `sqm`, phones under `phone`, `floor` may be a
    /// number and `neighborhood` holds display text. Entries are never dropped
    /// except when two legacy keys collapse onto the same token.
    pub fn from_document(
        document: Value,
        directory: &NeighborhoodDirectory,
    ) -> Result<(Self, MigrationReport), serde_json::Error> {
        let Value::Object(records) = document else {
            return Err(serde::de::Error::custom("snapshot root must be an object"));
        };

        let mut store = Self::new();
        let mut report = MigrationReport::default();
        for (key, mut record) in records {
            let legacy_token = token_from_item_url(&key);
            let is_legacy = legacy_token.is_some();
            if let Value::Object(fields) = &mut record {
                stringify_scalar(fields, "floor");
            }

            let mut listing: Listing = serde_json::from_value(record)?;
            listing.id = legacy_token.unwrap_or(key);

            if is_legacy {
                report.rekeyed += 1;
                let display = listing.neighborhood.take();
                listing.neighborhood = directory.identify(None, display.as_deref());
                listing.neighborhood_name = listing.neighborhood_name.or(display);
                if listing.last_notified_price.is_none() {
                    listing.last_notified_price = listing.price;
                }
                if store.entries.contains_key(&listing.id) {
                    report.collisions += 1;
                    continue;
                }
            }
            store.upsert(listing);
        }
        Ok((store, report))
    }
}

fn stringify_scalar(fields: &mut Map<String, Value>, key: &str) {
    let text = match fields.get(key) {
        Some(Value::Number(n)) => n.to_string(),
        _ => return,
    };
    fields.insert(key.to_string(), Value::String(text));
}

impl FromIterator<Listing> for SeenStore {
    fn from_iter<I: IntoIterator<Item = Listing>>(iter: I) -> Self {
        let mut store = Self::new();
        for listing in iter {
            store.upsert(listing);
        }
        store
    }
}
