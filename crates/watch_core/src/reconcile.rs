//! Classification of the current fetch against the seen-store.
//!
//! Every listing gets exactly one [`ChangeEvent`]. The store snapshot is taken
//! by value and handed back updated, so the whole step is a pure function of
//! `(listings, store, now, policy)`.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::listing::{Listing, ListingId};
use crate::{ConfigError, SeenStore};

const TOLERANCE_EPSILON: f64 = 1e-9;
const MAX_WINDOW_DAYS: i64 = 3650;

/// Thresholds for treating an unseen id as a re-post of a stored one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepostPolicy {
    /// How recently the stored listing must have been seen.
    pub window_days: i64,
    /// Allowed difference in built area.
    pub size_tolerance_sqm: f64,
    /// Allowed difference in room count.
    pub rooms_tolerance: f64,
}

impl Default for RepostPolicy {
    fn default() -> Self {
        Self {
            window_days: 30,
            size_tolerance_sqm: 3.0,
            rooms_tolerance: 0.0,
        }
    }
}

impl RepostPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(ConfigError::InvalidRepostPolicy(
                "window_days must be between 0 and 3650",
            ));
        }
        if !(self.size_tolerance_sqm >= 0.0) || !(self.rooms_tolerance >= 0.0) {
            return Err(ConfigError::InvalidRepostPolicy(
                "tolerances must be non-negative numbers",
            ));
        }
        Ok(())
    }

    fn recent(&self, candidate: &Listing, now: DateTime<Utc>) -> bool {
        candidate
            .last_seen_at
            .is_some_and(|seen| now - seen <= Duration::days(self.window_days))
    }

    fn near_identical(&self, a: &Listing, b: &Listing) -> bool {
        let close = |x: Option<f64>, y: Option<f64>, tolerance: f64| match (x, y) {
            (Some(x), Some(y)) => (x - y).abs() <= tolerance + TOLERANCE_EPSILON,
            _ => false,
        };
        a.neighborhood.is_some()
            && a.neighborhood == b.neighborhood
            && close(a.rooms, b.rooms, self.rooms_tolerance)
            && close(a.size_sqm, b.size_sqm, self.size_tolerance_sqm)
    }
}

fn same_seller(a: &Listing, b: &Listing) -> bool {
    let same_id = match (a.seller_id.as_deref(), b.seller_id.as_deref()) {
        (Some(x), Some(y)) => !x.is_empty() && x == y,
        _ => false,
    };
    let same_phone = match (a.phone_digits(), b.phone_digits()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    };
    same_id || same_phone
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    New,
    PriceChanged,
    PossibleRepost,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    New(Listing),
    PriceChanged {
        listing: Listing,
        old_price: i64,
        new_price: i64,
    },
    /// An unseen id that looks like `prior` posted again by the same seller.
    PossibleRepost { listing: Listing, prior: Listing },
    Unchanged(ListingId),
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::New(_) => ChangeKind::New,
            ChangeEvent::PriceChanged { .. } => ChangeKind::PriceChanged,
            ChangeEvent::PossibleRepost { .. } => ChangeKind::PossibleRepost,
            ChangeEvent::Unchanged(_) => ChangeKind::Unchanged,
        }
    }

    pub fn listing_id(&self) -> &str {
        match self {
            ChangeEvent::New(listing)
            | ChangeEvent::PriceChanged { listing, .. }
            | ChangeEvent::PossibleRepost { listing, .. } => &listing.id,
            ChangeEvent::Unchanged(id) => id,
        }
    }

    /// Whether this event should be delivered as a notification.
    pub fn is_notable(&self) -> bool {
        self.kind() != ChangeKind::Unchanged
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// One event per distinct input id, in identity-key order.
    pub events: Vec<ChangeEvent>,
    pub store: SeenStore,
}

/// Classifies `current` against `store` and returns the events plus the
/// updated store.
///
/// Input order does not matter: listings are processed by identity key and a
/// repeated id keeps only its first occurrence. Repost candidates are drawn
/// from the store as it was passed in, never from entries added in this pass.
pub fn reconcile(
    current: Vec<Listing>,
    mut store: SeenStore,
    now: DateTime<Utc>,
    policy: &RepostPolicy,
) -> Reconciliation {
    let mut current = current;
    current.sort_by(|a, b| a.id.cmp(&b.id));
    current.dedup_by(|later, earlier| later.id == earlier.id);

    let snapshot = store.clone();
    let mut events = Vec::with_capacity(current.len());
    for listing in current {
        let event = match snapshot.get(&listing.id) {
            None => classify_unseen(listing, &snapshot, &mut store, now, policy),
            Some(prior) => classify_known(listing, prior, &mut store, now),
        };
        events.push(event);
    }

    Reconciliation { events, store }
}

fn classify_unseen(
    mut listing: Listing,
    snapshot: &SeenStore,
    store: &mut SeenStore,
    now: DateTime<Utc>,
    policy: &RepostPolicy,
) -> ChangeEvent {
    listing.first_seen_at = Some(now);
    listing.last_seen_at = Some(now);
    listing.last_notified_price = listing.price;
    listing.delivery_failed = false;

    let repost_of = find_repost(snapshot, &listing, now, policy).cloned();
    store.upsert(listing.clone());
    match repost_of {
        Some(prior) => ChangeEvent::PossibleRepost { listing, prior },
        None => ChangeEvent::New(listing),
    }
}

fn classify_known(
    mut listing: Listing,
    prior: &Listing,
    store: &mut SeenStore,
    now: DateTime<Utc>,
) -> ChangeEvent {
    listing.first_seen_at = prior.first_seen_at;
    listing.last_seen_at = Some(now);

    match (prior.price, listing.price) {
        (Some(old_price), Some(new_price)) if old_price != new_price => {
            listing.last_notified_price = Some(new_price);
            listing.delivery_failed = false;
            store.upsert(listing.clone());
            ChangeEvent::PriceChanged {
                listing,
                old_price,
                new_price,
            }
        }
        _ => {
            // A price that went missing is not a change; keep the last known one.
            listing.price = listing.price.or(prior.price);
            listing.last_notified_price = prior.last_notified_price;
            listing.delivery_failed = prior.delivery_failed;
            let id = listing.id.clone();
            store.upsert(listing);
            ChangeEvent::Unchanged(id)
        }
    }
}

/// The most recently seen stored listing that the heuristic ties to `listing`;
/// ties go to the smallest id.
fn find_repost<'s>(
    snapshot: &'s SeenStore,
    listing: &Listing,
    now: DateTime<Utc>,
    policy: &RepostPolicy,
) -> Option<&'s Listing> {
    snapshot
        .iter()
        .filter(|candidate| candidate.id != listing.id)
        .filter(|candidate| policy.recent(candidate, now))
        .filter(|candidate| same_seller(candidate, listing))
        .filter(|candidate| policy.near_identical(candidate, listing))
        .max_by(|a, b| {
            a.last_seen_at
                .cmp(&b.last_seen_at)
                .then_with(|| b.id.cmp(&a.id))
        })
}
