use std::collections::BTreeSet;

use serde_json::Value;

use crate::{Criteria, Listing, Malformed, Normalizer};

/// Normalized and filtered view of one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intake {
    /// Listings that matched at least one profile, first occurrence per id.
    pub listings: Vec<Listing>,
    /// Position in the input and reason for every rejected record.
    pub malformed: Vec<(usize, Malformed)>,
    pub received: usize,
    pub duplicates: usize,
    pub filtered_out: usize,
}

/// Runs normalizer and criteria filter over raw records.
///
/// A malformed record is skipped and counted; it never aborts the batch.
/// The same id showing up twice (e.g. returned by two profile queries) is
/// kept once.
pub fn intake(records: &[Value], normalizer: &Normalizer<'_>, criteria: &Criteria) -> Intake {
    let mut out = Intake {
        received: records.len(),
        ..Intake::default()
    };
    let mut seen = BTreeSet::new();
    for (index, record) in records.iter().enumerate() {
        let listing = match normalizer.normalize(record) {
            Ok(listing) => listing,
            Err(reason) => {
                out.malformed.push((index, reason));
                continue;
            }
        };
        if !seen.insert(listing.id.clone()) {
            out.duplicates += 1;
            continue;
        }
        if criteria.matches(&listing) {
            out.listings.push(listing);
        } else {
            out.filtered_out += 1;
        }
    }
    out
}
