use std::collections::BTreeSet;

use serde::Deserialize;

use crate::{ConfigError, Listing, NeighborhoodDirectory};

/// A search profile as written in the configuration file.
///
/// `neighborhoods` may reference ids or any configured name or alias.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileSpec {
    pub name: String,
    pub min_rooms: f64,
    pub max_rooms: f64,
    pub min_sqm: f64,
    pub max_price: i64,
    pub neighborhoods: Vec<String>,
}

/// A validated profile. Every field must hold for a listing to match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchProfile {
    pub name: String,
    pub min_rooms: f64,
    pub max_rooms: f64,
    pub min_sqm: f64,
    pub max_price: i64,
    pub allowed_neighborhoods: BTreeSet<String>,
}

impl SearchProfile {
    fn from_spec(
        spec: &ProfileSpec,
        directory: &NeighborhoodDirectory,
    ) -> Result<Self, ConfigError> {
        let name = spec.name.clone();
        for (field, value) in [
            ("min_rooms", spec.min_rooms),
            ("max_rooms", spec.max_rooms),
            ("min_sqm", spec.min_sqm),
            ("max_price", spec.max_price as f64),
        ] {
            if value < 0.0 || value.is_nan() {
                return Err(ConfigError::NegativeBound { profile: name, field });
            }
        }
        if spec.min_rooms > spec.max_rooms {
            return Err(ConfigError::InvertedBounds {
                profile: name,
                field: "rooms",
                min: spec.min_rooms,
                max: spec.max_rooms,
            });
        }
        if spec.neighborhoods.is_empty() {
            return Err(ConfigError::EmptyNeighborhoods { profile: name });
        }

        let mut allowed_neighborhoods = BTreeSet::new();
        for reference in &spec.neighborhoods {
            let id = directory
                .lookup(reference)
                .ok_or_else(|| ConfigError::UnknownNeighborhood {
                    profile: name.clone(),
                    neighborhood: reference.clone(),
                })?;
            allowed_neighborhoods.insert(id.to_string());
        }

        Ok(Self {
            name,
            min_rooms: spec.min_rooms,
            max_rooms: spec.max_rooms,
            min_sqm: spec.min_sqm,
            max_price: spec.max_price,
            allowed_neighborhoods,
        })
    }

    /// Absent numeric attributes never match.
    pub fn matches(&self, listing: &Listing) -> bool {
        let rooms_ok = listing
            .rooms
            .is_some_and(|rooms| rooms >= self.min_rooms && rooms <= self.max_rooms);
        let size_ok = listing.size_sqm.is_some_and(|sqm| sqm >= self.min_sqm);
        let price_ok = listing.price.is_some_and(|price| price <= self.max_price);
        let neighborhood_ok = listing
            .neighborhood
            .as_ref()
            .is_some_and(|n| self.allowed_neighborhoods.contains(n));
        rooms_ok && size_ok && price_ok && neighborhood_ok
    }
}

/// Ordered set of profiles; a listing passes when any one profile matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    profiles: Vec<SearchProfile>,
}

impl Criteria {
    pub fn new(
        specs: &[ProfileSpec],
        directory: &NeighborhoodDirectory,
    ) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::NoProfiles);
        }
        let profiles = specs
            .iter()
            .map(|spec| SearchProfile::from_spec(spec, directory))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { profiles })
    }

    pub fn profiles(&self) -> &[SearchProfile] {
        &self.profiles
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.first_match(listing).is_some()
    }

    pub fn first_match(&self, listing: &Listing) -> Option<&SearchProfile> {
        self.profiles.iter().find(|profile| profile.matches(listing))
    }
}
