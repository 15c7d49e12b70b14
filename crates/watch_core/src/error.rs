use thiserror::Error;

/// Why a raw provider record could not become a [`crate::Listing`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("record is not an object")]
    NotAnObject,
    #[error("record has no identity key")]
    MissingIdentity,
    #[error("identity key is unusable: {0:?}")]
    InvalidIdentity(String),
}

/// Startup configuration rejected during validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no search profiles configured")]
    NoProfiles,
    #[error("profile {profile:?}: {field} bounds are inverted ({min} > {max})")]
    InvertedBounds {
        profile: String,
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("profile {profile:?}: {field} must not be negative")]
    NegativeBound { profile: String, field: &'static str },
    #[error("profile {profile:?}: unknown neighborhood {neighborhood:?}")]
    UnknownNeighborhood { profile: String, neighborhood: String },
    #[error("profile {profile:?}: no neighborhoods listed")]
    EmptyNeighborhoods { profile: String },
    #[error("neighborhood id {0:?} is declared twice")]
    DuplicateNeighborhoodId(String),
    #[error("neighborhood name {name:?} maps to both {first:?} and {second:?}")]
    AmbiguousNeighborhoodName {
        name: String,
        first: String,
        second: String,
    },
    #[error("repost policy: {0}")]
    InvalidRepostPolicy(&'static str),
}
