//! Listing watch core: normalization, filtering and change classification.
//!
//! Nothing in this crate performs I/O or reads the clock.
mod criteria;
mod error;
mod intake;
mod listing;
mod message;
mod neighborhood;
mod normalize;
mod reconcile;
mod report;
mod store;
mod summary;

pub use criteria::{Criteria, ProfileSpec, SearchProfile};
pub use error::{ConfigError, Malformed};
pub use intake::{intake, Intake};
pub use listing::{token_from_item_url, Listing, ListingId};
pub use message::{format_price, MessageFormatter, CURRENCY_SYMBOL};
pub use neighborhood::{normalize_name, NeighborhoodDirectory, NeighborhoodEntry};
pub use normalize::{Normalizer, CONTACT_PHONE_FIELD};
pub use reconcile::{reconcile, ChangeEvent, ChangeKind, Reconciliation, RepostPolicy};
pub use report::{DuplicateGroup, PriceRange, StoreReport};
pub use store::{MigrationReport, SeenStore};
pub use summary::RunSummary;
