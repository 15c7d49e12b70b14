//! Listing watch engine: state file, provider fetch, delivery and the run cycle.
mod contacts;
mod cycle;
mod export;
mod fetch;
mod notifier;
mod persist;
mod retry;
mod state;
mod transport;
mod types;

pub use contacts::{
    ContactEnricher, ContactLookup, ContactSettings, PhoneCache, ReqwestContactLookup,
};
pub use cycle::{RunError, RunOptions, WatchCycle};
pub use export::{export_csv, render_csv, ExportError, ExportSummary};
pub use fetch::{collect_feed, FeedPage, FeedQuery, FeedSettings, FeedSource, ReqwestFeedSource};
pub use notifier::{DeliveryOutcome, Notifier};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError, StagedWrite};
pub use retry::RetryPolicy;
pub use state::{JsonStateFile, MemoryStore, SnapshotStore, StoreError};
pub use transport::{DryRunTransport, TelegramTransport, Transport, TransportError};
pub use types::{FailureKind, FetchError};
