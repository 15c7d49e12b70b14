//! One load → fetch → classify → notify → save pass.
use chrono::{DateTime, Utc};
use thiserror::Error;
use watch_core::{
    intake, reconcile, Criteria, MessageFormatter, NeighborhoodDirectory, Normalizer,
    RepostPolicy, RunSummary,
};
use watch_logging::{watch_debug, watch_info, watch_warn};

use crate::contacts::ContactEnricher;
use crate::fetch::{collect_feed, FeedQuery, FeedSource};
use crate::notifier::{DeliveryOutcome, Notifier};
use crate::state::{SnapshotStore, StoreError};
use crate::{FetchError, Transport};

/// Failures that abort a cycle. Per-listing problems never show up here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("state: {0}")]
    State(#[from] StoreError),
    #[error("every feed query failed, last error: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Record listings without delivering any notification.
    pub seed: bool,
}

/// Everything a cycle reads but never mutates.
pub struct WatchCycle<'a> {
    pub directory: &'a NeighborhoodDirectory,
    pub criteria: &'a Criteria,
    pub policy: &'a RepostPolicy,
    pub formatter: &'a MessageFormatter,
    pub feed: &'a dyn FeedSource,
    pub transport: &'a dyn Transport,
}

impl WatchCycle<'_> {
    pub fn queries(&self) -> Vec<FeedQuery> {
        self.criteria
            .profiles()
            .iter()
            .map(FeedQuery::for_profile)
            .collect()
    }

    /// Runs one pass and returns its counts.
    ///
    /// State is loaded before anything is fetched, so an unreadable snapshot
    /// aborts the run without touching the network or the file. Failed
    /// deliveries are recorded on the entry and the store is saved anyway.
    pub async fn run(
        &self,
        state: &mut dyn SnapshotStore,
        mut contacts: Option<&mut ContactEnricher>,
        options: RunOptions,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, RunError> {
        let store = state.load(self.directory)?;

        let mut records = collect_feed(self.feed, &self.queries()).await?;
        watch_info!("Fetched {} raw records", records.len());
        if let Some(enricher) = contacts.as_deref_mut() {
            enricher.enrich(&mut records).await;
        }

        let batch = intake(&records, &Normalizer::new(self.directory), self.criteria);
        for (index, reason) in &batch.malformed {
            watch_warn!("Skipping malformed record #{}: {}", index, reason);
        }
        let mut summary = RunSummary::from_intake(&batch);

        let result = reconcile(batch.listings, store, now, self.policy);
        summary.count_events(&result.events);
        let mut store = result.store;

        let notifier = Notifier::new(self.formatter, self.transport);
        for event in &result.events {
            if options.seed {
                if event.is_notable() {
                    summary.suppressed += 1;
                }
                continue;
            }
            match notifier.deliver(event).await {
                DeliveryOutcome::Delivered => {
                    store.record_delivery(event.listing_id(), true);
                    summary.delivered += 1;
                }
                DeliveryOutcome::Failed(_) => {
                    store.record_delivery(event.listing_id(), false);
                    summary.failed += 1;
                }
                DeliveryOutcome::Suppressed => {}
            }
        }

        state.save(&store)?;
        watch_debug!("State saved with {} listings", store.len());

        if let Some(enricher) = contacts {
            if let Err(err) = enricher.save_cache() {
                watch_warn!("Could not save phone cache: {}", err);
            }
        }

        watch_info!("Run summary: {}", summary);
        Ok(summary)
    }
}
