use std::path::PathBuf;

use thiserror::Error;
use watch_core::{Listing, SeenStore};

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    Buffer(String),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

const HEADER: [&str; 12] = [
    "url",
    "price",
    "rooms",
    "size_sqm",
    "street",
    "neighborhood",
    "city",
    "floor",
    "phone",
    "type",
    "first_seen_at",
    "last_seen_at",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub output_path: PathBuf,
}

fn text<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn row(listing: &Listing, item_url_base: &str) -> [String; 12] {
    [
        listing.deep_link(item_url_base),
        text(listing.price),
        text(listing.rooms),
        text(listing.size_sqm),
        text(listing.street.as_deref()),
        text(listing.neighborhood_name.as_deref().or(listing.neighborhood.as_deref())),
        text(listing.city.as_deref()),
        text(listing.floor.as_deref()),
        text(listing.seller_phone.as_deref()),
        if listing.is_private { "private" } else { "agency" }.to_string(),
        text(listing.first_seen_at.map(|t| t.to_rfc3339())),
        text(listing.last_seen_at.map(|t| t.to_rfc3339())),
    ]
}

/// Store contents as CSV, most expensive first; listings without a price last.
pub fn render_csv(store: &SeenStore, item_url_base: &str) -> Result<Vec<u8>, ExportError> {
    let mut listings: Vec<&Listing> = store.iter().collect();
    listings.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.id.cmp(&b.id)));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for listing in listings {
        writer.write_record(row(listing, item_url_base))?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.to_string()))
}

/// Writes [`render_csv`] output atomically to `output_path`.
pub fn export_csv(
    store: &SeenStore,
    item_url_base: &str,
    output_path: PathBuf,
) -> Result<ExportSummary, ExportError> {
    let bytes = render_csv(store, item_url_base)?;
    AtomicFileWriter::new(output_path.clone()).write(&bytes)?;
    Ok(ExportSummary {
        rows: store.len(),
        output_path,
    })
}
