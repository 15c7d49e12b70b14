use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use url::Url;
use watch_core::CONTACT_PHONE_FIELD;
use watch_logging::{watch_debug, watch_info, watch_warn};

use crate::fetch::{build_client, get_json};
use crate::persist::{AtomicFileWriter, PersistError};
use crate::retry::{with_retries, RetryPolicy};
use crate::{FailureKind, FetchError};

const TOKEN_PLACEHOLDER: &str = "{token}";

/// Looks up the seller phone of one posting.
#[async_trait::async_trait]
pub trait ContactLookup: Send + Sync {
    /// `Ok(None)` when the provider has no phone for the posting.
    async fn phone(&self, token: &str) -> Result<Option<String>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ContactSettings {
    /// Item endpoint with a `{token}` placeholder.
    pub url_template: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            url_template: "https://gw.yad2.co.il/realestate-item/{token}/customer".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            retry: RetryPolicy {
                max_retries: 2,
                retry_delay: Duration::from_secs(1),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestContactLookup {
    settings: ContactSettings,
    client: reqwest::Client,
}

impl ReqwestContactLookup {
    pub fn new(settings: ContactSettings) -> Result<Self, FetchError> {
        if !settings.url_template.contains(TOKEN_PLACEHOLDER) {
            return Err(FetchError::new(
                FailureKind::InvalidUrl,
                format!("contact url template lacks {TOKEN_PLACEHOLDER}"),
            ));
        }
        let client = build_client(settings.connect_timeout, settings.request_timeout)?;
        Ok(Self { settings, client })
    }
}

/// Agency phone first, then the private one; blanks count as missing.
fn phone_from_document(document: &Value) -> Option<String> {
    ["/data/brokerPhone", "/data/phone"]
        .iter()
        .filter_map(|path| document.pointer(path).and_then(Value::as_str))
        .map(str::trim)
        .find(|phone| !phone.is_empty())
        .map(str::to_string)
}

#[async_trait::async_trait]
impl ContactLookup for ReqwestContactLookup {
    async fn phone(&self, token: &str) -> Result<Option<String>, FetchError> {
        let raw = self.settings.url_template.replace(TOKEN_PLACEHOLDER, token);
        let url = Url::parse(&raw)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let label = format!("contact {token}");
        let document = with_retries(self.settings.retry, &label, || {
            get_json(&self.client, url.clone())
        })
        .await?;
        Ok(phone_from_document(&document))
    }
}

/// Token to phone, `None` meaning the provider had none.
///
/// A missing or unreadable cache file starts an empty cache; it only saves
/// lookups and never affects classification.
#[derive(Debug)]
pub struct PhoneCache {
    writer: AtomicFileWriter,
    entries: BTreeMap<String, Option<String>>,
    dirty: bool,
}

impl PhoneCache {
    pub fn load(path: PathBuf) -> Self {
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    watch_warn!("Ignoring unreadable phone cache {:?}: {}", path, err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                watch_warn!("Could not read phone cache {:?}: {}", path, err);
                BTreeMap::new()
            }
        };
        watch_debug!("Phone cache {:?}: {} entries", path, entries.len());
        Self {
            writer: AtomicFileWriter::new(path),
            entries,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` when the token was never looked up.
    pub fn get(&self, token: &str) -> Option<Option<&str>> {
        self.entries.get(token).map(Option::as_deref)
    }

    pub fn insert(&mut self, token: String, phone: Option<String>) {
        if self.entries.get(&token) != Some(&phone) {
            self.entries.insert(token, phone);
            self.dirty = true;
        }
    }

    /// Writes the cache if anything changed since it was loaded or saved.
    pub fn save(&mut self) -> Result<(), PersistError> {
        if !self.dirty {
            return Ok(());
        }
        let mut bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|err| PersistError::Io(io::Error::other(err)))?;
        bytes.push(b'\n');
        self.writer.write(&bytes)?;
        self.dirty = false;
        Ok(())
    }
}

/// Fills `contactPhone` into raw records, consulting the cache first.
pub struct ContactEnricher {
    lookup: Box<dyn ContactLookup>,
    cache: PhoneCache,
    max_concurrency: usize,
}

impl ContactEnricher {
    pub fn new(lookup: Box<dyn ContactLookup>, cache: PhoneCache, max_concurrency: usize) -> Self {
        Self {
            lookup,
            cache,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn cache(&self) -> &PhoneCache {
        &self.cache
    }

    /// Looks up uncached tokens and injects every known phone.
    ///
    /// A failed lookup is logged and left uncached so a later run retries it;
    /// the record simply goes on without a phone.
    pub async fn enrich(&mut self, records: &mut [Value]) {
        let missing: BTreeSet<String> = records
            .iter()
            .filter_map(record_token)
            .filter(|token| self.cache.get(token).is_none())
            .map(str::to_string)
            .collect();

        if !missing.is_empty() {
            watch_info!("Looking up {} seller phones", missing.len());
            let lookup = self.lookup.as_ref();
            let results: Vec<(String, Result<Option<String>, FetchError>)> = stream::iter(missing)
                .map(|token| async move {
                    let result = lookup.phone(&token).await;
                    (token, result)
                })
                .buffered(self.max_concurrency)
                .collect()
                .await;
            for (token, result) in results {
                match result {
                    Ok(phone) => {
                        if phone.is_none() {
                            watch_debug!("No phone available for {}", token);
                        }
                        self.cache.insert(token, phone);
                    }
                    Err(err) => watch_warn!("Phone lookup for {} failed: {}", token, err),
                }
            }
        }

        for record in records.iter_mut() {
            let phone = record_token(record)
                .and_then(|token| self.cache.get(token).flatten())
                .map(str::to_string);
            if let (Some(phone), Value::Object(fields)) = (phone, record) {
                fields.insert(CONTACT_PHONE_FIELD.to_string(), Value::String(phone));
            }
        }
    }

    pub fn save_cache(&mut self) -> Result<(), PersistError> {
        self.cache.save()
    }
}

fn record_token(record: &Value) -> Option<&str> {
    record
        .get("token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
