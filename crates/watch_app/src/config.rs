//! RON configuration file and its validation into typed runtime settings.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use watch_core::{
    ConfigError, Criteria, MessageFormatter, NeighborhoodDirectory, NeighborhoodEntry,
    ProfileSpec, RepostPolicy,
};
use watch_engine::{ContactSettings, FeedSettings, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub item_url_base: String,
    pub contact_url_template: String,
    pub lookup_contacts: bool,
    pub fixed_params: Vec<(String, String)>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_pages: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let feed = FeedSettings::default();
        let contacts = ContactSettings::default();
        Self {
            base_url: feed.base_url,
            item_url_base: "https://www.yad2.co.il/realestate/item".to_string(),
            contact_url_template: contacts.url_template,
            lookup_contacts: true,
            fixed_params: Vec::new(),
            connect_timeout_secs: feed.connect_timeout.as_secs(),
            request_timeout_secs: feed.request_timeout.as_secs(),
            max_concurrency: feed.max_concurrency,
            max_pages: feed.max_pages,
            max_retries: feed.retry.max_retries,
            retry_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Overridden by `TELEGRAM_CHAT_ID` when set.
    pub chat_id: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 20,
        }
    }
}

/// The configuration document as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_phone_cache_path")]
    pub phone_cache_path: PathBuf,
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub repost: RepostPolicy,
    pub neighborhoods: Vec<NeighborhoodEntry>,
    pub profiles: Vec<ProfileSpec>,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("seen.json")
}

fn default_phone_cache_path() -> PathBuf {
    PathBuf::from("phone_cache.json")
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("listings.csv")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("listing-watch.log")
}

/// Validated settings every command works from.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub directory: NeighborhoodDirectory,
    pub criteria: Criteria,
    pub policy: RepostPolicy,
    pub formatter: MessageFormatter,
    pub item_url_base: String,
    pub feed: FeedSettings,
    pub contacts: Option<ContactSettings>,
    pub channel: ChannelConfig,
    pub state_path: PathBuf,
    pub phone_cache_path: PathBuf,
    pub csv_path: PathBuf,
}

pub fn parse(text: &str) -> anyhow::Result<AppConfig> {
    ron::from_str(text).context("invalid configuration document")
}

/// Only the log path, read before logging is up; falls back to the default.
pub fn peek_log_path(path: &Path) -> PathBuf {
    fs::read_to_string(path)
        .ok()
        .and_then(|text| ron::from_str::<AppConfig>(&text).ok())
        .map(|config| config.log_path)
        .unwrap_or_else(default_log_path)
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing configuration {}", path.display()))
}

impl AppConfig {
    /// Fails fast on anything a run could not work with.
    pub fn validate(self) -> Result<RuntimeConfig, ConfigError> {
        let directory = NeighborhoodDirectory::new(&self.neighborhoods)?;
        let criteria = Criteria::new(&self.profiles, &directory)?;
        self.repost.validate()?;

        let retry = RetryPolicy {
            max_retries: self.feed.max_retries,
            retry_delay: Duration::from_millis(self.feed.retry_delay_ms),
        };
        let connect_timeout = Duration::from_secs(self.feed.connect_timeout_secs);
        let request_timeout = Duration::from_secs(self.feed.request_timeout_secs);
        let feed = FeedSettings {
            base_url: self.feed.base_url.clone(),
            fixed_params: self.feed.fixed_params.clone(),
            connect_timeout,
            request_timeout,
            max_concurrency: self.feed.max_concurrency.max(1),
            max_pages: self.feed.max_pages.max(1),
            retry,
        };
        let contacts = self.feed.lookup_contacts.then(|| ContactSettings {
            url_template: self.feed.contact_url_template.clone(),
            connect_timeout,
            request_timeout,
            retry,
        });

        Ok(RuntimeConfig {
            formatter: MessageFormatter::new(self.feed.item_url_base.clone()),
            item_url_base: self.feed.item_url_base,
            directory,
            criteria,
            policy: self.repost,
            feed,
            contacts,
            channel: self.channel,
            state_path: self.state_path,
            phone_cache_path: self.phone_cache_path,
            csv_path: self.csv_path,
        })
    }
}
