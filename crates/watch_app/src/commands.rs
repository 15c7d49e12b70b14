use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::Utc;
use watch_core::StoreReport;
use watch_engine::{
    export_csv, ContactEnricher, DryRunTransport, JsonStateFile, MemoryStore, PhoneCache,
    ReqwestContactLookup, ReqwestFeedSource, RunOptions, SnapshotStore, TelegramTransport,
    Transport, WatchCycle,
};
use watch_logging::{watch_error, watch_info};

use crate::config::RuntimeConfig;
use crate::RunArgs;

const BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

fn telegram(config: &RuntimeConfig) -> anyhow::Result<TelegramTransport> {
    let token = env::var(BOT_TOKEN_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("{BOT_TOKEN_VAR} is not set (use --dry-run to run without it)"))?;
    let chat_id = env::var(CHAT_ID_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| config.channel.chat_id.clone())
        .ok_or_else(|| anyhow!("no chat id: set {CHAT_ID_VAR} or channel.chat_id"))?;
    watch_info!("Notifications go to chat {}", chat_id);
    Ok(TelegramTransport::new(
        &config.channel.api_base,
        token.trim(),
        chat_id.trim(),
        Duration::from_secs(config.channel.timeout_secs),
    )?)
}

fn load_store(config: &RuntimeConfig) -> anyhow::Result<watch_core::SeenStore> {
    JsonStateFile::new(config.state_path.clone())
        .load(&config.directory)
        .with_context(|| format!("loading {}", config.state_path.display()))
}

pub(crate) fn run(config: &RuntimeConfig, args: RunArgs) -> anyhow::Result<()> {
    let transport: Box<dyn Transport> = if args.dry_run {
        Box::new(DryRunTransport)
    } else {
        Box::new(telegram(config)?)
    };
    let mut state: Box<dyn SnapshotStore> = if args.dry_run {
        Box::new(MemoryStore::with_snapshot(load_store(config)?))
    } else {
        Box::new(JsonStateFile::new(config.state_path.clone()))
    };

    let feed = ReqwestFeedSource::new(config.feed.clone()).context("building feed client")?;
    let mut enricher = match &config.contacts {
        Some(settings) => {
            let lookup =
                ReqwestContactLookup::new(settings.clone()).context("building contact client")?;
            Some(ContactEnricher::new(
                Box::new(lookup),
                PhoneCache::load(config.phone_cache_path.clone()),
                config.feed.max_concurrency,
            ))
        }
        None => None,
    };

    let cycle = WatchCycle {
        directory: &config.directory,
        criteria: &config.criteria,
        policy: &config.policy,
        formatter: &config.formatter,
        feed: &feed,
        transport: transport.as_ref(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    runtime.block_on(async {
        let mut options = RunOptions { seed: args.seed };
        loop {
            let outcome = cycle
                .run(state.as_mut(), enricher.as_mut(), options, Utc::now())
                .await;
            let Some(interval) = args.watch else {
                return outcome.map(|_| ()).map_err(anyhow::Error::from);
            };
            match outcome {
                Ok(_) => options.seed = false,
                Err(err) => watch_error!("Cycle failed: {}", err),
            }
            watch_info!("Next cycle in {} seconds", interval);
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    })
}

pub(crate) fn report(config: &RuntimeConfig) -> anyhow::Result<()> {
    let store = load_store(config)?;
    print!("{}", StoreReport::build(&store));
    Ok(())
}

pub(crate) fn export(config: &RuntimeConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let store = load_store(config)?;
    let target = output.unwrap_or_else(|| config.csv_path.clone());
    let summary = export_csv(&store, &config.item_url_base, target)
        .context("writing csv export")?;
    watch_info!(
        "Exported {} listings to {}",
        summary.rows,
        summary.output_path.display()
    );
    Ok(())
}
