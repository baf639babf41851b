//! Command line interface for the hydration pipeline.
//!
//! `backfill` runs one fan-out query across the configured relays and
//! projects the merged result in batches. `stream` keeps a subscription
//! worker per relay feeding the shared projector until ctrl-c. Individual
//! relay outages are never fatal; a non-zero exit means no relay was
//! reachable at all, or the configuration itself is broken.

use clap::{Parser, Subcommand};
use hydrator::{BatchSummary, HydratorConfig, Projector, Store, StoreConfig};
use nostr_client::{
    ConnectionPool, EventHandler, Filter, PoolConfig, SubscriptionWorker, WorkerConfig, query,
};
use nostr_core::Event;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "hydrator",
    version,
    about = "Hydrate a local store from Nostr relays"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "hydrator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One-shot fan-out query and batched projection
    Backfill {
        /// Only events created at or after this unix timestamp
        #[arg(long)]
        since: Option<u64>,

        /// Only events created at or before this unix timestamp
        #[arg(long)]
        until: Option<u64>,

        /// Per-relay result cap
        #[arg(long)]
        limit: Option<u64>,

        /// Kinds to fetch, overriding the configured set (repeatable)
        #[arg(long = "kind")]
        kinds: Vec<u16>,
    },

    /// Follow the configured relays and project events as they arrive
    Stream {
        /// Kinds to follow, overriding the configured set (repeatable)
        #[arg(long = "kind")]
        kinds: Vec<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match HydratorConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Backfill {
            since,
            until,
            limit,
            kinds,
        } => backfill(&config, since, until, limit, kinds).await,
        Commands::Stream { kinds } => stream(&config, kinds).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_projector(config: &HydratorConfig) -> anyhow::Result<Arc<Projector>> {
    let store = Store::open(StoreConfig {
        path: config.database.clone(),
        ..Default::default()
    })?;
    Ok(Arc::new(Projector::new(Arc::new(store))))
}

fn effective_kinds(config: &HydratorConfig, overrides: Vec<u16>) -> Vec<u16> {
    if overrides.is_empty() {
        config.kinds.clone()
    } else {
        overrides
    }
}

async fn backfill(
    config: &HydratorConfig,
    since: Option<u64>,
    until: Option<u64>,
    limit: Option<u64>,
    kinds: Vec<u16>,
) -> anyhow::Result<ExitCode> {
    let projector = open_projector(config)?;
    let pool = Arc::new(ConnectionPool::new(PoolConfig {
        connect_timeout: config.connect_timeout(),
    }));

    let mut filter = Filter::new().kinds(effective_kinds(config, kinds));
    if let Some(since) = since {
        filter = filter.since(since);
    }
    if let Some(until) = until {
        filter = filter.until(until);
    }
    if let Some(limit) = limit {
        filter = filter.limit(limit);
    }

    info!("backfilling from {} relays", config.relays.len());
    let outcome = query(
        &pool,
        &config.relays,
        filter,
        config.per_relay_timeout(),
        config.overall_timeout(),
    )
    .await?;

    if outcome.relays_failed == outcome.relays_queried {
        error!(
            "no relay reachable ({} attempted)",
            outcome.relays_queried
        );
        pool.close_all().await;
        return Ok(ExitCode::FAILURE);
    }
    if outcome.rejected > 0 {
        warn!("{} events dropped for failing verification", outcome.rejected);
    }

    // Keep relay attribution through the merge, then flush per batch.
    let sources = outcome.sources;
    let mut by_source: HashMap<String, Vec<Event>> = HashMap::new();
    for event in outcome.events {
        let source = sources.get(&event.id).cloned().unwrap_or_default();
        by_source.entry(source).or_default().push(event);
    }

    let mut summary = BatchSummary::default();
    for (source, events) in &by_source {
        for chunk in events.chunks(config.batch_size) {
            summary.merge(projector.project_batch(chunk, source));
        }
    }

    pool.close_all().await;

    println!(
        "backfill complete: {} saved, {} skipped, {} errors",
        summary.saved, summary.skipped, summary.errors
    );
    Ok(ExitCode::SUCCESS)
}

async fn stream(config: &HydratorConfig, kinds: Vec<u16>) -> anyhow::Result<ExitCode> {
    let projector = open_projector(config)?;
    let pool = Arc::new(ConnectionPool::new(PoolConfig {
        connect_timeout: config.connect_timeout(),
    }));
    let filter = Filter::new().kinds(effective_kinds(config, kinds));

    let shutdown = CancellationToken::new();
    let mut workers = Vec::new();
    let mut tasks = tokio::task::JoinSet::new();

    for url in &config.relays {
        let worker = Arc::new(SubscriptionWorker::with_config(
            Arc::clone(&pool),
            url.clone(),
            filter.clone(),
            WorkerConfig {
                reconnect_delay: config.reconnect_delay(),
                receive_timeout: config.receive_timeout(),
            },
        ));

        let handler: EventHandler = {
            let projector = Arc::clone(&projector);
            let relay = url.clone();
            Arc::new(move |event| {
                projector
                    .project(event, &relay)
                    .map(|_| ())
                    .map_err(Into::into)
            })
        };

        let run_worker = Arc::clone(&worker);
        let token = shutdown.clone();
        tasks.spawn(async move { run_worker.run(handler, token).await });
        workers.push(worker);
    }

    info!(
        "streaming from {} relays; press ctrl-c to stop",
        workers.len()
    );

    // The pool keeps no timers; staleness cleanup runs from here.
    let cleanup_every = (config.stale_max_age() / 2).max(Duration::from_secs(1));
    let mut cleanup = tokio::time::interval(cleanup_every);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                shutdown.cancel();
                break;
            }
            _ = cleanup.tick() => {
                let removed = pool.cleanup_stale(config.stale_max_age()).await;
                if removed > 0 {
                    info!("cleaned up {} stale connections", removed);
                }
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!("worker task failed: {}", e);
        }
    }

    for relay in pool.stats().await.relays {
        info!(
            "{}: {} failed connect attempts",
            relay.url, relay.failed_attempts
        );
    }
    pool.close_all().await;

    let stats = projector.stats();
    println!(
        "stream stopped: {} saved, {} duplicates, {} rejected",
        stats.saved,
        stats.duplicates,
        stats.rejected_verification + stats.rejected_invalid
    );
    Ok(ExitCode::SUCCESS)
}
