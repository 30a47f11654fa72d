//! Snapshot a website and publish it to permanent storage.
//!
//! ```text
//! permasite extract https://docs.example.com --max-pages 200
//! permasite estimate docs.example.com
//! permasite publish docs.example.com --wallet wallet.json
//! ```

mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use permasite::{
    estimate, snapshot, ExtractSettings, Extractor, FsBlobStore, HttpRenderer, HttpStorageClient,
    MemoryStorage, PublishConfig, PublishedSite, Publisher, RenderHandle, StorageAddressing,
    StorageClient, UploadCredentials,
};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "permasite")]
#[command(about = "Snapshot a website and republish it on content-addressed storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a site and save a snapshot to the data directory
    Extract(ExtractArgs),

    /// Upload a saved snapshot and print the manifest identifier
    Publish(PublishArgs),

    /// Show what publishing a snapshot would upload
    Estimate {
        /// Snapshot key (the site's hostname)
        site: String,

        /// Page upload rounds, including the provisional one
        #[arg(long, default_value_t = 2)]
        rounds: u32,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// Seed URL
    url: String,

    /// Maximum pages to capture
    #[arg(long, default_value_t = 100)]
    max_pages: usize,

    /// Links followed per page
    #[arg(long, default_value_t = 50)]
    max_links: usize,

    /// Politeness delay between requests, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Keep references to other hosts in page link lists
    #[arg(long)]
    allow_external: bool,

    /// Skip probing conventional documentation paths
    #[arg(long)]
    no_probe: bool,
}

#[derive(Args)]
struct PublishArgs {
    /// Snapshot key (the site's hostname)
    site: String,

    /// Wallet keyfile authorizing uploads
    #[arg(long)]
    wallet: Option<PathBuf>,

    /// Concurrent uploads per pass
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Page upload rounds, including the provisional one
    #[arg(long, default_value_t = 2)]
    rounds: u32,

    /// Client-side cap on uploads per second
    #[arg(long)]
    rate: Option<u32>,

    /// Publish to in-memory storage instead of the network
    #[arg(long)]
    dry_run: bool,

    /// Exit with status 2 if any page or asset failed to publish
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,permasite=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Extract(args) => cmd_extract(&config, args, &cancel).await,
        Commands::Publish(args) => cmd_publish(&config, args, &cancel).await,
        Commands::Estimate { site, rounds } => cmd_estimate(&config, &site, rounds).await,
    }
}

async fn cmd_extract(
    config: &Config,
    args: ExtractArgs,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let settings = ExtractSettings::new()
        .with_max_pages(args.max_pages)
        .with_max_links_per_page(args.max_links)
        .with_delay(Duration::from_millis(args.delay))
        .with_timeout(Duration::from_secs(args.timeout))
        .with_same_domain_only(!args.allow_external)
        .with_probing(!args.no_probe);
    let addressing = StorageAddressing::default().with_gateway(&config.gateway);

    let fetcher = Arc::new(HttpRenderer::new().context("Failed to build HTTP client")?);
    let renderer = Arc::new(RenderHandle::lazy(
        || async { HttpRenderer::new() },
        settings.workers,
    ));
    let extractor =
        Extractor::new(renderer.clone(), fetcher, settings).with_addressing(addressing);

    let result = extractor.extract(&args.url, cancel).await;
    renderer.shutdown().await;
    let extraction = result.with_context(|| format!("Extraction of {} failed", args.url))?;

    let store = FsBlobStore::new(&config.data_dir);
    let prefix = snapshot::save(&store, &extraction.graph)
        .await
        .context("Failed to save snapshot")?;

    output::print_extraction(&extraction, &store.root().join(&prefix));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_publish(
    config: &Config,
    args: PublishArgs,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let graph = load_snapshot(config, &args.site).await?;

    let mut publish_config = PublishConfig::new()
        .with_concurrency(args.concurrency)
        .with_page_rounds(args.rounds)
        .with_addressing(StorageAddressing::default().with_gateway(&config.gateway));
    if let Some(rate) = args.rate {
        publish_config = publish_config.with_uploads_per_second(rate);
    }

    let published = if args.dry_run {
        tracing::info!("Dry run, publishing to in-memory storage");
        publish(Arc::new(MemoryStorage::new()), publish_config, &graph, cancel).await?
    } else {
        let wallet_path = args
            .wallet
            .or_else(|| config.wallet_path.clone())
            .context("A wallet is required to publish (use --wallet or PERMASITE_WALLET)")?;
        let wallet = tokio::fs::read_to_string(&wallet_path)
            .await
            .with_context(|| format!("Failed to read wallet {}", wallet_path.display()))?;
        let credentials = UploadCredentials::new(&config.upload_url).with_wallet(wallet);
        let storage = HttpStorageClient::new(credentials)
            .context("Failed to build storage client")?
            .with_gateway(&config.gateway);
        publish(Arc::new(storage), publish_config, &graph, cancel).await?
    };

    output::print_publication(&published, &config.gateway, args.dry_run);

    if args.strict && published.publication.report.has_failures() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn publish<S: StorageClient + 'static>(
    storage: Arc<S>,
    config: PublishConfig,
    graph: &permasite::SiteGraph,
    cancel: &CancellationToken,
) -> Result<PublishedSite> {
    Publisher::new(storage, config)
        .publish_site(graph, cancel)
        .await
        .context("Publish failed")
}

async fn cmd_estimate(config: &Config, site: &str, rounds: u32) -> Result<ExitCode> {
    let graph = load_snapshot(config, site).await?;
    let plan = estimate::plan(&graph, rounds);
    output::print_plan(site, &plan);
    Ok(ExitCode::SUCCESS)
}

async fn load_snapshot(config: &Config, site: &str) -> Result<permasite::SiteGraph> {
    let store = FsBlobStore::new(&config.data_dir);
    if !snapshot::exists(&store, site).await? {
        let available = snapshot::list_sites(&store).await.unwrap_or_default();
        if available.is_empty() {
            anyhow::bail!(
                "No snapshot for {site} in {} (run `permasite extract` first)",
                config.data_dir.display()
            );
        }
        anyhow::bail!(
            "No snapshot for {site}; available: {}",
            available.join(", ")
        );
    }
    snapshot::load(&store, site)
        .await
        .with_context(|| format!("Failed to load snapshot {site}"))
}
