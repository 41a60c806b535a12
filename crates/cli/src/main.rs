use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sagasu_core::{
    load_config, BangumiClient, Config, SagasuApiClient, Spider, SpiderConfig, SpiderProgress,
    UploadConfig, Uploader,
};

/// Config file consulted when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "sagasu.toml";

#[derive(Parser, Debug)]
#[command(
    name = "sagasu-spider",
    version,
    about = "Bangumi catalog spider and uploader"
)]
struct Args {
    /// Optional TOML configuration file.
    #[arg(long, env = "SAGASU_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog into per-id JSON files.
    Spider(SpiderArgs),
    /// Upload crawled files to a sagasu core API.
    Upload(UploadArgs),
}

#[derive(Parser, Debug)]
struct SpiderArgs {
    /// First subject id to fetch.
    #[arg(short, long, default_value_t = 1)]
    start: u32,

    /// One past the last subject id, -1 for unbounded.
    #[arg(short, long, default_value_t = -1, allow_hyphen_values = true)]
    end: i64,

    /// Number of concurrent tasks.
    #[arg(short, long, default_value_t = 8)]
    parallel: usize,

    /// Output directory.
    #[arg(short, long, default_value = "data")]
    output: PathBuf,
}

#[derive(Parser, Debug)]
struct UploadArgs {
    /// Base sagasu core API url.
    #[arg(short, long)]
    base: String,

    /// Number of concurrent tasks.
    #[arg(short, long, default_value_t = 8)]
    parallel: usize,

    /// Directory holding the crawled files.
    #[arg(short, long, default_value = "data")]
    source: PathBuf,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config_or_default(args.config.as_deref())?;

    // An interrupt abandons in-flight tasks; per-id files are written in
    // one shot, so there is nothing to roll back.
    tokio::select! {
        result = dispatch(args.command, config) => result,
        _ = signal::ctrl_c() => {
            error!("Interrupted, abandoning in-flight tasks");
            std::process::exit(1);
        }
    }
}

fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                info!("Loading configuration from {:?}", default);
                Ok(load_config(default)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn dispatch(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Spider(args) => run_spider(args, config).await,
        Command::Upload(args) => run_upload(args, config).await,
    }
}

async fn run_spider(args: SpiderArgs, config: Config) -> Result<()> {
    let end = if args.end > 0 {
        Some(u32::try_from(args.end).context("end page out of range")?)
    } else {
        None
    };

    let spider_config = SpiderConfig {
        begin: args.start,
        end,
        parallel: args.parallel,
        output_dir: args.output,
    };

    let client = Arc::new(BangumiClient::new(config.catalog.clone())?);
    let spider = Spider::new(spider_config, client).with_retry_policy(config.retry.to_policy());

    let (tx, rx) = mpsc::channel::<SpiderProgress>(64);
    let reporter = tokio::spawn(report_progress(rx));

    let dispatched = spider.run_with_progress(Some(tx)).await;
    let _ = reporter.await;

    info!("Spider done, {} subjects dispatched", dispatched);
    Ok(())
}

/// Renders dispatch progress as a bar when the range is bounded, a
/// spinner otherwise.
async fn report_progress(mut rx: mpsc::Receiver<SpiderProgress>) {
    let mut bar: Option<ProgressBar> = None;
    while let Some(tick) = rx.recv().await {
        let bar = bar.get_or_insert_with(|| match tick.total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template("{bar:40.yellow} {pos}/{len} {msg}")
                {
                    bar.set_style(style);
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        });
        bar.set_position(tick.position);
        bar.set_message(format!("subject {}", tick.id));
    }
    if let Some(bar) = bar {
        bar.finish_with_message("done");
    }
}

async fn run_upload(args: UploadArgs, config: Config) -> Result<()> {
    let api = SagasuApiClient::new(&args.base, Duration::from_secs(config.upload.timeout_secs))?;
    let uploader = Uploader::new(
        UploadConfig {
            parallel: args.parallel,
            source_dir: args.source,
        },
        Arc::new(api),
    );

    let dispatched = uploader.run().await?;
    info!("Upload done, {} files dispatched", dispatched);
    Ok(())
}
