//! Leadgen Server
//!
//! Axum server exposing the lead pipeline over HTTP, plus a one-shot CLI
//! mode that runs the pipeline in-process and prints the report.

mod api;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use leadgen_core::pipeline::VerifierSet;
use leadgen_core::{
    FixtureSource, PipelinePolicy, PipelineRunner, ScraperOptions, SeededLeadSource,
    SeededVerifier,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use api::config::ConfigStore;
use api::AppState;

const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Clone)]
#[command(author, version, about = "Leadgen - lead acquisition pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on (overrides LEADGEN_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Run the pipeline once and print the report as JSON
    Run {
        #[command(flatten)]
        options: RunOptions,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print persisted defaults and the pipeline policy
    Defaults,
}

/// Where leads come from and how they are verified
#[derive(ClapArgs, Clone, Debug)]
struct SourceArgs {
    /// JSON fixture (array of leads or array of batches) instead of generated leads
    #[arg(long)]
    fixture: Option<PathBuf>,
    /// Leads per batch when the fixture is a flat array
    #[arg(long, default_value_t = 1)]
    batch_size: usize,
    /// Seed for generated leads and simulated verification
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Number of generated batches
    #[arg(long, default_value_t = 5)]
    batches: usize,
    /// Simulate remote verification instead of format checks
    #[arg(long)]
    simulate_verification: bool,
}

/// Scraper options as flags; unset flags fall back to persisted defaults
#[derive(ClapArgs, Clone, Debug)]
struct RunOptions {
    /// company, name or title
    #[arg(long)]
    search_type: Option<String>,
    #[arg(short, long)]
    query: Option<String>,
    #[arg(long)]
    industry: Option<String>,
    #[arg(long)]
    company_size: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    min_score: Option<u32>,
    /// basic, standard, advanced or premium
    #[arg(long)]
    enrichment: Option<String>,
    /// slow, medium or fast
    #[arg(long)]
    speed: Option<String>,
    /// none, rotating, dedicated or residential
    #[arg(long)]
    proxy: Option<String>,
}

impl From<RunOptions> for ScraperOptions {
    fn from(args: RunOptions) -> Self {
        ScraperOptions {
            search_type: args.search_type,
            search_query: args.query,
            industry: args.industry,
            company_size: args.company_size,
            location: args.location,
            min_quality_score: args.min_score,
            enrichment_level: args.enrichment,
            scraping_speed: args.speed,
            proxy_settings: args.proxy,
            ..ScraperOptions::default()
        }
    }
}

impl SourceArgs {
    fn runner(&self) -> anyhow::Result<PipelineRunner> {
        let runner = match &self.fixture {
            Some(path) => {
                let source = FixtureSource::load(path, self.batch_size)?;
                tracing::info!(path = %path.display(), batches = source.batch_count(), "Using fixture source");
                PipelineRunner::new(Arc::new(source))
            }
            None => PipelineRunner::new(Arc::new(
                SeededLeadSource::new(self.seed)
                    .with_batches(self.batches)
                    .with_batch_size(self.batch_size),
            )),
        };

        if !self.simulate_verification {
            return Ok(runner);
        }
        let verifier = Arc::new(SeededVerifier::new(self.seed));
        Ok(runner.with_verifiers(
            VerifierSet::new()
                .with_email(verifier.clone())
                .with_phone(verifier),
        ))
    }
}

impl Default for SourceArgs {
    fn default() -> Self {
        Self {
            fixture: None,
            batch_size: 1,
            seed: 0,
            batches: 5,
            simulate_verification: false,
        }
    }
}

fn resolve_port(flag: Option<u16>) -> u16 {
    flag.or_else(|| {
        std::env::var("LEADGEN_PORT")
            .ok()
            .and_then(|p| p.trim().parse().ok())
    })
    .unwrap_or(DEFAULT_PORT)
}

// === Server Entry ===

async fn run_server(port: u16, source: SourceArgs) -> anyhow::Result<()> {
    let store = ConfigStore::from_env();
    let defaults = store.load().await;
    tracing::info!(path = %store.path().display(), "Loaded persisted defaults");

    let state = AppState::new(source.runner()?, store, defaults);
    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Leadgen server running at http://{}", addr);
    tracing::info!("   Pipeline: /api/v1/pipeline/start, /cancel, /progress, /results, /events");
    tracing::info!("   Config:   /api/v1/config (GET, PATCH)");
    tracing::info!("   OpenAPI:  /api/v1/openapi.json");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(options: RunOptions, source: SourceArgs) -> anyhow::Result<()> {
    let mut merged = ConfigStore::from_env().load().await;
    merged.merge(options.into());

    let runner = source.runner()?;
    match runner.start(&merged).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(failure) => {
            let snapshot = runner.results();
            if !failure.partial.is_empty() {
                println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
            }
            Err(anyhow::Error::new(failure.error).context("Pipeline run failed"))
        }
    }
}

async fn print_defaults() -> anyhow::Result<()> {
    let store = ConfigStore::from_env();
    let output = serde_json::json!({
        "path": store.path().display().to_string(),
        "config": store.load().await,
        "defaults": api::config::ConfigDefaults::default(),
        "policy": PipelinePolicy::default(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Run { options, source }) => run_once(options, source).await,
        Some(CliCommand::Defaults) => print_defaults().await,
        Some(CliCommand::Serve { port, source }) => run_server(resolve_port(port), source).await,
        None => run_server(resolve_port(None), SourceArgs::default()).await,
    }
}
