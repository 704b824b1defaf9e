use clap::Parser;
use nd_core::{CategorySet, DigestRun, Frequency, Preference, PreferenceStore, Result, RunId, RunStatus, RunStore};
use nd_inference::{models::create_model, ModelProvider};
use nd_pipeline::{create_delivery, DeliveryKind, DigestRunner, Scheduler, TriggerEvent};
use nd_sources::{create_source, SourceProvider};
use nd_storage::{create_stores, StoreBackend, Stores};
use nd_web::{create_app, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod config;
mod logging;

use config::{AppConfig, HumanDuration};

#[derive(Parser, Debug)]
#[command(author, version, about = "Personalized news digests", long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[arg(long, help = "Run store. Available stores: memory, sqlite")]
    store: Option<StoreBackend>,
    #[arg(long, help = "SQLite database path")]
    db: Option<PathBuf>,
    #[arg(long, help = "Model to use for inference. Available models: openai, deepseek, ollama, dummy")]
    model: Option<ModelProvider>,
    #[arg(long)]
    model_name: Option<String>,
    #[arg(long)]
    model_url: Option<String>,
    #[arg(long, help = "Article source. Available sources: newsapi, fixture")]
    source: Option<SourceProvider>,
    #[arg(long, help = "JSON file of articles for the fixture source")]
    fixture: Option<PathBuf>,
    #[arg(long, help = "Where digests go. Available sinks: log, file, memory")]
    delivery: Option<DeliveryKind>,
    #[arg(long, help = "Output directory for the file sink")]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Trigger a digest run and execute it
    Run {
        /// Comma separated categories (e.g. technology,business). Defaults to the configured list.
        #[arg(long)]
        categories: Option<String>,
    },
    /// Execute every unfinished run in the store
    Resume,
    /// Show one run and its digest
    Show { id: RunId },
    /// List stored runs
    List,
    /// Save a subscriber's categories and frequency
    Subscribe {
        principal: String,
        #[arg(long)]
        categories: String,
        #[arg(long, default_value = "weekly")]
        frequency: Frequency,
    },
    /// Generate digests for every cohort of a frequency
    Schedule {
        #[arg(long, default_value = "weekly")]
        frequency: Frequency,
        /// Repeat with this interval (e.g. 1h, 30m, 1d, 1h15m30s). Without it a single tick runs.
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(store) = self.store {
            config.store.backend = store;
        }
        if let Some(db) = &self.db {
            config.store.path = db.clone();
        }
        if let Some(model) = self.model {
            config.model.provider = model;
        }
        if let Some(name) = &self.model_name {
            config.model.model_name = Some(name.clone());
        }
        if let Some(url) = &self.model_url {
            config.model.base_url = Some(url.clone());
        }
        if let Some(source) = self.source {
            config.source.provider = source;
        }
        if let Some(fixture) = &self.fixture {
            config.source.fixture_path = Some(fixture.clone());
        }
        if let Some(delivery) = self.delivery {
            config.delivery.kind = delivery;
        }
        if let Some(out) = &self.out {
            config.delivery.directory = out.clone();
        }
    }
}

/// Cancels the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Interrupted, stopping after the current step");
            token.cancel();
        }
    });
    cancel
}

fn print_run(run: &DigestRun) {
    println!(
        "{}  {:<11}  {}  [{}]",
        run.id,
        run.status.to_string(),
        run.created_at.format("%Y-%m-%d %H:%M"),
        run.categories
    );
    if let Some(failure) = &run.failure {
        println!(
            "    failed at {} with {} after {} attempt(s): {}",
            failure.step, failure.kind, failure.attempts, failure.message
        );
    }
}

async fn print_outcome(runner: &DigestRunner, run: &DigestRun) -> Result<()> {
    print_run(run);
    if run.status == RunStatus::Completed {
        if let Some(digest) = runner.result(run.id).await? {
            println!("\nSubject: {}\n\n{}", digest.subject, digest.body);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose, cli.quiet));

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let Stores { runs, preferences } = create_stores(&config.store).await?;
    info!("💾 Store initialized (using {:?})", config.store.backend);

    // Commands that only read or write records don't need the network collaborators.
    match &cli.command {
        Commands::List => {
            for run in runs.list_runs().await? {
                print_run(&run);
            }
            return Ok(());
        }
        Commands::Subscribe {
            principal,
            categories,
            frequency,
        } => {
            let preference = Preference::new(principal, CategorySet::parse_list(categories)?, *frequency)?;
            if preference.below_recommended_size() {
                tracing::warn!(
                    "Only {} categories selected; {} or more give a more varied digest",
                    preference.categories.len(),
                    nd_core::RECOMMENDED_MIN_CATEGORIES
                );
            }
            preferences.save_preference(&preference).await?;
            info!(
                "📝 Saved {} digest of {} for {}",
                preference.frequency, preference.categories, preference.principal
            );
            return Ok(());
        }
        _ => {}
    }

    let source = create_source(&config.source)?;
    info!("📰 Article source initialized (using {})", source.name());
    let model = create_model(&config.model)?;
    info!("🧠 Inference model initialized (using {})", model.name());
    let delivery = create_delivery(&config.delivery);

    let runner = Arc::new(DigestRunner::new(
        config.pipeline.clone(),
        source,
        model,
        runs,
        delivery,
    )?);
    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Commands::Run { categories } => {
            let categories = categories
                .map(|list| CategorySet::parse_list(&list).map(Vec::<String>::from))
                .transpose()?;
            let run = runner
                .trigger(TriggerEvent {
                    categories,
                    ..Default::default()
                })
                .await?;
            let run = runner.execute(run.id, &cancel).await?;
            print_outcome(&runner, &run).await?;
        }
        Commands::Resume => {
            let resumed = runner.resume_incomplete(&cancel).await?;
            if resumed.is_empty() {
                println!("No unfinished runs.");
            }
            for run in &resumed {
                print_run(run);
            }
        }
        Commands::Show { id } => {
            let run = runner.load(id).await?;
            print_outcome(&runner, &run).await?;
        }
        Commands::Schedule { frequency, interval } => {
            let scheduler = Scheduler::new(runner.clone(), preferences);
            match interval {
                Some(interval) => scheduler.run_periodic(frequency, interval.0, &cancel).await?,
                None => {
                    for run in scheduler.tick(frequency, &cancel).await? {
                        print_run(&run);
                    }
                }
            }
        }
        Commands::Serve { addr } => {
            let resumed = runner.resume_incomplete(&cancel).await?;
            if !resumed.is_empty() {
                info!("🔄 Resumed {} unfinished runs", resumed.len());
            }

            let state = AppState::new(runner.clone(), preferences).with_shutdown(cancel.clone());
            let background = state.background.clone();
            let app = create_app(state).await;
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("🌐 Listening on http://{}", addr);
            let shutdown = cancel.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;
            let stopped = background.drain().await;
            info!("🛑 Server stopped, {} background runs collected", stopped.len());
        }
        Commands::List | Commands::Subscribe { .. } => {}
    }

    Ok(())
}
