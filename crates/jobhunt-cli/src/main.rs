use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobhunt_client::{AtsClient, MokaAnswerCache, OpenAiAnswerer};
use jobhunt_core::answer::CachedAnswerer;
use jobhunt_core::config::{IngestConfig, SourceSettings, load_targets, parse_targets, sort_by_priority};
use jobhunt_core::memory::{MemoryStore, StaticProfiles};
use jobhunt_core::metrics::RunMetrics;
use jobhunt_core::retry::RetryPolicy;
use jobhunt_core::rules::ScoringRules;
use jobhunt_core::throttle::{SourceGates, ThrottledSource};
use jobhunt_core::traits::{JobStore, ProfileStore, QuestionAnswerer, SourceClient};
use jobhunt_core::{IngestService, RawPosting, Scorer, SearchProfile, Target, TracingRunReporter};
use jobhunt_db::{Database, DatabaseConfig};

/// Targets polled when neither `--targets` nor the database provides any.
const DEFAULT_TARGETS: &str = include_str!("../../../targets.json");

#[derive(Parser)]
#[command(name = "jobhunt", version, about = "ATS job-posting ingestion and matching")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every target, score postings against all profiles and persist matches
    Run {
        /// JSON file with the targets to poll
        #[arg(short, long)]
        targets: Option<PathBuf>,

        /// JSON file overriding the scoring vocabulary
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// JSON array of search profiles (required with --dry-run, seeded into the database otherwise)
        #[arg(short, long)]
        profiles: Option<PathBuf>,

        /// Keep results in memory instead of PostgreSQL
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        #[command(flatten)]
        ingest: IngestArgs,
    },

    /// Score one posting against one profile, offline
    Score {
        /// JSON file holding a single posting
        #[arg(long)]
        posting: PathBuf,

        /// JSON file holding a single search profile
        #[arg(long)]
        profile: PathBuf,

        /// JSON file overriding the scoring vocabulary
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },

    /// List targets by priority
    Targets {
        /// JSON file with targets (defaults to the built-in list)
        #[arg(short, long)]
        targets: Option<PathBuf>,

        /// Register the listed targets in the database
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Delete expired jobs and their matches
    Cleanup,

    /// Answer a free-text application question
    Answer {
        /// The question as asked on the application form
        #[arg(short, long)]
        question: String,

        /// Candidate background used as context
        #[arg(long)]
        profile_summary: Option<String>,

        /// LLM model to use (e.g., "gpt-4o-mini", "gemini-2.5-flash")
        #[arg(short, long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(
            short,
            long,
            env = "OPENAI_BASE_URL",
            default_value = "https://api.openai.com/v1"
        )]
        base_url: String,

        /// API key (reads from OPENAI_API_KEY env var if not provided)
        #[arg(short, long, env = "OPENAI_API_KEY")]
        api_key: String,
    },
}

/// Ingestion tuning, each flag also readable from the environment.
#[derive(Args)]
struct IngestArgs {
    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Targets processed at the same time
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 15)]
    max_concurrency: usize,

    #[arg(long, env = "GREENHOUSE_CONCURRENCY", default_value_t = 4)]
    greenhouse_concurrency: usize,

    /// Requests per second
    #[arg(long, env = "GREENHOUSE_RATE", default_value_t = 5.0)]
    greenhouse_rate: f64,

    #[arg(long, env = "ASHBY_CONCURRENCY", default_value_t = 3)]
    ashby_concurrency: usize,

    /// Requests per second
    #[arg(long, env = "ASHBY_RATE", default_value_t = 3.0)]
    ashby_rate: f64,

    #[arg(long, env = "LEVER_CONCURRENCY", default_value_t = 3)]
    lever_concurrency: usize,

    /// Requests per second
    #[arg(long, env = "LEVER_RATE", default_value_t = 4.0)]
    lever_rate: f64,

    /// Attempts per fetch or batch commit, including the first
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3)]
    retry_attempts: u32,

    /// Base retry delay in seconds
    #[arg(long, env = "RETRY_DELAY", default_value_t = 2.0)]
    retry_delay: f64,

    #[arg(long, env = "JOB_EXPIRATION_DAYS", default_value_t = 30)]
    job_expiration_days: u32,

    /// Score floor applied on top of each profile's own minimum
    #[arg(long, env = "MIN_SCORE", default_value_t = 15)]
    min_score: u32,

    /// Job + match pairs per transaction
    #[arg(long, env = "BATCH_SIZE", default_value_t = 200)]
    batch_size: usize,

    /// Postings kept per target
    #[arg(long, env = "MAX_JOBS_PER_COMPANY", default_value_t = 1000)]
    max_jobs_per_company: usize,
}

impl IngestArgs {
    fn into_config(self) -> Result<IngestConfig> {
        if !self.retry_delay.is_finite() || self.retry_delay < 0.0 {
            bail!("RETRY_DELAY must be a non-negative number of seconds");
        }

        let config = IngestConfig {
            request_timeout: Duration::from_secs(self.request_timeout),
            max_concurrency: self.max_concurrency,
            greenhouse: SourceSettings::new(self.greenhouse_concurrency, self.greenhouse_rate),
            ashby: SourceSettings::new(self.ashby_concurrency, self.ashby_rate),
            lever: SourceSettings::new(self.lever_concurrency, self.lever_rate),
            retry: RetryPolicy::new(self.retry_attempts, Duration::from_secs_f64(self.retry_delay)),
            job_expiration_days: self.job_expiration_days,
            min_score: self.min_score,
            batch_size: self.batch_size,
            max_postings_per_target: self.max_jobs_per_company,
            ..IngestConfig::default()
        };
        config.validate().context("Invalid ingestion settings")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobhunt=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            targets,
            rules,
            profiles,
            dry_run,
            ingest,
        } => {
            let config = ingest.into_config()?;
            let scorer = load_scorer(rules.as_deref())?;
            cmd_run(
                targets.as_deref(),
                profiles.as_deref(),
                dry_run,
                scorer,
                config,
            )
            .await?;
        }
        Commands::Score {
            posting,
            profile,
            rules,
        } => {
            let scorer = load_scorer(rules.as_deref())?;
            cmd_score(&posting, &profile, &scorer)?;
        }
        Commands::Targets { targets, save } => {
            cmd_targets(targets.as_deref(), save).await?;
        }
        Commands::Cleanup => {
            let db = connect_db().await?;
            let removed = db.job_repo().delete_expired().await?;
            println!("Removed {removed} expired jobs");
        }
        Commands::Answer {
            question,
            profile_summary,
            model,
            base_url,
            api_key,
        } => {
            let answerer = OpenAiAnswerer::with_base_url(&api_key, &model, &base_url)?;
            let cached = CachedAnswerer::new(answerer, MokaAnswerCache::default());
            let answer = cached
                .answer(&question, profile_summary.as_deref().unwrap_or_default())
                .await?;
            println!("{answer}");
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply pending migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db)
}

fn load_scorer(rules: Option<&Path>) -> Result<Scorer> {
    let rules = match rules {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
            ScoringRules::from_json(&raw)?
        }
        None => ScoringRules::default(),
    };
    Ok(Scorer::new(rules))
}

/// Targets from the file if given, else those registered in the database,
/// else the built-in list.
async fn resolve_targets(path: Option<&Path>, db: Option<&Database>) -> Result<Vec<Target>> {
    if let Some(path) = path {
        return Ok(load_targets(path)?);
    }
    if let Some(db) = db {
        let registered = db.target_repo().list().await?;
        if !registered.is_empty() {
            tracing::info!(targets = registered.len(), "Using targets registered in the database");
            return Ok(registered);
        }
    }
    Ok(parse_targets(DEFAULT_TARGETS)?)
}

/// Cancel the token on the first Ctrl-C: nothing new is scheduled and
/// in-flight targets are allowed to finish.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, finishing in-flight targets");
                token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl-C handler"),
        }
    });
}

async fn cmd_run(
    targets: Option<&Path>,
    profiles: Option<&Path>,
    dry_run: bool,
    scorer: Scorer,
    config: IngestConfig,
) -> Result<()> {
    let client = AtsClient::with_timeout(config.request_timeout)?;
    let source = ThrottledSource::new(client, SourceGates::from_config(&config));

    let cancel_token = CancellationToken::new();
    cancel_on_ctrl_c(cancel_token.clone());

    let metrics = if dry_run {
        let Some(path) = profiles else {
            bail!("--dry-run needs --profiles FILE");
        };
        let profiles = StaticProfiles::from_file(path)?;
        let targets = resolve_targets(targets, None).await?;
        let store = MemoryStore::new();

        let metrics = execute(source, store.clone(), profiles, scorer, config, targets, cancel_token).await?;
        println!(
            "Dry run: {} jobs and {} matches held in memory",
            store.job_count(),
            store.match_count()
        );
        metrics
    } else {
        let db = connect_db().await?;
        let profile_repo = db.profile_repo();
        if let Some(path) = profiles {
            let seeded = StaticProfiles::from_file(path)?.load_profiles().await?;
            for profile in &seeded {
                profile_repo.upsert(profile).await?;
            }
            tracing::info!(profiles = seeded.len(), "Seeded profiles");
        }
        let targets = resolve_targets(targets, Some(&db)).await?;

        execute(source, db.job_repo(), profile_repo, scorer, config, targets, cancel_token).await?
    };

    println!("{}", metrics.summary());
    Ok(())
}

async fn execute<S, J, P>(
    source: S,
    store: J,
    profiles: P,
    scorer: Scorer,
    config: IngestConfig,
    targets: Vec<Target>,
    cancel_token: CancellationToken,
) -> Result<RunMetrics>
where
    S: SourceClient,
    J: JobStore,
    P: ProfileStore,
{
    let service = IngestService::new(source, store, profiles, scorer, config);
    let metrics = service
        .run(targets, cancel_token, &TracingRunReporter)
        .await
        .context("Ingestion run failed")?;
    Ok(metrics)
}

fn cmd_score(posting: &Path, profile: &Path, scorer: &Scorer) -> Result<()> {
    let posting: RawPosting = read_json(posting)?;
    let profile: SearchProfile = read_json(profile)?;

    for warning in profile.validate() {
        tracing::warn!("{warning}");
    }

    let result = scorer.score(&posting, &profile);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_targets(path: Option<&Path>, save: bool) -> Result<()> {
    let mut targets = match path {
        Some(path) => load_targets(path)?,
        None => parse_targets(DEFAULT_TARGETS)?,
    };
    sort_by_priority(&mut targets);

    if save {
        let repo = connect_db().await?.target_repo();
        for target in &targets {
            repo.upsert(target).await?;
        }
        tracing::info!(targets = targets.len(), "Registered targets");
    }

    for target in &targets {
        println!(
            "  [P{}] {:<24} {:<10} {}",
            target.priority, target.name, target.source_kind.as_str(), target.board_id
        );
    }
    println!("\nTotal: {} targets", targets.len());
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
