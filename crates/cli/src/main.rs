// geoquiz - curation pipeline for the country quiz knowledge base
//
// Batch commands (seed, resync, apply, cycle) take the store's run lock.
// Results go to stdout, logs to stderr.

mod exit_codes;
mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use geoquiz_ai_client::{CompletionService, OpenAIClient};
use geoquiz_config::ai::{AIConfigStatus, AIDiagnostics, ResolvedAIConfig};
use geoquiz_config::Settings;
use geoquiz_pipeline::PipelineError;
use geoquiz_sparql_client::SourceClient;
use geoquiz_store::{NewDispute, ReviewKind, RunLock, Store, StoreError, PIPELINE_LOCK};
use serde::Serialize;

use exit_codes::{
    ai_exit_code, pipeline_exit_code, store_exit_code, EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_ERROR,
    EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "geoquiz")]
#[command(about = "Reconcile and curate the country quiz knowledge base")]
#[command(version)]
struct Cli {
    /// Settings file (default: $GEOQUIZ_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// SQLite database (overrides the settings file)
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate an empty store from the configured sources
    Seed,

    /// Refetch every source and reconcile the store against it
    #[command(after_help = "\
Order: fetch all sources (abort on any failure or an empty result),
queue new gaps, prune vanished countries, insert new countries and
apply newer field values, then apply approved reviews.")]
    Resync,

    /// Ask the completion service for values on pending reviews
    Suggest {
        /// Only this kind (default: disputes, then gaps)
        #[arg(long)]
        kind: Option<KindArg>,
    },

    /// Write approved reviews into the canonical store
    Apply,

    /// Batch run: suggest for disputes and gaps, then resync
    #[command(after_help = "\
Examples:
  geoquiz cycle
  geoquiz cycle --json >> /var/log/geoquiz-cycle.jsonl")]
    Cycle,

    /// Report a displayed answer as wrong
    Report {
        /// Country the question is about
        #[arg(long)]
        country: String,

        /// Question text as shown to the quiz taker
        #[arg(long)]
        question: String,

        /// Answer the quiz currently considers correct
        #[arg(long, default_value = "")]
        answer: String,

        /// Who is reporting
        #[arg(long, default_value = "anonymous", env = "USER")]
        reporter: String,
    },

    /// Inspect and decide review items
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Show the change ledger
    #[command(after_help = "\
Examples:
  geoquiz ledger
  geoquiz ledger --country Norway
  geoquiz ledger --format csv > ledger.csv")]
    Ledger {
        /// Only entries for this country
        #[arg(long)]
        country: Option<String>,

        /// Output format (--json implies json)
        #[arg(long, short = 'f', default_value = "table")]
        format: LedgerFormat,
    },

    /// AI provider diagnostics
    #[command(subcommand)]
    Ai(AiCommands),
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Items waiting for a decision
    List {
        /// Only this kind (default: both)
        #[arg(long)]
        kind: Option<KindArg>,

        /// Include decided and applied items
        #[arg(long)]
        all: bool,
    },

    /// Approve an item that has a suggestion
    Approve {
        #[arg(long)]
        kind: KindArg,
        id: i64,
    },

    /// Dismiss an item without touching the store
    Bypass {
        #[arg(long)]
        kind: KindArg,
        id: i64,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Show the resolved AI configuration
    Doctor,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Gap,
    Dispute,
}

impl From<KindArg> for ReviewKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Gap => ReviewKind::Gap,
            KindArg::Dispute => ReviewKind::Dispute,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LedgerFormat {
    Table,
    Json,
    Csv,
}

const LOG_TARGETS: &[&str] = &[
    "geoquiz",
    "geoquiz_pipeline",
    "geoquiz_recon",
    "geoquiz_store",
    "geoquiz_sparql_client",
    "geoquiz_ai_client",
    "geoquiz_config",
];

/// Filter used when `RUST_LOG` is unset.
fn default_log_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>();
    format!("warn,{}", directives.join(","))
}

fn init_logging(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_filter(verbose)));

    // A second init (tests embedding main) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(&cli)?;
    let json = cli.json;

    match cli.command {
        Commands::Ai(AiCommands::Doctor) => cmd_ai_doctor(&settings, json),
        Commands::Seed => cmd_seed(&settings, json),
        Commands::Resync => cmd_resync(&settings, json),
        Commands::Suggest { kind } => cmd_suggest(&settings, kind.map(ReviewKind::from), json),
        Commands::Apply => cmd_apply(&settings, json),
        Commands::Cycle => cmd_cycle(&settings, json),
        Commands::Report {
            country,
            question,
            answer,
            reporter,
        } => cmd_report(&settings, country, question, answer, reporter, json),
        Commands::Review(ReviewCommands::List { kind, all }) => {
            cmd_review_list(&settings, kind.map(ReviewKind::from), all, json)
        }
        Commands::Review(ReviewCommands::Approve { kind, id }) => {
            cmd_review_decide(&settings, kind.into(), id, Decide::Approve, json)
        }
        Commands::Review(ReviewCommands::Bypass { kind, id }) => {
            cmd_review_decide(&settings, kind.into(), id, Decide::Bypass, json)
        }
        Commands::Ledger { country, format } => {
            let format = if json { LedgerFormat::Json } else { format };
            cmd_ledger(&settings, country, format)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn store(err: StoreError) -> Self {
        let hint = match &err {
            StoreError::LockHeld { .. } => {
                Some("another seed/resync/apply/cycle is running; retry later".to_string())
            }
            _ => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn pipeline(err: PipelineError) -> Self {
        let code = pipeline_exit_code(&err);
        let hint = match &err {
            PipelineError::Source(_) => Some("no changes were made; rerun once the source recovers".to_string()),
            PipelineError::EmptySnapshot => Some("check the SPARQL queries in [sources]".to_string()),
            PipelineError::Store(StoreError::LockHeld { .. }) => {
                Some("another seed/resync/apply/cycle is running; retry later".to_string())
            }
            PipelineError::InvalidTransition { .. } => Some("see `geoquiz review list --all`".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// shared setup
// ============================================================================

fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = Settings::load(cli.config.as_deref())
        .map_err(|e| CliError::usage(e.to_string()).with_hint("fix or remove the settings file"))?;
    if let Some(db) = &cli.database {
        settings.database = db.display().to_string();
    }
    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<Store, CliError> {
    let path = settings.database_path();
    Store::open(&path).map_err(|e| CliError::store(e).with_hint(format!("database: {}", path.display())))
}

fn take_lock<'a>(store: &'a Store, settings: &Settings) -> Result<RunLock<'a>, CliError> {
    let holder = format!("pid-{}-{}", std::process::id(), uuid::Uuid::new_v4());
    let stale_after = chrono::Duration::seconds(settings.lock.stale_after_secs as i64);
    store
        .lock(PIPELINE_LOCK, &holder, stale_after, Utc::now())
        .map_err(CliError::store)
}

fn sources(settings: &Settings) -> Result<Vec<Box<dyn SourceClient>>, CliError> {
    geoquiz_pipeline::build_sources(&settings.sources).map_err(CliError::pipeline)
}

/// Completion client, or the reason there is none.
fn completion_client(settings: &Settings) -> Result<OpenAIClient, CliError> {
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    OpenAIClient::from_resolved(&config).map_err(|e| {
        let hint = config
            .blocking_reason
            .clone()
            .unwrap_or_else(|| "run `geoquiz ai doctor`".to_string());
        CliError {
            code: ai_exit_code(&e),
            message: e.to_string(),
            hint: Some(hint),
        }
    })
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<(), CliError> {
    let out = if json {
        let mut s = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
        s.push('\n');
        s
    } else {
        text(value)
    };
    io::stdout()
        .lock()
        .write_all(out.as_bytes())
        .map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// seed / resync / apply / cycle
// ============================================================================

fn cmd_seed(settings: &Settings, json: bool) -> Result<(), CliError> {
    let sources = sources(settings)?;
    let store = open_store(settings)?;
    let _lock = take_lock(&store, settings)?;

    let summary = geoquiz_pipeline::seed(&store, &sources, Utc::now()).map_err(CliError::pipeline)?;
    emit(json, &summary, render::seed)
}

fn cmd_resync(settings: &Settings, json: bool) -> Result<(), CliError> {
    let sources = sources(settings)?;
    let store = open_store(settings)?;
    let _lock = take_lock(&store, settings)?;

    let summary = geoquiz_pipeline::Reconciler::new(&store, &sources)
        .resync(Utc::now())
        .map_err(CliError::pipeline)?;
    emit(json, &summary, render::resync)
}

fn cmd_apply(settings: &Settings, json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let _lock = take_lock(&store, settings)?;

    let summary = geoquiz_pipeline::apply_approved(&store, Utc::now()).map_err(CliError::pipeline)?;
    emit(json, &summary, render::apply)
}

fn cmd_cycle(settings: &Settings, json: bool) -> Result<(), CliError> {
    let sources = sources(settings)?;
    let client = match completion_client(settings) {
        Ok(client) => Some(client),
        Err(e) if e.code == EXIT_AI_DISABLED || e.code == EXIT_AI_MISSING_KEY => {
            tracing::info!("suggestions skipped: {}", e.message);
            None
        }
        Err(e) => return Err(e),
    };
    let store = open_store(settings)?;
    let _lock = take_lock(&store, settings)?;

    let service = client.as_ref().map(|c| c as &dyn CompletionService);
    let summary =
        geoquiz_pipeline::cycle(&store, &sources, service, Utc::now()).map_err(CliError::pipeline)?;
    emit(json, &summary, render::cycle)
}

// ============================================================================
// suggest
// ============================================================================

fn cmd_suggest(settings: &Settings, kind: Option<ReviewKind>, json: bool) -> Result<(), CliError> {
    let client = completion_client(settings)?;
    let store = open_store(settings)?;

    let mut summaries = Vec::new();
    if kind.is_none() || kind == Some(ReviewKind::Dispute) {
        summaries.push(geoquiz_pipeline::suggest_disputes(&store, &client).map_err(CliError::pipeline)?);
    }
    if kind.is_none() || kind == Some(ReviewKind::Gap) {
        summaries.push(geoquiz_pipeline::suggest_gaps(&store, &client).map_err(CliError::pipeline)?);
    }

    emit(json, &summaries, |all| all.iter().map(render::suggest).collect())
}

// ============================================================================
// report / review
// ============================================================================

fn cmd_report(
    settings: &Settings,
    country: String,
    question: String,
    answer: String,
    reporter: String,
    json: bool,
) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let report = NewDispute {
        reporter,
        question,
        label: country,
        correct_answer: answer,
    };
    let id = geoquiz_pipeline::report_question(&store, &report, Utc::now()).map_err(CliError::pipeline)?;

    emit(json, &serde_json::json!({ "kind": "dispute", "id": id }), |_| {
        format!("reported as dispute #{}\n", id)
    })
}

#[derive(Serialize)]
struct ReviewListing {
    #[serde(skip_serializing_if = "Option::is_none")]
    gaps: Option<Vec<geoquiz_store::GapReview>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disputes: Option<Vec<geoquiz_store::DisputeReview>>,
}

fn cmd_review_list(settings: &Settings, kind: Option<ReviewKind>, all: bool, json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;

    let disputes = match kind {
        Some(ReviewKind::Gap) => None,
        _ if all => Some(store.list_disputes().map_err(CliError::store)?),
        _ => Some(store.disputes_awaiting_decision().map_err(CliError::store)?),
    };
    let gaps = match kind {
        Some(ReviewKind::Dispute) => None,
        _ if all => Some(store.list_gaps().map_err(CliError::store)?),
        _ => Some(store.gaps_awaiting_decision().map_err(CliError::store)?),
    };

    let listing = ReviewListing { gaps, disputes };
    emit(json, &listing, |l| {
        let mut out = String::new();
        if let Some(d) = &l.disputes {
            out.push_str(&render::dispute_table(d));
        }
        if let Some(g) = &l.gaps {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&render::gap_table(g));
        }
        out
    })
}

enum Decide {
    Approve,
    Bypass,
}

fn cmd_review_decide(settings: &Settings, kind: ReviewKind, id: i64, decide: Decide, json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let (verb, result) = match decide {
        Decide::Approve => ("approved", geoquiz_pipeline::approve(&store, kind, id)),
        Decide::Bypass => ("bypassed", geoquiz_pipeline::bypass(&store, kind, id)),
    };
    result.map_err(CliError::pipeline)?;

    emit(
        json,
        &serde_json::json!({ "kind": kind.as_str(), "id": id, "decision": verb }),
        |_| format!("{} review #{} {}\n", kind, id, verb),
    )
}

// ============================================================================
// ledger
// ============================================================================

fn cmd_ledger(settings: &Settings, country: Option<String>, format: LedgerFormat) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let entries = store.ledger(country.as_deref()).map_err(CliError::store)?;

    match format {
        LedgerFormat::Table => emit(false, &entries, |e| render::ledger_table(e)),
        LedgerFormat::Json => emit(true, &entries, |_| String::new()),
        LedgerFormat::Csv => {
            render::ledger_csv(&entries, io::stdout().lock()).map_err(|e| CliError::io(e.to_string()))
        }
    }
}

// ============================================================================
// ai doctor
// ============================================================================

fn cmd_ai_doctor(settings: &Settings, json: bool) -> Result<(), CliError> {
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    let diag = AIDiagnostics::from_resolved(&config);

    emit(json, &diag, |d| d.to_string())?;

    match config.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: "AI is disabled".to_string(),
            hint: None,
        }),
        AIConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: config
                .blocking_reason
                .unwrap_or_else(|| "API key missing".to_string()),
            hint: None,
        }),
    }
}
