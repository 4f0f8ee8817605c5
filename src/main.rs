//! edustat - education statistics data entry and insights
//!
//! A CLI tool for entering survey counts scoped by country and academic
//! year, rendering them with totals and gender parity indicators, and
//! asking an LLM for narrative insights over the loaded data. Overviews
//! cover worksheet status per scope and institution totals per region.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid arguments, config, store or schema failure)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod narrative;
mod overview;
mod report;
mod session;
mod store;
mod survey;

use anyhow::{bail, Context, Result};
use cli::{Args, CellAssignment, Command, OutputFormat};
use config::{Config, StoreBackend, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{FormReport, Scope};
use narrative::{DatasetKind, NarrativeService};
use session::FormSession;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use store::{FileStore, MemoryStore, RestStore, SurveyStore};
use survey::FormKind;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

type DynStore = Arc<dyn SurveyStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("edustat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .edustat.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set your country, store backend and LLM endpoint.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the subcommand. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command.clone() {
        Command::Forms => {
            print_forms();
            Ok(0)
        }
        Command::Show { form, output, .. } => run_show(&config, form, output).await,
        Command::Set { form, table, cells } => run_set(&config, form, table, cells).await,
        Command::Ask { form, question, .. } => run_ask(&config, form, &question, args.quiet).await,
        Command::Status { .. } => run_status(&config).await,
        Command::Regional { .. } => run_regional(&config).await,
        Command::InitConfig => {
            handle_init_config()?;
            Ok(0)
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Build the configured storage backend.
fn open_store(config: &Config) -> Result<DynStore> {
    let store: DynStore = match config.store.backend {
        StoreBackend::File => Arc::new(FileStore::new(config.store.data_dir.clone())),
        StoreBackend::Rest => {
            let Some(ref url) = config.store.rest_url else {
                bail!("The rest backend needs a URL (--rest-url or SUPABASE_URL)");
            };
            Arc::new(RestStore::new(
                url,
                config.store.api_key.clone(),
                Some(config.store.timeout_seconds),
            )?)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    info!("Using store: {}", store.describe());
    Ok(store)
}

/// The configured academic year, or the store's active one.
async fn resolve_year(config: &Config, store: &DynStore) -> Result<i64> {
    if let Some(id) = config.general.academic_year_id {
        return Ok(id);
    }

    let year = store
        .active_academic_year()
        .await
        .context("Failed to look up the active academic year")?;
    match year {
        Some(year) => {
            info!("Using active academic year {} (id {})", year.year_label, year.id);
            Ok(year.id)
        }
        None => bail!("No academic year selected and none is marked active (use --year)"),
    }
}

/// Work out the (country, academic year) pair.
async fn resolve_scope(config: &Config, store: &DynStore) -> Result<Scope> {
    let Some(country_id) = config.general.country_id else {
        bail!("No country selected (use --country or set general.country_id)");
    };
    let academic_year_id = resolve_year(config, store).await?;

    Ok(Scope::new(country_id, academic_year_id))
}

/// Open a session for `form` and load its rows.
///
/// With `strict` unset a failed load leaves the form empty and only prints a
/// notice.
async fn open_session(
    config: &Config,
    form: FormKind,
    strict: bool,
) -> Result<FormSession<DynStore>> {
    let store = open_store(config)?;
    let scope = resolve_scope(config, &store).await?;

    let mut session = FormSession::new(store, form, scope);
    session.form().validate()?;
    match session.load().await {
        Ok(loaded) => {
            info!(
                "Loaded {} rows ({} cells, {} skipped) for {}",
                loaded.rows, loaded.cells, loaded.skipped, scope
            );
            if loaded.skipped > 0 {
                warn!("{} stored rows did not fit the form and were ignored", loaded.skipped);
            }
        }
        Err(e) if !strict => {
            warn!("Load failed, showing an empty form: {}", e);
            eprintln!("⚠️  Could not load {} for {}: {}", form, scope, e);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load {} for {}", form, scope));
        }
    }

    Ok(session)
}

/// Add the year-over-year trend to enrollment reports. A failed lookup
/// only costs the trend.
async fn attach_trend(session: &FormSession<DynStore>, report: &mut FormReport) {
    let Some(indicators) = report.indicators.as_mut() else {
        return;
    };
    match overview::enrollment_trend(session.store(), session.scope()).await {
        Ok(Some(trend)) => indicators.with_trend(trend),
        Ok(None) => debug!("No earlier enrollment for {}", session.scope()),
        Err(e) => warn!("Could not compute the enrollment trend: {}", e),
    }
}

async fn run_show(config: &Config, form: FormKind, output: Option<PathBuf>) -> Result<i32> {
    let session = open_session(config, form, false).await?;
    let mut report = report::build_report(&session, config.report.include_empty_rows)?;
    attach_trend(&session, &mut report).await;

    let content = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match output {
        Some(path) => {
            report::write_report(&content, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => print!("{}", content),
    }

    Ok(0)
}

async fn run_set(
    config: &Config,
    form: FormKind,
    table: Option<String>,
    cells: Vec<CellAssignment>,
) -> Result<i32> {
    // Saving rewrites the whole scope, so the stored counts are loaded first.
    let mut session = open_session(config, form, true).await?;

    let table = match table {
        Some(table) => table,
        None => match session.form().tables.first() {
            Some(schema) => schema.name.to_string(),
            None => bail!("Form {} has no tables", form),
        },
    };

    for cell in &cells {
        let value = session
            .set_input(&table, cell.values.as_slice(), &cell.raw)
            .with_context(|| format!("Cannot set {}", cell.values.join(",")))?;
        debug!("{} [{}] = {}", table, cell.values.join(","), value);
    }

    if !session.is_dirty() {
        println!("Nothing to save for {}", session.scope());
        return Ok(0);
    }

    match session.save().await {
        Ok(saved) => {
            println!(
                "✅ Saved {} for {}: {} rows across {} tables",
                form,
                session.scope(),
                saved.rows,
                saved.tables
            );
            Ok(0)
        }
        Err(e) => {
            error!("Save failed: {}", e);
            eprintln!("\n❌ Save failed, nothing was marked as saved: {}", e);
            Ok(1)
        }
    }
}

async fn run_ask(config: &Config, form: FormKind, question: &str, quiet: bool) -> Result<i32> {
    let session = open_session(config, form, false).await?;
    let mut report = report::build_report(&session, false)?;
    attach_trend(&session, &mut report).await;
    let dataset = serde_json::to_value(&report).context("Failed to serialize the dataset")?;

    let service = NarrativeService::from_config(config.llm.to_chat_config());

    let spinner = if quiet || !service.is_configured() {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Asking the model...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let answer = service
        .ask(question, &dataset, DatasetKind::for_form(form))
        .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    println!("{}", answer);
    Ok(0)
}

async fn run_status(config: &Config) -> Result<i32> {
    let store = open_store(config)?;
    let scope = resolve_scope(config, &store).await?;
    let statuses = overview::worksheet_statuses(&store, scope)
        .await
        .with_context(|| format!("Failed to load worksheet status for {}", scope))?;

    let content = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&statuses)?,
        OutputFormat::Markdown => report::generate_status_markdown(scope, &statuses),
    };
    print!("{}", content);
    Ok(0)
}

async fn run_regional(config: &Config) -> Result<i32> {
    let store = open_store(config)?;
    let academic_year_id = resolve_year(config, &store).await?;
    let summary = overview::regional_summary(&store, academic_year_id)
        .await
        .with_context(|| format!("Failed to sum institutions for academic year {}", academic_year_id))?;

    let content = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&summary)?,
        OutputFormat::Markdown => report::generate_regional_markdown(&summary),
    };
    print!("{}", content);
    Ok(0)
}

fn print_forms() {
    for kind in FormKind::all() {
        let schema = kind.schema();
        println!("📋 {} - {}", kind, schema.title);
        for table in &schema.tables {
            let dims: Vec<&str> = table.dimensions.iter().map(|d| d.name).collect();
            println!(
                "   {} ({} cells): {}",
                table.name,
                table.cell_count(),
                dims.join(", ")
            );
        }
    }
}
