//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use toolscope_core::{Evaluator, ToolDirectory, classify};
use toolscope_shared::{
    AppConfig, FetchConfig, SourceCatalog, StatusRow, init_config, load_config, load_config_from,
    validate_survey_token,
};
use toolscope_storage::Storage;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// toolscope: evaluation console over the survey platform.
#[derive(Parser)]
#[command(
    name = "toolscope",
    version,
    about = "Per-tool evaluation summaries and coordinator workload from survey submissions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.toolscope/toolscope.toml.
    #[arg(long, global = true, env = "TOOLSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Aggregate and print the evaluation summary of one tool.
    Summary {
        /// Tool id as registered.
        tool_id: String,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// List registered tools with status and current coordinator.
    Tools,

    /// Show each coordinator's tool count and completed tools.
    Coordinators {
        /// Print the roster as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the question list of a form.
    Questions {
        /// Form (asset) id.
        form_id: String,
    },

    /// Local status sheet management.
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Status sheet subcommands.
#[derive(Subcommand)]
pub(crate) enum StatusAction {
    /// Import a JSON export of the status sheet (array of rows keyed by column header).
    Import {
        /// Path to the JSON export.
        file: PathBuf,
    },
    /// Show the stored row and classified status of one tool.
    Show {
        /// Tool id.
        tool_id: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "toolscope=info",
        1 => "toolscope=debug",
        _ => "toolscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Summary { tool_id, pretty } => cmd_summary(config_path, &tool_id, pretty).await,
        Command::Tools => cmd_tools(config_path).await,
        Command::Coordinators { json } => cmd_coordinators(config_path, json).await,
        Command::Questions { form_id } => cmd_questions(config_path, &form_id).await,
        Command::Status { action } => match action {
            StatusAction::Import { file } => cmd_status_import(config_path, &file).await,
            StatusAction::Show { tool_id } => cmd_status_show(config_path, &tool_id).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Build an evaluator from config, attaching the status sheet when one was imported.
async fn build_evaluator(config: &AppConfig) -> Result<Evaluator> {
    validate_survey_token(config)?;

    let evaluator = Evaluator::new(&FetchConfig::from(config), SourceCatalog::from(config))?;

    let db_path = config.status_db_path()?;
    if db_path.exists() {
        let storage = Storage::open_readonly(&db_path).await?;
        Ok(evaluator.with_status_sheet(storage))
    } else {
        debug!(path = %db_path.display(), "no status sheet imported, all tools read as active");
        Ok(evaluator)
    }
}

/// Spinner shown on stderr while sources are being fetched.
fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

async fn load_directory(evaluator: &Evaluator, progress: &ProgressBar) -> Result<ToolDirectory> {
    progress.set_message("Loading tool registrations");
    let directory = evaluator.load_directory().await?;
    if directory.is_empty() {
        return Err(eyre!("the registration form returned no tools"));
    }
    Ok(directory)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_summary(config_path: Option<&Path>, tool_id: &str, pretty: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let evaluator = build_evaluator(&config).await?;

    info!(tool_id, "aggregating evaluation");

    let progress = spinner("Starting")?;
    let directory = load_directory(&evaluator, &progress).await?;
    progress.set_message(format!("Aggregating {tool_id}"));
    let outcome = evaluator.aggregate(tool_id, &directory).await;
    progress.finish_and_clear();
    let summary = outcome?;

    debug!(fingerprint = %summary.fingerprint()?, "summary assembled");

    let json = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{json}");
    Ok(())
}

async fn cmd_tools(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let evaluator = build_evaluator(&config).await?;

    let progress = spinner("Starting")?;
    let mut directory = load_directory(&evaluator, &progress).await?;
    progress.set_message("Replaying coordinator reassignments");
    let roster = evaluator
        .coordinator_roster(&directory, &config.coordinator_names())
        .await;
    progress.finish_and_clear();

    directory.apply_assignments(&roster.assignments);
    evaluator.refresh_statuses(&mut directory).await?;

    println!();
    println!(
        "  {:<14} {:<28} {:<10} {:<8} Coordinator",
        "ID", "Name", "Maturity", "Status"
    );
    for tool in directory.tools() {
        println!(
            "  {:<14} {:<28} {:<10} {:<8} {}",
            tool.id,
            truncate(&tool.name, 28),
            tool.maturity_label,
            tool.status.to_string(),
            tool.coordinator_email
        );
    }
    println!();
    println!("  {} tools", directory.len());
    println!();
    Ok(())
}

async fn cmd_coordinators(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let evaluator = build_evaluator(&config).await?;

    let progress = spinner("Starting")?;
    let directory = load_directory(&evaluator, &progress).await?;
    progress.set_message("Building coordinator roster");
    let roster = evaluator
        .coordinator_roster(&directory, &config.coordinator_names())
        .await;
    progress.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&roster.coordinators)?);
        return Ok(());
    }

    println!();
    for coordinator in &roster.coordinators {
        println!("  {} <{}>", coordinator.display_name, coordinator.email);
        println!(
            "    Tools: {}  Completed: {}",
            coordinator.total_tools, coordinator.completed_tools
        );
        if !coordinator.completed_tool_ids.is_empty() {
            println!("    Done:  {}", coordinator.completed_tool_ids.join(", "));
        }
    }
    println!();
    Ok(())
}

async fn cmd_questions(config_path: Option<&Path>, form_id: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let evaluator = build_evaluator(&config).await?;

    let questions = evaluator.questions(form_id).await?;
    println!("{}", serde_json::to_string_pretty(&questions)?);
    Ok(())
}

async fn cmd_status_import(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;

    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let records: Vec<BTreeMap<String, serde_json::Value>> = serde_json::from_str(&content)
        .map_err(|e| eyre!("'{}' is not a JSON array of rows: {e}", file.display()))?;

    let rows = records
        .iter()
        .map(StatusRow::from_sheet_record)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let db_path = config.status_db_path()?;
    let storage = Storage::open(&db_path).await?;
    let written = storage.import_sheet(&rows).await?;

    info!(rows = written, path = %db_path.display(), "status sheet stored");
    println!("Imported {written} status rows into {}", db_path.display());
    Ok(())
}

async fn cmd_status_show(config_path: Option<&Path>, tool_id: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let db_path = config.status_db_path()?;

    let storage = Storage::open_readonly(&db_path)
        .await
        .map_err(|e| eyre!("{e}. Run `toolscope status import <file>` first."))?;
    let row = storage.get_status_row(tool_id.trim()).await?;

    match &row {
        Some(row) => {
            println!();
            println!("  Tool:            {}", row.tool_id);
            println!("  Status:          {}", row.status);
            println!("  Current step:    {}", row.current_step);
            println!("  Report sent:     {}", row.report_sent);
            println!("  Direct closed:   {}", row.direct_closed_at);
            println!("  Indirect closed: {}", row.indirect_closed_at);
        }
        None => {
            println!();
            println!("  No status sheet row for {tool_id}");
        }
    }
    println!("  Classified as:   {}", classify(row.as_ref()));
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
