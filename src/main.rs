use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Result, WrapErr};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tesa::client::PredictionClient;
use tesa::codec::{self, ExportOptions};
use tesa::config::{AppConfig, DEFAULT_CONFIG_FILE};
use tesa::label::{DatasetCode, ModelCode, SemanticClass};
use tesa::session::{Session, DEFAULT_SESSION_FILE};
use tesa::{metrics, reconcile, report};

#[derive(Parser)]
#[command(
    name = "tesa",
    about = "Review predicted sentiment labels against ground truth."
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "TESA_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to the session file
    #[arg(long, global = true, env = "TESA_SESSION", default_value = DEFAULT_SESSION_FILE)]
    session: PathBuf,

    /// Prediction backend base URL (overrides the config file)
    #[arg(long, global = true, env = "TESA_BACKEND_URL")]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an input CSV (requires a `text` column), replacing the session
    Load {
        input: PathBuf,
    },

    /// Send every text to the prediction backend
    Analyze,

    /// Set or clear the manual correction of one record
    Correct {
        id: String,
        /// Model code 0, 1 or 2, or `none` to clear
        label: String,
    },

    /// Attach true labels from a validation CSV (`text` + `label` columns)
    Validate {
        file: PathBuf,
    },

    /// Clear every true label
    ResetValidation,

    /// Show precision/recall/F1, macro-F1 and the confusion matrix
    Metrics {
        /// Output format
        #[arg(long, value_enum, default_value_t = MetricsFormat::Summary)]
        format: MetricsFormat,
    },

    /// Show record counts by status
    Status,

    /// Write results as CSV
    Export {
        /// Output file path (default depends on --full)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the full diagnostic export
        #[arg(long)]
        full: bool,

        /// Leave out the ID column
        #[arg(long)]
        no_id: bool,

        /// Leave out the text column
        #[arg(long)]
        no_text: bool,
    },

    /// Show or change the dataset label mapping
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MetricsFormat {
    /// Human-readable tables
    Summary,
    /// JSON document
    Json,
}

#[derive(Subcommand)]
enum MappingAction {
    /// Print the current mapping
    Show,
    /// Map a dataset code to a class, swapping with the code that held it
    Set {
        code: u8,
        /// negative, neutral or positive
        class: String,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)
        .wrap_err_with(|| format!("Failed to load config {:?}", cli.config))?;
    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

fn cmd_load(session_path: &Path, input: &Path) -> Result<()> {
    let text =
        fs::read_to_string(input).wrap_err_with(|| format!("Failed to read input {:?}", input))?;
    let name = input.file_name().map(|n| n.to_string_lossy().to_string());
    let session = Session::from_input(name.as_deref(), &text)
        .wrap_err_with(|| format!("Rejected input file {:?}", input))?;
    session.save(session_path)?;
    println!("Loaded {} records from {}", session.records.len(), input.display());
    Ok(())
}

async fn cmd_analyze(config: &AppConfig, session_path: &Path) -> Result<()> {
    let mut session = Session::load(session_path)?;
    let client = PredictionClient::new(
        &config.backend_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let predictions = client
        .predict_all(&session.texts(), config.batch_size)
        .await?;
    session.records = reconcile::apply_predictions(&session.records, &predictions)?;
    session.save(session_path)?;
    print!("{}", report::format_session_summary(&session.summary()));
    Ok(())
}

fn cmd_correct(session_path: &Path, id: &str, label: &str) -> Result<()> {
    let label = match label.trim().to_ascii_lowercase().as_str() {
        "none" | "" => None,
        other => Some(
            ModelCode::parse(other)
                .ok_or_else(|| eyre::eyre!("Label must be 0, 1, 2 or none, got {:?}", other))?,
        ),
    };
    let mut session = Session::load(session_path)?;
    session.records = reconcile::set_correction(&session.records, id, label)?;
    session.save(session_path)?;
    Ok(())
}

fn cmd_validate(session_path: &Path, file: &Path) -> Result<()> {
    let text =
        fs::read_to_string(file).wrap_err_with(|| format!("Failed to read {:?}", file))?;
    let parsed = codec::parse_validation(&text)
        .wrap_err_with(|| format!("Rejected validation file {:?}", file))?;
    let mut session = Session::load(session_path)?;
    let outcome = reconcile::apply_validation(&session.records, &parsed.rows);
    session.records = outcome.records;
    session.save(session_path)?;

    let s = outcome.stats;
    println!(
        "Matched {} records (id: {}, text: {}, position: {}); {} unmatched",
        s.matched(),
        s.by_id,
        s.by_text,
        s.by_position,
        s.unmatched
    );
    Ok(())
}

fn cmd_reset_validation(session_path: &Path) -> Result<()> {
    let mut session = Session::load(session_path)?;
    session.records = reconcile::reset_validation(&session.records);
    session.save(session_path)?;
    Ok(())
}

fn cmd_metrics(config: &AppConfig, session_path: &Path, format: MetricsFormat) -> Result<()> {
    let session = Session::load(session_path)?;
    let snapshot = metrics::compute_metrics(&session.records, &config.label_mapping);
    match format {
        MetricsFormat::Json => println!("{}", report::format_metrics_json(snapshot.as_ref())?),
        MetricsFormat::Summary => print!("{}", report::format_metrics_summary(snapshot.as_ref())),
    }
    Ok(())
}

fn cmd_export(
    config: &AppConfig,
    session_path: &Path,
    output: Option<PathBuf>,
    full: bool,
    no_id: bool,
    no_text: bool,
) -> Result<()> {
    let session = Session::load(session_path)?;
    let mapping = config.label_mapping;
    let (text, default_name) = if full {
        (
            codec::export_full_csv(&session.records, &mapping),
            codec::FULL_EXPORT_FILE_NAME,
        )
    } else {
        let options = ExportOptions {
            include_id: config.export.include_id && !no_id,
            include_text: config.export.include_text && !no_text,
        };
        (
            codec::export_csv(&session.records, &mapping, options),
            codec::EXPORT_FILE_NAME,
        )
    };
    let path = output.unwrap_or_else(|| PathBuf::from(default_name));
    fs::write(&path, text).wrap_err_with(|| format!("Failed to write output to {:?}", path))?;
    println!("Wrote {} records to {}", session.records.len(), path.display());
    Ok(())
}

fn cmd_mapping(config_path: &Path, mut config: AppConfig, action: MappingAction) -> Result<()> {
    if let MappingAction::Set { code, class } = action {
        let code = DatasetCode::new(code as i64)
            .ok_or_else(|| eyre::eyre!("Dataset code must be 0, 1 or 2, got {}", code))?;
        let class = SemanticClass::parse(&class)
            .ok_or_else(|| eyre::eyre!("Unknown class {:?}", class))?;
        config.label_mapping = config.label_mapping.set(code, class);
        config.save(config_path)?;
    }
    print!("{}", report::format_mapping(&config.label_mapping));
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(cli);

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let session = cli.session.as_path();

    match cli.command {
        Commands::Load { input } => cmd_load(session, &input),
        Commands::Analyze => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd_analyze(&config, session))
        }
        Commands::Correct { id, label } => cmd_correct(session, &id, &label),
        Commands::Validate { file } => cmd_validate(session, &file),
        Commands::ResetValidation => cmd_reset_validation(session),
        Commands::Metrics { format } => cmd_metrics(&config, session, format),
        Commands::Status => {
            let s = Session::load(session)?;
            print!("{}", report::format_session_summary(&s.summary()));
            Ok(())
        }
        Commands::Export {
            output,
            full,
            no_id,
            no_text,
        } => cmd_export(&config, session, output, full, no_id, no_text),
        Commands::Mapping { action } => cmd_mapping(&cli.config, config, action),
    }
}
