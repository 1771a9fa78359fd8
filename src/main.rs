use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sentiment_forecast::classifier::ModelKind;
use sentiment_forecast::config::{Config, LoggingConfig};
use sentiment_forecast::eda::{render_table, summarize};
use sentiment_forecast::eval::AucScore;
use sentiment_forecast::pipeline::{self, CompanyOutcome};
use sentiment_forecast::source::CsvSource;
use sentiment_forecast::store::{load_evaluation_records, FeatureStore};

#[derive(Parser)]
#[command(name = "sentiment-forecast")]
#[command(about = "Leak-free feature tables and next-day direction models from prices and news sentiment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to SF_CONFIG_PATH or config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and store the merged feature table of every company
    CollectData,
    /// Print a summary of the stored feature tables
    Eda,
    /// Fit a model per company and write evaluation records
    Train {
        /// forest, logistic or sequence
        #[arg(short, long, value_parser = parse_model, default_value = "forest")]
        model: ModelKind,
    },
    /// List stored evaluation records
    Summary,
}

fn parse_model(s: &str) -> Result<ModelKind, String> {
    ModelKind::parse(s).ok_or_else(|| {
        let known: Vec<&str> = ModelKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown model {:?}, expected one of {}", s, known.join(", "))
    })
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(file)
        }
        None => tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(logging.file.is_none());
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn report<T>(stage: &str, outcomes: &[CompanyOutcome<T>], describe: impl Fn(&T) -> String) -> Result<()> {
    for outcome in outcomes {
        match &outcome.result {
            Ok(value) => println!("{:<8} ok     {}", outcome.company, describe(value)),
            Err(e) => println!("{:<8} failed {:#}", outcome.company, e),
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        anyhow::bail!("{}: {} of {} companies failed", stage, failed, outcomes.len());
    }
    Ok(())
}

fn collect_data(config: &Config) -> Result<()> {
    let source = CsvSource::new(config.data.clone());
    let store = FeatureStore::open(&config.data.feature_store())?;
    let outcomes = pipeline::collect_data(config, &source, &source, &source, &store)?;
    report("collect-data", &outcomes, |rows| format!("{} rows", rows))
}

fn eda(config: &Config) -> Result<()> {
    let store = FeatureStore::open(&config.data.feature_store())?;
    let mut summaries = Vec::new();
    for company in config.run.company_ids() {
        let table = store
            .load(&company)?
            .with_context(|| format!("no feature table stored for {}; run collect-data first", company))?;
        summaries.push(summarize(&table)?);
    }
    print!("{}", render_table(&summaries));
    Ok(())
}

fn train(config: &Config, kind: ModelKind) -> Result<()> {
    let store = FeatureStore::open(&config.data.feature_store())?;
    let outcomes = pipeline::train_all(config, &store, kind)?;
    report("train", &outcomes, |r| {
        format!("accuracy {:.4} f1 {:.4} auc {}", r.accuracy, r.f1, auc_cell(&r.auc))
    })
}

fn auc_cell(auc: &AucScore) -> String {
    match auc {
        AucScore::Defined { value } => format!("{:.4}", value),
        AucScore::Undefined { .. } => "undefined".to_string(),
    }
}

fn summary(config: &Config) -> Result<()> {
    let records = load_evaluation_records(&config.data.results_dir())?;
    if records.is_empty() {
        println!("no evaluation records under {}", config.data.results_dir().display());
        return Ok(());
    }
    println!(
        "{:<20} {:<8} {:<9} {:>6} {:>8} {:>8} {:>10}",
        "created", "company", "model", "test", "accuracy", "f1", "auc"
    );
    for r in &records {
        println!(
            "{:<20} {:<8} {:<9} {:>6} {:>8.4} {:>8.4} {:>10}",
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.company,
            r.model_kind.as_str(),
            r.y_test.len(),
            r.accuracy,
            r.f1,
            auc_cell(&r.auc)
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::load_from_path(path)
        }
        None => Config::load(),
    };
    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging)?;
    tracing::info!(
        companies = ?config.run.company_ids(),
        start = %config.run.start_date,
        end = %config.run.end_date,
        "Starting sentiment-forecast"
    );

    match cli.command {
        Commands::CollectData => collect_data(&config),
        Commands::Eda => eda(&config),
        Commands::Train { model } => train(&config, model),
        Commands::Summary => summary(&config),
    }
}
