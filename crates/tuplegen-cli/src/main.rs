//! tuplegen CLI - schema-probed record types and schema migrations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tuplegen::dialect::split_statements;
use tuplegen::version::LogProgress;
use tuplegen::{
    ColumnDescriptor, Config, ConnectionManager, MigrationStep, SchemaVersionEngine, TupleGenError,
    TypeFactory,
};

#[derive(Parser)]
#[command(name = "tuplegen")]
#[command(about = "Schema-probed record types and transactional schema migrations")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "tuplegen.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

/// What to probe: a query's result shape or a table.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// SQL query whose result shape is probed
    #[arg(long)]
    query: Option<String>,

    /// Table whose columns are probed
    #[arg(long)]
    table: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the column descriptors of a query or table
    Probe {
        #[command(flatten)]
        source: Source,
    },

    /// Probe, synthesize and build a record type
    Generate {
        /// Type name; unqualified names join the configured namespace
        #[arg(long)]
        name: String,

        #[command(flatten)]
        source: Source,
    },

    /// Apply *.sql files in a directory as ordered migration steps
    Migrate {
        /// Directory of migration scripts, applied in file name order
        #[arg(long)]
        dir: PathBuf,
    },

    /// Print the applied migration step count
    Status,

    /// Remove the generated files of a record type
    Destroy {
        /// Type name; unqualified names join the configured namespace
        #[arg(long)]
        name: String,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, TupleGenError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let db = ConnectionManager::connect(&config.database).await?;
    let result = execute(&cli, &config, &db).await;
    db.close().await;
    result
}

async fn execute(cli: &Cli, config: &Config, db: &ConnectionManager) -> Result<ExitCode, TupleGenError> {
    match &cli.command {
        Commands::Probe { source } => {
            let columns = match (&source.query, &source.table) {
                (Some(sql), _) => db.probe().probe_query(sql).await?,
                (None, Some(table)) => db.probe().probe_table(table).await?,
                (None, None) => return Err(TupleGenError::Config("--query or --table is required".into())),
            };
            print_columns(cli.output_json, &columns)?;
        }

        Commands::Generate { name, source } => {
            let factory = TypeFactory::new(db.clone(), &config.codegen);
            let artifact = match (&source.query, &source.table) {
                (Some(sql), _) => factory.generate_from_query(name, sql).await?,
                (None, Some(table)) => factory.generate_from_table(name, table).await?,
                (None, None) => return Err(TupleGenError::Config("--query or --table is required".into())),
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&artifact)?);
            } else if artifact.success {
                println!(
                    "Built {} version {} ({} columns)",
                    artifact.spec.qualified_name,
                    artifact.spec.version,
                    artifact.spec.columns.len()
                );
                println!("  Source: {}", artifact.source_path.display());
            } else {
                println!("Build of {} failed:", artifact.spec.qualified_name);
            }
            if !artifact.diagnostics.is_empty() {
                eprintln!("{}", artifact.diagnostics);
            }
            if !artifact.success {
                return Ok(ExitCode::from(6));
            }
        }

        Commands::Migrate { dir } => {
            let steps = load_steps(dir).await?;
            let engine = SchemaVersionEngine::from_config(db.clone(), &config.versioning)?;
            let start = Instant::now();
            let outcome = engine
                .migrate_with_progress(&steps, &mut LogProgress::default())
                .await?;

            if cli.output_json {
                let result = json!({
                    "previous": outcome.previous,
                    "applied": outcome.applied,
                    "current": outcome.current,
                    "duration_seconds": start.elapsed().as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Migration completed!");
                println!("  Previous version: {}", outcome.previous);
                println!("  Steps applied: {}", outcome.applied);
                println!("  Current version: {}", outcome.current);
            }
        }

        Commands::Status => {
            let engine = SchemaVersionEngine::from_config(db.clone(), &config.versioning)?;
            let applied = engine.applied_step_count().await?;
            if cli.output_json {
                let result = json!({ "table": engine.table(), "applied_steps": applied });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Schema version: {} ({})", applied, engine.table());
            }
        }

        Commands::Destroy { name } => {
            let factory = TypeFactory::new(db.clone(), &config.codegen);
            let removed = factory.destroy(name).await?;
            let qualified = factory.qualify(name);
            if cli.output_json {
                let result = json!({ "name": qualified, "removed": removed });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if removed {
                println!("Removed {}", qualified);
            } else {
                println!("Nothing to remove for {}", qualified);
            }
        }

        Commands::HealthCheck => {
            let start = Instant::now();
            let result = db.health_check().await;
            let latency_ms = start.elapsed().as_millis() as u64;

            if cli.output_json {
                let report = json!({
                    "dialect": config.database.dialect.to_string(),
                    "connected": result.is_ok(),
                    "latency_ms": latency_ms,
                    "error": result.as_ref().err().map(|e| e.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Database ({}): {} ({}ms)",
                    config.database.dialect,
                    if result.is_ok() { "OK" } else { "FAILED" },
                    latency_ms
                );
                if let Err(ref err) = result {
                    println!("    Error: {}", err);
                }
            }
            result?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_columns(output_json: bool, columns: &[ColumnDescriptor]) -> Result<(), TupleGenError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(columns)?);
        return Ok(());
    }
    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in columns {
        println!(
            "  {:<width$}  {:<10}  {}",
            column.name,
            column.semantic_type,
            column.source_type,
            width = width
        );
    }
    Ok(())
}

/// One step per `*.sql` file, in file name order.
async fn load_steps(dir: &Path) -> Result<Vec<MigrationStep>, TupleGenError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let mut steps = Vec::with_capacity(files.len());
    for path in files {
        let script = tokio::fs::read_to_string(&path).await?;
        let description = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        steps.push(MigrationStep::sql(description, split_statements(&script)));
    }
    Ok(steps)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
