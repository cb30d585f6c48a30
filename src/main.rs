use anyhow::{Context, Result};
use clap::Parser;
use college_sync::{
    import_applications_from_csv, setup_database, source_file_name, FileConfig, ImportConfig,
    ImportError, ImportOptions, RunSummary,
};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sync the college applications database with a district CSV snapshot.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the applications CSV file
    csv: PathBuf,

    /// SQLite database file
    #[arg(long, env = "COLLEGE_SYNC_DB")]
    db: Option<PathBuf>,

    /// District every imported student belongs to
    #[arg(long, env = "COLLEGE_SYNC_TENANT")]
    tenant: Option<String>,

    /// TOML config file (defaults to ./college-sync.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Run the full import, then roll it back
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays a clean summary
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "college_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("❌ {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let file_config = FileConfig::load(cli.config.as_deref())?;
    let config = ImportConfig::resolve(cli.db.clone(), cli.tenant.clone(), file_config)?;

    // Don't create a database for a file we can't read anyway
    if let Err(source) = std::fs::metadata(&cli.csv) {
        return Err(ImportError::UnreadableFile {
            path: cli.csv.clone(),
            source,
        }
        .into());
    }

    let mut conn = Connection::open(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    setup_database(&conn)?;

    let options = ImportOptions {
        tenant: config.tenant.clone(),
        dry_run: cli.dry_run,
    };

    match import_applications_from_csv(&mut conn, &cli.csv, &options) {
        Ok(summary) => print_summary(&summary, cli.json),
        Err(error) => {
            if error.missing_columns().is_some() {
                let source_file = source_file_name(&cli.csv);
                print_summary(&RunSummary::failed(&config.tenant, &source_file, &error), cli.json)?;
            }
            Err(error.into())
        }
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", summary);
    }
    Ok(())
}
