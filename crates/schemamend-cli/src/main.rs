use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schemamend_catalog::{connect, DatabaseAdapter};
use schemamend_core::{
    ActionOutcome, Config, OutputFormat, Report, RunStatus, Severity, TableStatus,
};
use schemamend_engine::{Inspector, Pipeline, Reconciler, RunOptions};

/// schemamend - declarative schema reconciliation for application databases
#[derive(Parser)]
#[command(name = "schemamend")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: schemamend.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override database.url (also SCHEMAMEND_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live columns of declared tables
    Inspect {
        /// Inspect only this table
        #[arg(short, long)]
        table: Option<String>,

        /// Print the observed schema as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show discrepancies and the SQL a reconcile would run
    Plan,

    /// Bring the database in line with the declaration, then verify it
    Reconcile {
        /// Also drop columns declared obsolete
        #[arg(long)]
        allow_destructive: bool,

        /// Create the SQLite file if it does not exist (same as database.create)
        #[arg(long)]
        create: bool,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Run the smoke tests only
    Verify {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Full environment check without changing anything
    Check {
        #[command(flatten)]
        report: ReportArgs,
    },
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Report format: json or html (default from [report])
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    if cli.verbose {
        eprintln!(
            "{} {} ({} tables declared)",
            "Using".cyan(),
            config.database.engine,
            config.declaration.tables.len()
        );
    }

    match cli.command {
        Commands::Inspect { table, json } => inspect_command(&config, table.as_deref(), json).await,
        Commands::Plan => plan_command(&config).await,
        Commands::Reconcile { allow_destructive, create, report } => {
            let mut config = config;
            config.database.create |= create;

            let options = RunOptions::apply().with_destructive(allow_destructive);
            let result = Pipeline::new(config.clone())
                .with_options(options)
                .run_with_config()
                .await;
            finish(&config, result, &report, "Schema Reconciliation Report")
        }
        Commands::Verify { report } => {
            let pipeline = Pipeline::new(config.clone());
            let result = match connect(&config).await {
                Ok(adapter) => pipeline.verify(adapter.as_ref()).await,
                Err(e) => Report::fatal(config.database.engine.to_string(), e.to_string()),
            };
            finish(&config, result, &report, "Smoke Test Report")
        }
        Commands::Check { report } => {
            let result = Pipeline::new(config.clone())
                .with_options(RunOptions::dry_run())
                .run_with_config()
                .await;
            finish(&config, result, &report, "Environment Check Report")
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let default_path = Path::new("schemamend.toml");

    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if default_path.exists() {
        Config::from_file(default_path)?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    config.apply_env_overrides()?;
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn open(config: &Config) -> Result<Box<dyn DatabaseAdapter>> {
    let adapter = connect(config)
        .await
        .context("Failed to open database")?;
    adapter
        .test_connection()
        .await
        .context("Failed to connect to database")?;
    Ok(adapter)
}

/// Inspect command - print observed columns
async fn inspect_command(config: &Config, table: Option<&str>, json: bool) -> Result<()> {
    let adapter = open(config).await?;
    let inspector = Inspector::new(adapter.as_ref());

    let tables: Vec<String> = match table {
        Some(name) => vec![name.to_string()],
        None => config.declaration.table_names().into_iter().map(String::from).collect(),
    };

    if json {
        let mut observed = serde_json::Map::new();
        for name in &tables {
            let columns = inspector.inspect_table(name).await?;
            observed.insert(name.clone(), serde_json::to_value(columns)?);
        }
        println!("{}", serde_json::to_string_pretty(&observed)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Database:".bold(), format!("{} {}", adapter.name(), adapter.target()).green());
    println!("{}", "=".repeat(60).bright_blue());

    for name in &tables {
        let columns = inspector.inspect_table(name).await?;
        println!();
        if columns.is_empty() {
            println!("{} {}", name.bold(), "(missing)".red());
            continue;
        }

        let rows = adapter.count_rows(name).await?;
        println!("{} ({} rows)", name.bold(), rows);
        for column in &columns {
            println!(
                "  {:<24} {:<18} {:<9} {:<4} {}",
                column.name,
                column.declared_type,
                column.nullable.to_string(),
                column.key.to_string(),
                column.default.as_deref().unwrap_or("")
            );
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
    Ok(())
}

/// Plan command - discrepancies and SQL, nothing executed
async fn plan_command(config: &Config) -> Result<()> {
    let adapter = open(config).await?;

    let observed = Inspector::new(adapter.as_ref())
        .inspect(&config.declaration)
        .await?;
    let reconciler = Reconciler::new(&config.declaration, adapter.engine());
    let discrepancies = reconciler.discrepancies(&observed);
    let plan = reconciler.plan(&observed);

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Reconciliation Plan".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if discrepancies.is_empty() {
        println!("{}", "✓ Database matches the declaration".green().bold());
    } else {
        println!("{}", "Discrepancies:".bold());
        for discrepancy in &discrepancies {
            println!(
                "  [{}] {}: {}",
                severity_label(discrepancy.severity),
                discrepancy.kind,
                discrepancy.message
            );
        }
    }

    if !plan.is_empty() {
        println!();
        println!("{}", "Statements:".bold());
        for (i, action) in plan.iter().enumerate() {
            let marker = if action.destructive {
                " (destructive)".red().to_string()
            } else {
                String::new()
            };
            println!("  {}. {}{}", i + 1, action.description, marker);
            println!("     {};", action.sql.replace('\n', "\n     ").dimmed());
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
    Ok(())
}

/// Write the report, print the summary, exit 1 unless the run succeeded
fn finish(config: &Config, report: Report, args: &ReportArgs, title: &str) -> Result<()> {
    let format = args.format.unwrap_or(config.report.format);
    let output = args.output.as_ref().or(config.report.output.as_ref());

    match output {
        Some(path) => {
            let path = if path.is_relative() && args.output.is_none() {
                config.project_root.join(path)
            } else {
                path.clone()
            };
            report
                .save_to_file(&path, format)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
        None => println!("{}", report.render(format)?),
    }

    print_summary(&report, title);

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
        Severity::Info => "INFO".cyan(),
    }
}

/// Print run summary to stderr so stdout stays machine-readable
fn print_summary(report: &Report, title: &str) {
    eprintln!("\n{}", "=".repeat(60).bright_blue());
    eprintln!("{}", title.bold().bright_blue());
    eprintln!("{}", "=".repeat(60).bright_blue());
    eprintln!();

    eprintln!("Database: {}", report.database);
    let status = match report.status {
        RunStatus::Success => report.status.to_string().green().bold(),
        RunStatus::Degraded => report.status.to_string().yellow().bold(),
        RunStatus::Error => report.status.to_string().red().bold(),
    };
    eprintln!("Status:   {}", status);

    if let Some(error) = &report.error {
        eprintln!("{} {}", "Error:".red().bold(), error);
        eprintln!("{}", "=".repeat(60).bright_blue());
        return;
    }

    if !report.tables.is_empty() {
        eprintln!();
        eprintln!("{}", "Tables:".bold());
        for table in &report.tables {
            let status = match table.status {
                TableStatus::Ok => "ok".green(),
                TableStatus::Created | TableStatus::Altered => table.status.to_string().cyan(),
                TableStatus::Pending => "pending".yellow(),
                TableStatus::Failed => "failed".red().bold(),
            };
            let rows = report
                .demo_data
                .get(&table.name)
                .map(|n| format!("{} rows", n))
                .unwrap_or_else(|| "-".to_string());
            eprintln!("  {:<24} {:<10} {}", table.name, status, rows);
            if !table.uncovered_columns.is_empty() {
                eprintln!("    Missing: {}", table.uncovered_columns.join(", "));
            }
        }
    }

    if !report.actions.is_empty() {
        eprintln!();
        eprintln!("{}", "Actions:".bold());
        for record in &report.actions {
            let outcome = match &record.outcome {
                ActionOutcome::Applied { .. } => record.outcome.to_string().green(),
                ActionOutcome::Failed { .. } => record.outcome.to_string().red(),
                _ => record.outcome.to_string().yellow(),
            };
            eprintln!("  {} - {}", record.action.description, outcome);
        }
    }

    if !report.verification.is_empty() {
        eprintln!();
        eprintln!("{}", "Smoke tests:".bold());
        for result in &report.verification {
            if result.passed {
                eprintln!("  {} {}", "✓".green(), result.check);
            } else {
                eprintln!(
                    "  {} {}: {}",
                    "✗".red(),
                    result.check,
                    result.detail.as_deref().unwrap_or("")
                );
            }
        }
    }

    eprintln!();
    eprintln!("{}", "=".repeat(60).bright_blue());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_reconcile_flags() {
        let cli = Cli::try_parse_from([
            "schemamend",
            "--config",
            "demos/student-app/schemamend.toml",
            "reconcile",
            "--allow-destructive",
            "--create",
            "--format",
            "html",
            "--output",
            "report.html",
        ])
        .unwrap();

        match cli.command {
            Commands::Reconcile { allow_destructive, create, report } => {
                assert!(allow_destructive);
                assert!(create);
                assert_eq!(report.format, Some(OutputFormat::Html));
                assert_eq!(report.output, Some(PathBuf::from("report.html")));
            }
            _ => panic!("expected reconcile"),
        }
    }

    #[test]
    fn check_has_no_create_flag() {
        let parsed = Cli::try_parse_from(["schemamend", "check", "--create"]);
        assert!(parsed.is_err());
    }
}
