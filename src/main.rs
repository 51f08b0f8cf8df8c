use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use cutover_lib::config::{Config, ConfigOverrides};
use cutover_lib::logging::{self, LoggingConfig};
use cutover_lib::migration::identity::LegacyKey;
use cutover_lib::migration::request::DEFAULT_LIMIT;
use cutover_lib::migration::write_run_report;
use cutover_lib::{db, AppError, MigrationRequest, Migrator, ModelRegistry};

#[derive(Debug, Parser)]
#[command(name = "cutover", about = "Legacy to target store migration", version)]
struct Cli {
    /// Legacy SQLite database (read only).
    #[arg(long, value_name = "PATH", global = true)]
    legacy_db: Option<PathBuf>,

    /// Target SQLite database.
    #[arg(long, value_name = "PATH", global = true)]
    target_db: Option<PathBuf>,

    /// Directory receiving one JSON report per chunk.
    #[arg(long, value_name = "DIR", global = true)]
    report_dir: Option<PathBuf>,

    /// Also write daily-rolling JSON logs here.
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Emit console logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate one chunk of the requested tables (dry run unless --apply).
    Run(RunArgs),
    /// Check that every table resolves on both stores.
    Check,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Comma separated table names or aliases. Defaults to every table.
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Write to the target store.
    #[arg(long)]
    apply: bool,

    /// Rows fetched per table per chunk (1..=10000).
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: u32,

    /// Resume point from an earlier report, e.g. `--cursor industries=40`.
    #[arg(long = "cursor", value_name = "TABLE=KEY", value_parser = parse_cursor)]
    cursors: Vec<(String, Option<LegacyKey>)>,

    /// Keep running chunks until every table is drained.
    #[arg(long)]
    drain: bool,

    /// Upper bound on chunks when draining.
    #[arg(long, default_value_t = 100)]
    max_chunks: usize,
}

impl RunArgs {
    fn to_request(&self) -> MigrationRequest {
        MigrationRequest {
            tables: (!self.tables.is_empty()).then(|| self.tables.clone()),
            dry_run: !self.apply,
            limit: self.limit,
            cursors: self.cursors.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_cursor(raw: &str) -> std::result::Result<(String, Option<LegacyKey>), String> {
    let (table, key) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=KEY, got `{raw}`"))?;
    let key = key.trim();
    let cursor = match key {
        "" | "null" => None,
        _ => Some(
            key.parse::<i64>()
                .map(LegacyKey::Int)
                .unwrap_or_else(|_| LegacyKey::Text(key.to_string())),
        ),
    };
    Ok((table.trim().to_string(), cursor))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            let app_error = AppError::from(err);
            eprintln!("Error: {app_error}");
            let mut cause = app_error.cause();
            while let Some(inner) = cause {
                eprintln!("  caused by: {inner}");
                cause = inner.cause();
            }
            process::exit(1);
        }
    }
}

async fn execute(cli: Cli) -> Result<i32> {
    let config = Config::resolve(ConfigOverrides {
        legacy_db: cli.legacy_db,
        target_db: cli.target_db,
        report_dir: cli.report_dir,
        log_dir: cli.log_dir,
        json_logs: cli.json_logs,
    })?;
    let _log_guard = logging::init(&LoggingConfig {
        json: config.json_logs,
        log_dir: config.log_dir.clone(),
        filter: None,
    })?;

    let legacy = db::open_legacy(&config.legacy_db).await?;
    let target = db::open_target(&config.target_db).await?;
    let registry = ModelRegistry::from_sqlite(&legacy, &target)
        .await
        .context("resolve tables")?;

    match cli.command {
        Command::Check => check(&registry),
        Command::Run(args) => run(&config, registry, &args).await,
    }
}

fn check(registry: &ModelRegistry) -> Result<i32> {
    for (table, legacy, target) in registry.describe() {
        println!("{:<22} {legacy} -> {target}", table.as_str());
    }
    Ok(0)
}

async fn run(config: &Config, registry: ModelRegistry, args: &RunArgs) -> Result<i32> {
    let migrator = Migrator::new(registry);
    let token = migrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "cutover", event = "migration_cancel_requested");
            token.cancel();
        }
    });

    let request = args.to_request();
    let reports = if args.drain {
        migrator.run_until_drained(&request, args.max_chunks).await?
    } else {
        vec![migrator.run(&request).await?]
    };

    for report in &reports {
        let path = write_run_report(&config.report_dir, report)?;
        tracing::info!(target: "cutover", event = "migration_report_written", path = %path.display());
    }

    let json = if args.drain {
        serde_json::to_string_pretty(&reports)
    } else {
        serde_json::to_string_pretty(&reports[0])
    }
    .context("serialize migration report")?;
    println!("{json}");

    let cancelled = reports.iter().any(|r| r.cancelled);
    Ok(if cancelled { 130 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_values_parse_as_int_text_or_null() {
        assert_eq!(
            parse_cursor("industries=40").unwrap(),
            ("industries".to_string(), Some(LegacyKey::Int(40)))
        );
        assert_eq!(
            parse_cursor("candidates=c-9").unwrap(),
            ("candidates".to_string(), Some(LegacyKey::Text("c-9".into())))
        );
        assert_eq!(parse_cursor("admins=null").unwrap(), ("admins".to_string(), None));
        assert!(parse_cursor("admins").is_err());
    }

    #[test]
    fn run_args_default_to_dry_run_over_everything() {
        let cli = Cli::parse_from(["cutover", "run", "--limit", "5", "--cursor", "occupations=3"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let request = args.to_request();
        assert!(request.dry_run);
        assert_eq!(request.tables, None);
        assert_eq!(request.limit, 5);
        assert_eq!(request.cursors.get("occupations"), Some(&Some(LegacyKey::Int(3))));
    }

    #[test]
    fn tables_split_on_commas() {
        let cli = Cli::parse_from(["cutover", "run", "--tables", "industries,job_occupations", "--apply"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let request = args.to_request();
        assert!(!request.dry_run);
        assert_eq!(
            request.tables,
            Some(vec!["industries".to_string(), "job_occupations".to_string()])
        );
    }
}
