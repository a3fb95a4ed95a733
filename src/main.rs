// src/main.rs

use anyhow::Result;
use cellar::{
    Brewer, EngineConfig, Fetcher, HttpTransport, InstallReport, Installer, Ledger, Outcome,
    ShellRunner, load_formula_dir,
};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "cellar")]
#[command(author, version, about = "Build-from-source formula engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a formula and its dependencies
    Install {
        /// Formula name
        name: String,
        /// Directory of formula TOML files
        #[arg(short, long, default_value = "./formulas")]
        formula_dir: PathBuf,
        /// Engine state directory (default: /var/lib/cellar)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
        /// Keep build working directories for debugging
        #[arg(long)]
        keep_workdir: bool,
        /// Print the install report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a formula's test steps against its installed prefix
    Test {
        /// Formula name
        name: String,
        /// Directory of formula TOML files
        #[arg(short, long, default_value = "./formulas")]
        formula_dir: PathBuf,
        /// Engine state directory (default: /var/lib/cellar)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
    },
    /// Download and verify a formula's source without building
    Fetch {
        /// Formula name
        name: String,
        /// Directory of formula TOML files
        #[arg(short, long, default_value = "./formulas")]
        formula_dir: PathBuf,
        /// Engine state directory (default: /var/lib/cellar)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
    },
    /// List ledger entries
    List {
        /// Engine state directory (default: /var/lib/cellar)
        #[arg(short, long)]
        state_dir: Option<PathBuf>,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: clap_complete::Shell,
    },
}

fn engine_config(state_dir: Option<PathBuf>, keep_workdir: bool) -> EngineConfig {
    let config = match state_dir {
        Some(dir) => EngineConfig::for_state_dir(&dir),
        None => EngineConfig::default(),
    };
    config.with_keep_workdir(keep_workdir)
}

fn print_report(report: &InstallReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for formula in &report.formulas {
        match &formula.outcome {
            Outcome::Installed => println!("{}: installed", formula.name),
            Outcome::AlreadyInstalled => println!("{}: already installed", formula.name),
            Outcome::Failed { kind, detail } => {
                println!("{}: FAILED ({kind})\n  {detail}", formula.name)
            }
            Outcome::Skipped { reason } => println!("{}: skipped ({reason})", formula.name),
        }
    }
    Ok(())
}

fn run(cli: Cli) -> cellar::Result<()> {
    match cli.command {
        Commands::Install {
            name,
            formula_dir,
            state_dir,
            keep_workdir,
            json,
        } => {
            let config = engine_config(state_dir, keep_workdir);
            let universe = load_formula_dir(&formula_dir)?;
            let fetcher = Fetcher::new(
                config.source_cache.clone(),
                Box::new(HttpTransport::new()?),
                config.max_fetch_attempts,
                config.retry_base_delay,
            )
            .with_progress(true);
            let brewer = Brewer::new(
                Arc::new(ShellRunner::new(config.step_timeout)),
                config.keep_workdir,
            );
            let ledger = Ledger::open(&config.ledger_path)?;
            let engine = Installer::new(&universe, config, fetcher, brewer, ledger);

            info!("installing '{name}'");
            let report = engine.install(&name)?;
            if print_report(&report, json).is_err() {
                return Err(cellar::Error::InitError("failed to render report".into()));
            }
            if !report.succeeded() {
                if let Some(failure) = report.first_failure() {
                    if let Outcome::Failed { kind, .. } = &failure.outcome {
                        process::exit(exit_code_for_kind(kind));
                    }
                }
                process::exit(1);
            }
            Ok(())
        }
        Commands::Test {
            name,
            formula_dir,
            state_dir,
        } => {
            let config = engine_config(state_dir, false);
            let universe = load_formula_dir(&formula_dir)?;
            let fetcher = Fetcher::new(
                config.source_cache.clone(),
                Box::new(HttpTransport::new()?),
                config.max_fetch_attempts,
                config.retry_base_delay,
            );
            let brewer = Brewer::new(Arc::new(ShellRunner::new(config.step_timeout)), false);
            let ledger = Ledger::open(&config.ledger_path)?;
            let engine = Installer::new(&universe, config, fetcher, brewer, ledger);

            engine.test_only(&name)?;
            println!("{name}: tests passed");
            Ok(())
        }
        Commands::Fetch {
            name,
            formula_dir,
            state_dir,
        } => {
            let config = engine_config(state_dir, false);
            let universe = load_formula_dir(&formula_dir)?;
            let fetcher = Fetcher::new(
                config.source_cache.clone(),
                Box::new(HttpTransport::new()?),
                config.max_fetch_attempts,
                config.retry_base_delay,
            )
            .with_progress(true);
            let brewer = Brewer::new(Arc::new(ShellRunner::new(None)), false);
            let ledger = Ledger::open(&config.ledger_path)?;
            let engine = Installer::new(&universe, config, fetcher, brewer, ledger);

            let path = engine.fetch_only(&name)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::List { state_dir, json } => {
            let config = engine_config(state_dir, false);
            let ledger = Ledger::open(&config.ledger_path)?;
            let records = ledger.list()?;
            if json {
                let rendered = serde_json::to_string_pretty(&records)
                    .map_err(|e| cellar::Error::InitError(e.to_string()))?;
                println!("{rendered}");
            } else {
                for record in records {
                    println!(
                        "{:<24} {:<10} {}",
                        record.name, record.state, record.digest
                    );
                }
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "cellar", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn exit_code_for_kind(kind: &str) -> i32 {
    match kind {
        "unknown-dependency" | "cyclic-dependency" => 2,
        "missing-integrity-digest" | "integrity-mismatch" | "fetch-failed" | "download-error" => 3,
        "build-failed" => 4,
        "test-failed" => 5,
        _ => 1,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
    Ok(())
}
