use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use roomkeep::cli::{self, Cli, CliError};
use roomkeep::config::Config;
use roomkeep::engine::Engine;
use roomkeep::notify::NotifyHub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::new(
        config.wal_path(),
        config.engine.clone(),
        Arc::new(NotifyHub::new()),
    )?);

    if let Some(cmd) = cli.command {
        let ok = run(&engine, cmd).await;
        if let Err(e) = engine.maybe_compact().await {
            tracing::warn!("compaction failed: {e}");
        }
        std::process::exit(if ok { 0 } else { 1 });
    }

    info!("roomkeep shell, data_dir: {}", config.data_dir.display());
    info!("  max_rooms: {}", config.engine.max_rooms);
    let compactor = tokio::spawn(roomkeep::compactor::run_compactor(engine.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match cli::parse_line(&line) {
            Ok(cmd) => {
                run(&engine, cmd).await;
            }
            Err(CliError::Empty) => {}
            // Help and usage text come back from clap as errors.
            Err(CliError::Parse(e)) => eprint!("{e}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    compactor.abort();
    info!("roomkeep stopped");
    Ok(())
}

async fn run(engine: &Engine, cmd: cli::Command) -> bool {
    let label = cmd.label();
    match cli::execute(engine, cmd).await {
        Ok(value) => {
            println!("{value}");
            true
        }
        Err(e) => {
            if e.is_retryable() {
                tracing::error!("{label} failed: {e}");
            }
            eprintln!("error ({}): {}", e.kind().label(), e.public_message());
            false
        }
    }
}
