use std::fs::{self, File};
use std::process::ExitCode;
use std::sync::Arc;

use bookhaven::catalog::{LocalRepository, Schedulers, UseCases};
use bookhaven::cli::{Args, Session};
use bookhaven::core::config;
use clap::Parser;
use simplelog::{ConfigBuilder, WriteLogger};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let loaded = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let command = args.command.unwrap_or_default();
    let resolved = config::resolve(&loaded, args.data_file.as_deref(), command.sort());

    // Initialize file logger next to the catalog unless configured elsewhere
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Some(parent) = resolved.log_file.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(resolved.log_level, log_config, log_file);
    }

    log::info!("BookHaven starting up with catalog: {}", resolved.data_file.display());

    let repository = match LocalRepository::open(&resolved.data_file) {
        Ok(repo) => repo,
        Err(e) => {
            log::error!("Failed to open catalog: {}", e);
            eprintln!("cannot open {}: {e}", resolved.data_file.display());
            return ExitCode::FAILURE;
        }
    };

    let schedulers = Schedulers::current();
    let session = Session {
        use_cases: UseCases::new(&schedulers, Arc::new(repository)),
        main: schedulers.main.clone(),
        default_sort: resolved.default_sort,
    };

    let mut stdout = std::io::stdout().lock();
    match session.run(command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::warn!("Command failed: {}", e);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
