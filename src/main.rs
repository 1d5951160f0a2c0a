//! SmartLedger CLI entry point

use std::process::ExitCode;

use clap::Parser;

use smart_ledger::cli::{
    app::{init_tracing, load_merged_config, AppContext, CommandError, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    commands::{
        handle_parse, handle_session_command, handle_sync, handle_transcribe, handle_usage,
        handle_webhook,
    },
    config_cmd::handle_config_command,
    presenter::Presenter,
    watch_app::run_watch,
};
use smart_ledger::domain::config::{AppConfig, StoreBackend};
use smart_ledger::domain::error::ConfigError;
use smart_ledger::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut presenter = Presenter::new();

    // Config commands work on the file alone
    if let Commands::Config { action } = cli.command {
        let store = XdgConfigStore::new();
        return match handle_config_command(action, &store, &presenter).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                presenter.error(&e.to_string());
                ExitCode::from(exit_code_for_config(&e))
            }
        };
    }

    // Build CLI config from args
    let cli_config = AppConfig {
        store: cli.store.map(|s| StoreBackend::from(s).to_string()),
        database_path: cli.database.map(|p| p.to_string_lossy().into_owned()),
        service_key: cli.service_key,
        ..AppConfig::empty()
    };

    let config = load_merged_config(cli_config).await;
    let ctx = AppContext::new(config);

    let result = match cli.command {
        Commands::Session { action } => handle_session_command(action, &ctx, &presenter).await,
        Commands::Usage { action } => handle_usage(action, &ctx, &presenter).await,
        Commands::Parse { text } => handle_parse(&text, &ctx, &presenter).await,
        Commands::Transcribe { file } => handle_transcribe(&file, &ctx, &mut presenter).await,
        Commands::Sync => handle_sync(&ctx, &mut presenter).await,
        Commands::Watch { interval } => run_watch(&ctx, interval, &presenter).await,
        Commands::Webhook { file } => handle_webhook(&file, &ctx, &presenter).await,
        Commands::Config { .. } => unreachable!("handled above"),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            presenter.error(&e.to_string());
            let code = match e {
                CommandError::Config(ref c) => exit_code_for_config(c),
                _ => EXIT_ERROR,
            };
            ExitCode::from(code)
        }
    }
}

fn exit_code_for_config(e: &ConfigError) -> u8 {
    match e {
        ConfigError::ValidationError { .. } => EXIT_USAGE_ERROR,
        _ => EXIT_ERROR,
    }
}
