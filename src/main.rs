use std::process::ExitCode;

use alpha_trading::application::environment::{Environment, EnvironmentError};
use alpha_trading::config::AppConfig;
use alpha_trading::logging::{self, LogSettings};
use clap::Parser;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Alpha Vantage trading ledger", long_about = None)]
struct Args {
    /// Write DEBUG records to the log file
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let guard = match logging::init(&LogSettings {
        log_dir: config.environment.log_dir.clone(),
        verbose: args.verbose,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!(
        "Logging to {} ({})",
        guard.log_file().display(),
        guard.file_filter()
    );

    let env = match Environment::new(config).await {
        Ok(env) => env,
        Err(e) => {
            error!("Failed to set up environment: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&env).await;
    env.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Report the session user, the wallet and the profit of every configured symbol.
async fn run(env: &Environment) -> Result<(), EnvironmentError> {
    info!("{}", env.user().first_name);
    info!("Wallet: ${:.2}", env.wallet().balance);

    for symbol in &env.config().general.symbols {
        let profit = env.ledger().profit(symbol).await?;
        info!("{} Profit:", symbol);
        info!("{}", profit);
    }

    Ok(())
}
