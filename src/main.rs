use secure_proxy::app::App;
use secure_proxy::cli::{Cli, short_usage};
use secure_proxy::error::AppError;
use secure_proxy::{config, logging};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    // --version and --help exit here
    let cli = Cli::parse_args();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_usage() => {
            eprintln!("{}", e);
            eprintln!("{}", short_usage());
            ExitCode::from(e.exit_code())
        }
        Err(e) => {
            println!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let _guard = logging::init_logging(&cli.logging_config()).map_err(AppError::Logging)?;

    info!("secure-proxy {} starting...", env!("CARGO_PKG_VERSION"));

    let config = config::resolve(&cli.config_input())?;

    App::new(config).run().await?;

    info!("Shutdown complete");
    Ok(())
}
