use std::process::ExitCode;

use jokebook::{Config, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jokebook: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(config.log_json);
    info!(?config, "configuration loaded");

    match jokebook::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
