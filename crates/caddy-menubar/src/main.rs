//! caddy entry point.

use std::process::ExitCode;

use tracing::error;

use caddy_menubar::AppConfig;

fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = caddy_core::init_tracing(config.tracing_config()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match caddy_menubar::launch(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exited with an error");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
