//! ipvsmeshd binary: loads the process environment, initializes logging,
//! and runs the supervisor until a stop signal arrives.

mod config;
mod control;
mod http_server;
mod supervisor;

use config::Configuration;
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Configuration::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Err(Box::new(e));
        }
    };

    if config.log_trace || config.log_debug || config.log_verbose {
        unsafe {
            std::env::set_var("RUST_LOG", config.log_filter());
        }
    }
    common::logging::init();

    if config.daemonize {
        tracing::warn!("IPVSMESH_DAEMONIZE is set but ipvsmeshd always runs in the foreground; run it under your process supervisor of choice instead");
    }

    tracing::info!(configfile = %config.configfile, socket = %config.socket, "ipvsmeshd starting");

    Supervisor::new(config).run().await
}
