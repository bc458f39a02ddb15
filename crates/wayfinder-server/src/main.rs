//! Main entry point for the Wayfinder registry server.

use tracing::{error, info};
use wayfinder_registry::{ExpirySweeper, Registry};
use wayfinder_server::{
    model::config::Configuration,
    startup::{
        self, join_background, registry_server, run_with_shutdown, wait_for_shutdown_signal,
    },
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let logging_config = configuration.logging_config();
    let _logging_guard = startup::init_logging(&logging_config)?;

    let registry_config = configuration.registry_config()?;
    let registry = match Registry::from_config(&registry_config).await {
        Ok(registry) => registry,
        Err(e) => {
            error!(backend = %registry_config.backend, error = %e, "Failed to build registry backend");
            return Err(e.into());
        }
    };

    let sweeper = registry_config
        .sweep_interval()
        .map(|interval| ExpirySweeper::new(registry.storage(), interval));
    let sweeper_task = sweeper.as_ref().and_then(ExpirySweeper::start);

    let address = configuration.server_address();
    let port = configuration.server_port();
    info!(
        address = %address,
        port,
        backend = registry.backend(),
        "Starting Wayfinder registry server"
    );

    let server = registry_server(registry.clone(), address, port)?;
    let server_handle = server.handle();
    let shutdown = wait_for_shutdown_signal();
    let mut server_task = tokio::spawn(server);

    let served = match run_with_shutdown(&mut server_task, shutdown.subscribe()).await {
        Some(result) => result,
        None => {
            server_handle.stop(true).await;
            server_task.await
        }
    };

    if let Some(sweeper) = sweeper {
        sweeper.stop();
        if let Some(task) = sweeper_task {
            join_background("expiry-sweeper", task).await;
        }
    }

    if let Err(e) = registry.close().await {
        error!(error = %e, "Failed to close registry backend");
    }
    info!("Wayfinder registry server stopped");

    match served {
        Ok(result) => result.map_err(Into::into),
        Err(e) => Err(anyhow::anyhow!("server task failed: {}", e)),
    }
}
