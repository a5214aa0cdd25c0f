pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod events;
pub mod logging;
pub mod mailing;
pub mod models;
pub mod sessions;
pub mod state;
pub mod website;

use menva::read_default_file;
use tokio::{net::TcpListener, signal};

use config::Config;
use errors::AppError;
use logging::init_tracing;
use state::{App, AppState};
use website::get_router;

/// Reads the `EVENTLY_` environment, migrates the database and serves the
/// site until Ctrl+C or SIGTERM.
pub fn run() -> Result<(), AppError> {
    read_default_file();
    let config = Config::from_env_with_prefix(Config::ENV_PREFIX);
    let _guard = init_tracing(&config);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.worker_threads)
        .build()
        .map_err(|e| crate::log_and_wrap_custom_internal!(e))?
        .block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), AppError> {
    let addr = config.socket_addr();
    config.print();

    let app = App::new(config)?;
    app.database.run_migrations().await?;

    let router = get_router(AppState::new(app));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| crate::log_and_wrap_custom_internal!(e))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| crate::log_and_wrap_custom_internal!(e))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
