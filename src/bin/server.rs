//! Server entrypoint: wires `Settings` from the environment, a Postgres
//! pool, the HTTP router, and the background import worker, then runs both
//! until a shutdown signal arrives.

use std::sync::Arc;

use rowledger::api::{router, AppState};
use rowledger::commit_builder::CommitBuilder;
use rowledger::config::Settings;
use rowledger::errors::Result;
use rowledger::store::PgStore;
use rowledger::table_reader::TableReader;
use rowledger::worker::ImportWorker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Arc::new(Settings::from_env());

    let pool = sea_orm::Database::connect(&settings.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    let commit_builder = Arc::new(CommitBuilder::new(store.clone(), store.clone()));
    let table_reader = Arc::new(TableReader::new(store.clone(), store.clone()));

    let worker = ImportWorker::new(
        store.clone(),
        store.clone(),
        store.clone(),
        commit_builder.clone(),
        settings.import_batch_size,
        settings.canonicalize_parallel_threshold,
    );
    worker.recover_crashed_jobs().await?;

    let worker_settings = settings.clone();
    let worker_handle = tokio::spawn(async move {
        worker.run_forever(worker_settings.job_poll_interval).await;
    });

    let app = router(AppState {
        datasets: store.clone(),
        refs: store.clone(),
        commits: store.clone(),
        jobs: store.clone(),
        table_reader,
        commit_builder,
        settings: settings.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!(addr = %settings.server_addr, "rowledger listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server => result?,
        _ = worker_handle => {
            tracing::error!("import worker task exited unexpectedly");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
