//! Transcoding worker binary.

use std::sync::Arc;

use rand::Rng;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transcoder_broker::{BrokerConfig, MessageBusAdapter};
use transcoder_storage::BlobStoreClient;
use transcoder_store::{pool, JobStore, StoreConfig};
use transcoder_worker::pipeline::ShellPipelineEngine;
use transcoder_worker::{WorkerConfig, WorkerRunner};

const WORKER_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const WORKER_ID_LEN: usize = 5;

fn generate_worker_id() -> String {
    let mut rng = rand::thread_rng();
    (0..WORKER_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..WORKER_ID_ALPHABET.len());
            WORKER_ID_ALPHABET[idx] as char
        })
        .collect()
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let env_filter = EnvFilter::from_default_env().add_directive("transcoder_worker=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry().with(fmt::layer().json()).with(env_filter).init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    let worker_id = generate_worker_id();
    info!(worker_id = %worker_id, "starting transcoder-worker");

    let config = WorkerConfig::from_env();

    let store_config = StoreConfig::from_env();
    let pg_pool = match pool::create_pool(&store_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("failed to connect to job store: {e}");
            std::process::exit(1);
        }
    };
    let jobs = JobStore::new(pg_pool);

    let broker = MessageBusAdapter::new(BrokerConfig::from_env()).with_queue_suffix(worker_id.clone());
    if let Err(e) = broker.connect().await {
        error!("failed to connect to broker: {e}");
        std::process::exit(1);
    }
    let broker = Arc::new(broker);

    let blob = match BlobStoreClient::from_env().await {
        Ok(blob) => Arc::new(blob),
        Err(e) => {
            error!("failed to create blob store client: {e}");
            std::process::exit(1);
        }
    };

    let runner = Arc::new(WorkerRunner::new(
        config,
        broker,
        jobs,
        blob,
        ShellPipelineEngine,
        worker_id,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let run_handle = tokio::spawn(Arc::clone(&runner).run(shutdown_rx));

    shutdown_signal().await;
    info!("received shutdown signal, draining in-flight jobs");
    let _ = shutdown_tx.send(true);

    let _ = run_handle.await;
    info!("transcoder-worker shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
