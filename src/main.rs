//! `tscan` batch entrypoint: `tscan <manifest.json>`.

use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::signal;

use tscan::cache::ResultStore;
use tscan::classifier::{CandleClassifier, ClassifierConfig, PatchClassifier};
use tscan::config::Config;
use tscan::pipeline::{Pipeline, RunOptions, StopFlag, read_manifest};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let manifest_path = std::env::args()
        .nth(1)
        .context("usage: tscan <manifest.json>")?;

    let config = Config::from_env()?;
    config.validate()?;
    let params = config.load_params()?;
    let groups = read_manifest(&manifest_path)?;

    tracing::info!(
        groups = groups.len(),
        storage_path = %config.storage_path.display(),
        workers = config.workers,
        infer_chunk = config.infer_chunk,
        "tscan starting"
    );

    let classifier = CandleClassifier::load(ClassifierConfig::from_params(&params))?;
    classifier
        .warm_up()
        .context("classifier warm-up failed, refusing to run")?;
    tracing::info!(model_loaded = classifier.is_model_loaded(), "Classifier ready");

    let store = ResultStore::open_dir(&config.storage_path, config.store_config())?;
    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(classifier),
        params,
        RunOptions {
            workers: config.workers,
            infer_chunk: config.infer_chunk,
        },
    );

    tokio::spawn(stop_on_signal(pipeline.stop_flag()));

    let outcome = pipeline
        .run(&groups, |update| {
            tracing::info!(
                processed = update.processed,
                total = update.total,
                "{}",
                update.label
            );
        })
        .await;

    let stats = store.shutdown().await?;
    tracing::info!(
        commits = stats.commits,
        applied = stats.applied,
        failed = stats.failed,
        "Result store drained"
    );

    let summary = outcome?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn stop_on_signal(stop: StopFlag) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping after in-flight work");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping after in-flight work");
        }
    }

    stop.stop();
}
