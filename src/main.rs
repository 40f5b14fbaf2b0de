pub mod device;
pub mod host;
pub mod input;
pub mod mapping;
pub mod queue;
pub mod stats;

use crate::host::{EchoHost, FileStorage, PluginMessage};
use crate::input::{GilrsSource, PollerHandle, PollerSettings};
use crate::mapping::MappingStore;
use crate::queue::QueueDispatcher;
use crate::stats::StatsHandle;
use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Simulated queue length for standalone runs.
const DEMO_QUEUE_SIZE: u32 = 20;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    info!("Starting queuepad");
    let storage = Arc::new(FileStorage::open().await?);

    let (plugin_tx, _) = broadcast::channel::<PluginMessage>(64);
    let store = MappingStore::new(Arc::clone(&storage), plugin_tx.clone());
    if let Err(e) = store.ensure_default().await {
        warn!("Could not seed default mapping, continuing in-memory: {}", e);
    }

    // Input pipeline: gilrs -> poller -> dispatcher.
    info!("Initializing gamepad input");
    let source = GilrsSource::new()?;
    let (input_tx, input_rx) = mpsc::channel(256);
    let poller = PollerHandle::spawn(Box::new(source), Some(PollerSettings::default()), input_tx);

    // Simulated host queue echoing lifecycle events to the stats worker.
    let (event_tx, event_rx) = mpsc::channel(256);
    let host = EchoHost::new(DEMO_QUEUE_SIZE, event_tx);
    host.enter_queue().await;

    let stats = StatsHandle::spawn(event_rx, Arc::new(host.clone()), Arc::clone(&storage));
    spawn_stats_logger(stats.subscribe());

    let cancel = CancellationToken::new();
    let dispatcher = QueueDispatcher::new(input_rx, store, Arc::new(host), plugin_tx);
    let dispatcher_task = tokio::spawn(dispatcher.run(cancel.clone()));

    info!("queuepad running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    cancel.cancel();
    poller.shutdown().await;
    if let Err(e) = dispatcher_task.await {
        warn!("Dispatcher task panicked during shutdown: {}", e);
    }

    Ok(())
}

fn spawn_stats_logger(mut snapshots: tokio::sync::watch::Receiver<stats::StatsSnapshot>) {
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            info!(
                "Session stats: {:.2} cpm, {} completed ({} again), remaining {}",
                snapshot.success_cpm,
                snapshot.total_cards_completed,
                snapshot.total_again_count,
                snapshot.remaining_display
            );
        }
    });
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
