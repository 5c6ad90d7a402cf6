use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    pipeline::{StopReason, UploadPipeline},
    watch::WatchStreams,
    Result, SpacedError,
};

/// Runs the pipeline on its own task until it stops by itself or `shutdown` resolves.
///
/// On shutdown the stop token is cancelled and the worker is awaited, so an event
/// that is mid-flight finishes before this returns.
pub async fn run_until_shutdown<F>(
    pipeline: UploadPipeline,
    streams: WatchStreams,
    shutdown: F,
) -> Result<StopReason>
where
    F: Future<Output = ()>,
{
    let stop = CancellationToken::new();
    let mut worker = tokio::spawn(pipeline.run(streams, stop.clone()));

    tokio::select! {
        _ = stop.cancelled() => {}
        _ = shutdown => {
            info!("Interrupt received, shutting down");
            stop.cancel();
        }
        // a panicking worker never cancels the token
        joined = &mut worker => {
            return joined.map_err(|e| SpacedError::Pipeline(e.to_string()));
        }
    }

    worker
        .await
        .map_err(|e| SpacedError::Pipeline(e.to_string()))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
