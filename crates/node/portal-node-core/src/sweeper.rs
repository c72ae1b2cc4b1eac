//! Background proposal settlement
//!
//! Reads already settle lazily; the sweeper only makes stored state catch
//! up with the clock so snapshots and listings agree with reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::platform::Platform;

/// Handle to a running sweep task
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<u64>,
}

impl Sweeper {
    /// Spawn a sweep every `period` on the current runtime
    pub fn start(platform: Arc<Platform>, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Self::run(platform, period, shutdown_rx));
        info!("Proposal sweeper started (every {:?})", period);
        Self {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    /// Start a sweeper using the platform's configured interval, or none
    /// when the interval is zero
    pub fn from_config(platform: Arc<Platform>) -> Option<Self> {
        match platform.config().sweep_interval_secs {
            0 => None,
            secs => Some(Self::start(platform, Duration::from_secs(secs))),
        }
    }

    async fn run(platform: Arc<Platform>, period: Duration, mut shutdown_rx: oneshot::Receiver<()>) -> u64 {
        let mut interval = tokio::time::interval(period);
        let mut total = 0u64;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    total += platform.sweep().await as u64;
                }
                _ = &mut shutdown_rx => {
                    debug!("Proposal sweeper received shutdown");
                    break;
                }
            }
        }
        total
    }

    /// Stop the task and return how many proposals it settled
    pub async fn stop(mut self) -> u64 {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(total) => {
                info!("Proposal sweeper stopped after settling {} proposals", total);
                total
            }
            Err(e) => {
                warn!("Proposal sweeper ended abnormally: {}", e);
                0
            }
        }
    }
}
