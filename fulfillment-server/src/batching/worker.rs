//! BatchExpiryWorker - 定期释放过期批次

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::service::BatchService;
use shared::util::now_millis;

pub struct BatchExpiryWorker {
    service: Arc<BatchService>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl BatchExpiryWorker {
    pub fn new(service: Arc<BatchService>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            service,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "BatchExpiryWorker started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // 第一次 tick 立即返回，启动时没有批次可释放
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("BatchExpiryWorker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.service.release_expired(now_millis()).await {
                        Ok(0) => {}
                        Ok(released) => tracing::info!(released, "Released expired batches"),
                        Err(e) => tracing::error!(error = %e, "Failed to release expired batches"),
                    }
                }
            }
        }
    }
}
