//! SyncWorker - 定时触发对账周期
//!
//! 与手动触发共用 [`ReconciliationService::run_sync`] 的互斥守卫，
//! 周期仍在运行时的定时触发会被直接忽略。

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::orchestrator::{ReconciliationService, SyncRun};
use shared::util::now_millis;

pub struct SyncWorker {
    service: Arc<ReconciliationService>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        service: Arc<ReconciliationService>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            interval,
            shutdown,
        }
    }

    /// 启动后立即执行一次，之后按间隔执行
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "SyncWorker started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("SyncWorker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.service.run_sync().await {
                        SyncRun::Skipped => {
                            tracing::debug!("Scheduled sync skipped, previous cycle still running");
                        }
                        SyncRun::Finished(report) => {
                            if let Some(reason) = &report.aborted {
                                tracing::warn!(reason = %reason, "Scheduled sync aborted");
                            }
                        }
                    }
                    let next = now_millis() + self.interval.as_millis() as i64;
                    self.service.set_next_sync(Some(next));
                }
            }
        }

        self.service.set_next_sync(None);
        tracing::info!("SyncWorker stopped");
    }
}
