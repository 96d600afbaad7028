use std::sync::Arc;
use std::time::Duration;

use crate::batching::{BatchConfig, BatchExpiryWorker, BatchService, ClassifierConfig};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::orders::{OrderStorage, StatusService};
use crate::sync::{
    NoBorderClient, Normalizer, OrderSource, ReconciliationService, SyncOptions, SyncWorker,
};

/// 过期批次检查间隔
const BATCH_EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// 服务器状态 - 持有所有服务的单例引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | storage | OrderStorage | 订单账本 (redb) |
/// | reconciliation | Arc<ReconciliationService> | 对账周期 |
/// | status | Arc<StatusService> | 状态变更与回写 |
/// | batches | Arc<BatchService> | 批次拣货 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 订单账本
    pub storage: OrderStorage,
    /// 对账服务
    pub reconciliation: Arc<ReconciliationService>,
    /// 状态变更服务
    pub status: Arc<StatusService>,
    /// 批次拣货服务
    pub batches: Arc<BatchService>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 订单账本 (work_dir/database/orders.redb)
    /// 3. 外部履约系统客户端
    /// 4. 各服务
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_path();
        tracing::info!(path = %db_path.display(), "Opening order ledger");
        let storage = OrderStorage::open(&db_path)?;

        let client = NoBorderClient::new(
            &config.noborder_api_url,
            config.noborder_username.as_deref(),
            config.noborder_password.as_deref(),
            config.request_timeout(),
        )?;
        if config.noborder_username.is_none() {
            tracing::warn!("NOBORDER_USERNAME not set, requests to the fulfillment system are unauthenticated");
        }

        Ok(Self::with_source(config.clone(), storage, Arc::new(client)))
    }

    /// 使用指定的数据源和账本构造状态
    ///
    /// 测试中传入内存账本和假数据源
    pub fn with_source(config: Config, storage: OrderStorage, source: Arc<dyn OrderSource>) -> Self {
        let options = SyncOptions {
            page_size: config.sync_page_size,
            page_delay: Duration::from_millis(config.sync_page_delay_ms),
            status_policy: config.status_policy,
        };
        let normalizer = Normalizer::new(source.system(), config.default_currency.clone());
        let reconciliation = Arc::new(ReconciliationService::new(
            source.clone(),
            storage.clone(),
            normalizer,
            options,
        ));

        let status = Arc::new(StatusService::new(
            storage.clone(),
            source.clone(),
            config.status_policy,
        ));

        let batches = Arc::new(BatchService::new(
            storage.clone(),
            source,
            BatchConfig {
                ttl_ms: (config.batch_ttl_secs as i64).saturating_mul(1000),
                classifier: ClassifierConfig::default(),
                project_zones: config.project_zones.clone(),
            },
        ));

        Self {
            config,
            storage,
            reconciliation,
            status,
            batches,
        }
    }

    /// 启动后台任务
    ///
    /// - 定时对账 (`SYNC_ENABLED=false` 时跳过)
    /// - 过期批次释放
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        if self.config.sync_enabled {
            let worker = SyncWorker::new(
                self.reconciliation.clone(),
                self.config.sync_interval(),
                tasks.shutdown_token(),
            );
            tasks.spawn("sync_worker", TaskKind::Worker, worker.run());
        } else {
            tracing::info!("Scheduled sync disabled, only manual triggers will run");
        }

        let expiry = BatchExpiryWorker::new(
            self.batches.clone(),
            BATCH_EXPIRY_CHECK_INTERVAL,
            tasks.shutdown_token(),
        );
        tasks.spawn("batch_expiry", TaskKind::Periodic, expiry.run());

        tasks.log_summary();
        tasks
    }
}
