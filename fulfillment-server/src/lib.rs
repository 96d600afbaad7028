//! Fulfillment Server - 仓库履约中间层
//!
//! # 架构概述
//!
//! - **对账** (`sync`): 外部履约系统订单 → 本地订单账本，保留拣货进度
//! - **订单账本** (`orders`): redb 持久化、状态变更回写、项目汇总
//! - **批次拣货** (`batching`): 分类、合并、路线排序、拣货分配
//! - **HTTP API** (`api`): axum 路由和处理器
//!
//! # 模块结构
//!
//! ```text
//! fulfillment-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── utils/         # 错误响应、日志
//! ├── orders/        # 订单账本
//! ├── sync/          # 对账引擎
//! └── batching/      # 批次引擎
//! ```

pub mod api;
pub mod batching;
pub mod core;
pub mod orders;
pub mod sync;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use orders::OrderStorage;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// 滚动日志保留天数
const LOG_RETENTION_DAYS: u64 = 14;

/// 设置运行环境：加载 `.env`，初始化日志
///
/// 日志级别取 `LOG_LEVEL`（`RUST_LOG` 优先）；`LOG_DIR` 设置时按天滚动写文件。
pub fn setup_environment() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty());
    if let Some(dir) = &log_dir {
        std::fs::create_dir_all(dir)?;
    }
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    if let Some(dir) = &log_dir
        && let Err(e) = cleanup_old_logs(dir, LOG_RETENTION_DAYS)
    {
        tracing::warn!(error = %e, "Failed to clean up old log files");
    }
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ______      ______ _ ____
   / ____/_  __/ / __/(_) / /___ ___  ___  ____  / /_
  / /_  / / / / / /_ / / / / __ `__ \/ _ \/ __ \/ __/
 / __/ / /_/ / / __// / / / / / / / /  __/ / / / /_
/_/    \__,_/_/_/  /_/_/_/_/ /_/ /_/\___/_/ /_/\__/
    "#
    );
}
