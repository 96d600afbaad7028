use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::StatusPolicy;

/// 服务器配置 - 履约中间层的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（启动时先加载 `.env`）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/fulfillment | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | NOBORDER_API_URL | http://localhost:8080/api | 外部履约系统地址 |
/// | NOBORDER_USERNAME / NOBORDER_PASSWORD | - | Basic 认证 |
/// | REQUEST_TIMEOUT_MS | 30000 | 外部请求超时(毫秒) |
/// | SYNC_ENABLED | true | 是否启用定时对账 |
/// | SYNC_INTERVAL_SECS | 60 | 定时对账间隔 |
/// | SYNC_PAGE_SIZE | 50 | 每页记录数 |
/// | SYNC_PAGE_DELAY_MS | 200 | 翻页间隔 |
/// | DEFAULT_CURRENCY | EUR | 缺省币种 |
/// | STATUS_POLICY | advisory | `advisory` / `forward_only` |
/// | BATCH_TTL_SECS | 28800 | 批次存活时间 |
/// | PROJECT_ZONES | - | 项目优先拣货区，如 `P100:A,P200:B` |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录（存在时按天滚动写文件） |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/fulfillment HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放数据库和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 外部履约系统 ===
    pub noborder_api_url: String,
    pub noborder_username: Option<String>,
    pub noborder_password: Option<String>,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,

    // === 对账 ===
    pub sync_enabled: bool,
    pub sync_interval_secs: u64,
    pub sync_page_size: u32,
    pub sync_page_delay_ms: u64,
    pub default_currency: String,
    pub status_policy: StatusPolicy,

    // === 批次 ===
    pub batch_ttl_secs: u64,
    /// 项目 ID → 拣货区
    pub project_zones: HashMap<String, String>,

    // === 日志 ===
    pub log_level: String,
    pub log_dir: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 解析 `P100:A,P200:B`
pub fn parse_project_zones(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (project, zone) = pair.split_once(':')?;
            let (project, zone) = (project.trim(), zone.trim());
            (!project.is_empty() && !zone.is_empty())
                .then(|| (project.to_string(), zone.to_ascii_uppercase()))
        })
        .collect()
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let status_policy = match env_opt("STATUS_POLICY") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid STATUS_POLICY, using advisory");
                StatusPolicy::default()
            }),
            None => StatusPolicy::default(),
        };

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/fulfillment".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            noborder_api_url: std::env::var("NOBORDER_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".into()),
            noborder_username: env_opt("NOBORDER_USERNAME"),
            noborder_password: env_opt("NOBORDER_PASSWORD"),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30000),

            sync_enabled: env_parse("SYNC_ENABLED", true),
            sync_interval_secs: env_parse("SYNC_INTERVAL_SECS", 60),
            sync_page_size: env_parse("SYNC_PAGE_SIZE", 50),
            sync_page_delay_ms: env_parse("SYNC_PAGE_DELAY_MS", 200),
            default_currency: std::env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "EUR".into()),
            status_policy,

            batch_ttl_secs: env_parse("BATCH_TTL_SECS", 8 * 60 * 60),
            project_zones: env_opt("PROJECT_ZONES")
                .map(|raw| parse_project_zones(&raw))
                .unwrap_or_default(),

            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// 数据库目录: work_dir/database
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// 订单账本文件
    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("orders.redb")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        if let Some(dir) = &self.log_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
