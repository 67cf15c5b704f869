use std::path::PathBuf;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./work_dir | 工作目录 (数据库、会话、媒体、导入临时目录、日志) |
/// | HTTP_PORT | 3080 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 默认日志级别 (RUST_LOG 优先) |
/// | LOG_JSON | (production 时为 true) | 强制 JSON 日志 |
/// | IMPORT_BATCH_SIZE | 5 | 新导入会话的批大小 |
/// | IMPORT_SESSION_TTL_SECS | 86400 | 导入会话保留时间 |
/// | SESSION_SWEEP_INTERVAL_SECS | 3600 | 过期会话清理周期 |
/// | MAX_UPLOAD_BYTES | 268435456 | 导入包上传大小上限 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/porter HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 默认日志级别
    pub log_level: String,
    /// JSON 日志格式
    pub log_json: bool,
    /// 新导入会话的批大小 (写入会话状态，之后不再变化)
    pub import_batch_size: usize,
    /// 导入会话保留时间 (秒)
    pub session_ttl_secs: u64,
    /// 过期会话清理周期 (秒)
    pub session_sweep_interval_secs: u64,
    /// 上传大小上限 (字节)
    pub max_upload_bytes: usize,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let log_json = env_parse("LOG_JSON", environment == "production");
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into()),
            http_port: env_parse("HTTP_PORT", 3080),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json,
            environment,
            import_batch_size: env_parse("IMPORT_BATCH_SIZE", 5usize).max(1),
            session_ttl_secs: env_parse("IMPORT_SESSION_TTL_SECS", 86_400),
            session_sweep_interval_secs: env_parse("SESSION_SWEEP_INTERVAL_SECS", 3_600).max(1),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 256 * 1024 * 1024),
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

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    /// SQLite 目录 (catalog.db, sessions.redb)
    pub fn database_dir(&self) -> PathBuf {
        self.work_dir().join("database")
    }

    /// 媒体文件存储目录
    pub fn uploads_dir(&self) -> PathBuf {
        self.work_dir().join("uploads")
    }

    /// 导入临时目录的父目录
    pub fn imports_dir(&self) -> PathBuf {
        self.work_dir().join("imports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.work_dir().join("logs")
    }

    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_and_layout() {
        let config = Config::with_overrides("/tmp/porter-test", 9999);
        assert_eq!(config.http_port, 9999);
        assert_eq!(config.database_dir(), PathBuf::from("/tmp/porter-test/database"));
        assert_eq!(config.imports_dir(), PathBuf::from("/tmp/porter-test/imports"));
        assert!(config.import_batch_size >= 1);
    }
}
