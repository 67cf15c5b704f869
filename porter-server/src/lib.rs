//! Product Porter Server
//!
//! Moves catalog products between stores as self-contained zip packages.
//!
//! - **导出** (`export`): product records plus referenced images → `.zip`
//! - **导入** (`import`): resumable, batched reconciliation of a package
//!   against the local catalog
//! - **目录存储** (`catalog`): SQLite catalog and on-disk media store
//! - **HTTP API** (`api`): axum routes over the above
//!
//! ```text
//! porter-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── archive/       # zip 包编解码
//! ├── catalog/       # CatalogStore trait + SQLite 实现
//! ├── db/            # 连接池、迁移、repository
//! ├── export/        # 导出包组装
//! ├── import/        # 会话、对账、批处理
//! ├── settings/      # 自定义 meta/分类法设置
//! └── utils/         # 日志
//! ```

pub mod api;
pub mod archive;
pub mod catalog;
pub mod core;
pub mod db;
pub mod export;
pub mod import;
pub mod settings;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use export::{ExportPackage, Exporter};
pub use import::{BatchResult, ImportHook, Importer, SetupResult};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Start console and file logging under the work dir
pub fn setup_environment(config: &Config) -> anyhow::Result<()> {
    let log_dir = config.logs_dir();
    init_logger_with_file(&config.log_level, config.log_json, Some(&log_dir))?;
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____             __
   / __ \____  _____/ /____  _____
  / /_/ / __ \/ ___/ __/ _ \/ ___/
 / ____/ /_/ / /  / /_/  __/ /
/_/    \____/_/   \__/\___/_/
    "#
    );
}
