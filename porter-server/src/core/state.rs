use std::sync::Arc;

use crate::catalog::{CatalogStore, SqliteCatalog};
use crate::core::Config;
use crate::db::DbService;
use crate::export::Exporter;
use crate::import::{Importer, Reconciler, SessionStore};
use crate::settings::SettingsService;
use shared::error::{AppError, AppResult};
use sqlx::SqlitePool;

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有字段都是 `Arc` 或廉价可克隆的句柄，按值传给 axum 作为路由状态。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | pool | SQLite 连接池 |
/// | catalog | 商品目录存储 |
/// | settings | 导出/导入附加字段设置 |
/// | exporter | 导出包组装 |
/// | importer | 导入批处理 (含会话存储) |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    pub catalog: Arc<dyn CatalogStore>,
    pub settings: SettingsService,
    pub exporter: Exporter,
    pub importer: Arc<Importer>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 顺序: 工作目录 → 数据库 → 目录存储 → 设置 (注册自定义分类法)
    /// → 会话存储 → 导出器 → 导入器
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        for dir in [
            config.database_dir(),
            config.uploads_dir(),
            config.imports_dir(),
            config.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::file_system(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }

        let db_path = config.database_dir().join("catalog.db");
        let db = DbService::new(&db_path.to_string_lossy()).await?;
        let pool = db.pool;

        let catalog: Arc<dyn CatalogStore> =
            Arc::new(SqliteCatalog::new(pool.clone(), config.uploads_dir()));

        let settings = SettingsService::new(pool.clone(), catalog.clone());
        let current = settings.load().await?;
        settings.register_taxonomies(&current).await?;
        tracing::info!(
            meta_keys = current.custom_meta_keys.len(),
            taxonomies = current.custom_taxonomies.len(),
            "Porter settings loaded"
        );

        let sessions = SessionStore::open(
            config.database_dir().join("sessions.redb"),
            config.session_ttl(),
        )?;

        let exporter = Exporter::new(catalog.clone());
        let importer = Importer::new(
            Reconciler::new(catalog.clone()),
            sessions,
            config.imports_dir(),
            config.import_batch_size,
        );

        Ok(Self {
            config: config.clone(),
            pool,
            catalog,
            settings,
            exporter,
            importer: Arc::new(importer),
        })
    }
}
