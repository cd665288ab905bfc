// ==========================================
// 成衣批次追踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和 API 实例
// 连接: 单个 SQLite 连接以 Arc<Mutex<Connection>> 在各层共享
// ==========================================

use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::Serialize;

use crate::api::{InventoryApi, PlanningApi, ProgressionApi, RejectionApi, WashApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version};
use crate::importer::BundleImporterImpl;
use crate::repository::{
    BatchRepository, BatchStageRepository, BundleRepository, PlanningRepository,
    RejectionRepository, StageNameRepository, WashRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "GARMENT_TRACKER_DB_PATH";

/// 台账概况（启动时输出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerOverview {
    pub plans: usize,
    pub bundles: usize,
    pub batches: usize,
    pub wash_batches: usize,
}

/// 应用状态
///
/// 包含所有 API 实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生产计划（工艺路线）API
    pub planning_api: Arc<PlanningApi>,

    /// 库存台账（收货/组批）API
    pub inventory_api: Arc<InventoryApi>,

    /// 工序推进 API
    pub progression_api: Arc<ProgressionApi>,

    /// 质检次品 API
    pub rejection_api: Arc<RejectionApi>,

    /// 一洗投料 API
    pub wash_api: Arc<WashApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 扎包批量导入器
    pub bundle_importer: Arc<BundleImporterImpl<ConfigManager>>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 说明
    /// 1. 打开连接并应用统一 PRAGMA
    /// 2. 建表（幂等）
    /// 3. 初始化所有 Repository 与 API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let schema_version =
            read_schema_version(&conn).map_err(|e| format!("无法读取数据库版本: {}", e))?;
        tracing::debug!(?schema_version, "数据库版本");
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let stage_name_repo = Arc::new(StageNameRepository::new(conn.clone()));
        let planning_repo = Arc::new(PlanningRepository::new(conn.clone()));
        let bundle_repo = Arc::new(BundleRepository::new(conn.clone()));
        let batch_repo = Arc::new(BatchRepository::new(conn.clone()));
        let stage_repo = Arc::new(BatchStageRepository::new(conn.clone()));
        let rejection_repo = Arc::new(RejectionRepository::new(conn.clone()));
        let wash_repo = Arc::new(WashRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let planning_api = Arc::new(PlanningApi::new(
            conn.clone(),
            planning_repo,
            stage_name_repo,
        ));
        let inventory_api = Arc::new(InventoryApi::new(conn.clone(), bundle_repo, batch_repo));
        let progression_api = Arc::new(ProgressionApi::new(conn.clone(), stage_repo));
        let rejection_api = Arc::new(RejectionApi::new(conn.clone(), rejection_repo));
        let wash_api = Arc::new(WashApi::new(conn.clone(), wash_repo));

        // 导入器持有独立的配置读取器（共享同一连接）
        let importer_config = ConfigManager::from_connection(conn)
            .map_err(|e| format!("无法创建导入配置读取器: {}", e))?;
        let bundle_importer = Arc::new(BundleImporterImpl::new(
            inventory_api.clone(),
            importer_config,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            planning_api,
            inventory_api,
            progression_api,
            rejection_api,
            wash_api,
            config_manager,
            bundle_importer,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// 统计各台账行数；任一读取失败时带上是哪本台账
    pub fn ledger_overview(&self) -> anyhow::Result<LedgerOverview> {
        Ok(LedgerOverview {
            plans: self
                .planning_api
                .list_plans(None)
                .context("读取工艺路线失败")?
                .len(),
            bundles: self
                .inventory_api
                .list_bundles()
                .context("读取收货扎包失败")?
                .len(),
            batches: self
                .inventory_api
                .list_batches()
                .context("读取批次失败")?
                .len(),
            wash_batches: self
                .wash_api
                .list_wash_batches()
                .context("读取洗水批次失败")?
                .len(),
        })
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 GARMENT_TRACKER_DB_PATH（非空时）
/// - 否则: 用户数据目录/garment-tracker/garment_tracker.db
/// - 取不到用户数据目录: ./garment_tracker.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./garment_tracker.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("garment-tracker");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("garment_tracker.db");
        }
    }

    path.to_string_lossy().to_string()
}
