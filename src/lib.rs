// ==========================================
// 成衣批次追踪系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 范围: 工艺路线、收货组批、工序推进、质检次品、一洗投料
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Actor, AllocationStatus, DefectReason, StageStatus, WashSourceKind};

// 领域实体
pub use domain::{
    Batch, BatchDetail, BatchStage, NewBundle, NewWashBatch, Planning, QcStageSummary,
    ReceivedBundle, Rejection, StageHistory, WashBatchDetail, WashItem,
};

// 引擎
pub use engine::{ProgressionState, StageProgressionEngine, StageTransition};

// API
pub use api::{
    ApiError, ApiResult, InventoryApi, PlanningApi, ProgressionApi, RejectionApi, WashApi,
};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "成衣批次追踪系统";
