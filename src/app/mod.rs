// ==========================================
// 成衣批次追踪系统 - 应用层
// ==========================================
// 职责: 组装仓储、API、配置与导入器
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, LedgerOverview, DB_PATH_ENV};
