// ==========================================
// 成衣批次追踪系统 - API 层
// ==========================================
// 职责: 用例编排，每个写操作一个事务边界（BEGIN IMMEDIATE）
// 约定: 持有连接锁期间只调用仓储的 *_tx 函数
// ==========================================

pub mod error;
pub mod inventory_api;
pub mod planning_api;
pub mod progression_api;
pub mod rejection_api;
pub mod wash_api;

pub use error::{ApiError, ApiResult, ErrorPayload, STATUS_CREATED, STATUS_NO_CONTENT, STATUS_OK};
pub use inventory_api::{InventoryApi, ReceiveSummary, SkippedBundle};
pub use planning_api::PlanningApi;
pub use progression_api::ProgressionApi;
pub use rejection_api::RejectionApi;
pub use wash_api::WashApi;

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// 获取共享连接
pub(crate) fn lock_conn(conn: &Arc<Mutex<Connection>>) -> ApiResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
}
