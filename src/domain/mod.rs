// ==========================================
// 成衣批次追踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod inventory;
pub mod planning;
pub mod progression;
pub mod rejection;
pub mod types;
pub mod wash;

// 重导出核心类型
pub use inventory::{Batch, BatchBundle, BatchDetail, NewBundle, ReceivedBundle};
pub use planning::{Planning, RouteStep, StageName};
pub use progression::{BatchStage, StageHistory, StageUpdateOutcome};
pub use rejection::{QcStageSummary, Rejection, RejectionBundleInfo, RejectionDetail};
pub use types::{Actor, AllocationStatus, DefectReason, StageStatus, WashSourceKind, SYSTEM_ACTOR};
pub use wash::{NewWashBatch, WashBatch, WashBatchDetail, WashItem, WashSource};
