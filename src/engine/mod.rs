// ==========================================
// 成衣批次追踪系统 - 引擎层
// ==========================================
// 职责: 实现业务规则,不拼 SQL
// 红线: Engine 不拼 SQL, 所有规则失败必须输出原因
// ==========================================

pub mod allocation;
pub mod barcode;
pub mod error;
pub mod intake;
pub mod progression;
pub mod rejection;
pub mod route_plan;
pub mod wash_intake;

// 重导出核心引擎
pub use allocation::{AllocationRules, BatchKey};
pub use barcode::derive_bundle_barcode;
pub use error::{EngineError, EngineResult};
pub use intake::IntakeRules;
pub use progression::{ProgressionState, StageProgressionEngine, StageRequest, StageTransition};
pub use rejection::RejectionRules;
pub use route_plan::RoutePlanRules;
pub use wash_intake::{WashIntakeRules, WashPlan};
