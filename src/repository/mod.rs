// ==========================================
// 成衣批次追踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定:
// - 结构体方法: 自行加锁的只读查询
// - *_tx 关联函数: 在调用方事务内执行（读写同一事务）
// ==========================================

pub mod batch_repo;
pub mod bundle_repo;
pub mod error;
pub mod planning_repo;
pub mod rejection_repo;
pub mod stage_repo;
pub mod wash_repo;


// 重导出核心仓储
pub use batch_repo::BatchRepository;
pub use bundle_repo::BundleRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use planning_repo::{PlanningRepository, StageNameRepository};
pub use rejection_repo::RejectionRepository;
pub use stage_repo::BatchStageRepository;
pub use wash_repo::WashRepository;
