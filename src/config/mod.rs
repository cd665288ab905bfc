// ==========================================
// 成衣批次追踪系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod intake_config_trait;

pub use config_manager::{
    config_keys, ConfigManager, DEFAULT_IMPORT_MAX_ROWS, DEFAULT_IMPORT_SKIP_EXISTING,
};
pub use intake_config_trait::IntakeConfigReader;
