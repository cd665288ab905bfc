// ==========================================
// 成衣批次追踪系统 - 引擎层错误类型
// ==========================================
// 引擎只输出两类业务错误 + 路线缺失:
// - Validation: 调用方输入或业务规则违反
// - Conflict:   实体当前状态不允许该变更
// - NotFound:   路线内不存在请求的序号
// ==========================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
