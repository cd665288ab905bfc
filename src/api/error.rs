// ==========================================
// 成衣批次追踪系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为调用方可读的错误消息
// 错误分类:
// - ValidationError: 输入或业务规则违反 (400)
// - Conflict:        实体状态不允许该变更 (409)
// - NotFound:        引用的实体不存在 (404)
// - 其余:            数据库/内部错误 (500)
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Conflict(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 对应的 HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::ValidationError(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// 结构化错误载荷（传输层直接序列化）
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            status: self.http_status(),
        }
    }
}

/// 错误响应结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// HTTP 状态码
    pub status: u16,
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            // 唯一约束: 重复条码 / 重复计划等，属于调用方输入问题
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }
            // 外键约束: 仍被下游引用
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::Conflict(format!("外键约束违反: {}", msg))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::Conflict(msg) => ApiError::Conflict(msg),
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
        }
    }
}

/// 事务开启/提交失败
pub(crate) fn tx_error(err: rusqlite::Error) -> ApiError {
    ApiError::DatabaseTransactionError(err.to_string())
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(ApiError::ValidationError("x".into()).http_status(), 400);
        assert_eq!(ApiError::Conflict("x".into()).http_status(), 409);
        assert_eq!(ApiError::NotFound("x".into()).http_status(), 404);
        assert_eq!(ApiError::DatabaseError("x".into()).http_status(), 500);
    }

    #[test]
    fn test_repository_constraint_mapping() {
        let dup: ApiError = RepositoryError::UniqueConstraintViolation("UNIQUE".into()).into();
        assert!(matches!(dup, ApiError::ValidationError(_)));

        let fk: ApiError = RepositoryError::ForeignKeyViolation("FOREIGN KEY".into()).into();
        assert!(matches!(fk, ApiError::Conflict(_)));

        let missing: ApiError = RepositoryError::not_found("Batch", 7).into();
        let payload = missing.to_payload();
        assert_eq!(payload.code, "NOT_FOUND");
        assert_eq!(payload.status, 404);
        assert!(payload.message.contains("Batch"));
    }

    #[test]
    fn test_engine_mapping_keeps_message() {
        let err: ApiError = EngineError::validation("请先完成前面的工序").into();
        assert_eq!(err.to_string(), "请先完成前面的工序");
    }
}
