// ==========================================
// 专家评审阶段管理系统 - API层错误类型
// ==========================================
// 职责: 定义调用方可见的错误分类, 转换 Repository 错误
// 分类: 校验错误 / 不存在 / 无权限 / 内部错误
// ==========================================

use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误 (不可重试)
    // ==========================================
    /// 输入或业务规则校验失败, 汇总全部违规信息
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    // ==========================================
    // 数据访问错误 (可重试)
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Internal,
}

impl ApiError {
    /// 单条校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(vec![message.into()])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::DatabaseError(_)
            | ApiError::DatabaseTransactionError(_)
            | ApiError::Internal(_)
            | ApiError::Other(_) => ErrorKind::Internal,
        }
    }

    /// 只有内部错误可由调用方重试 (失败事务无残留)
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// 校验错误信息列表 (非校验错误返回空)
    pub fn violations(&self) -> &[String] {
        match self {
            ApiError::Validation(messages) => messages,
            _ => &[],
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let api_err = Self::classify(err);
        if api_err.kind() == ErrorKind::Internal {
            tracing::error!(error = %api_err, "数据访问失败");
        }
        api_err
    }
}

impl ApiError {
    fn classify(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} with ID {} not found", entity, id))
            }
            RepositoryError::InvalidStateTransition { from, to } => ApiError::Validation(vec![
                format!("invalid status transition from '{}' to '{}'", from, to),
            ]),
            RepositoryError::FieldValueError { field, message } if field == "rejection_notes" => {
                ApiError::Validation(vec![message])
            }

            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::DatabaseConnectionError(msg) => {
                ApiError::DatabaseError(format!("数据库连接失败: {}", msg))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => ApiError::DatabaseError(msg),

            err @ RepositoryError::PhaseCodeExhausted { .. } => ApiError::Internal(err.to_string()),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Internal(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
