// ==========================================
// 配方版本与成本核算系统 - API 层错误类型
// ==========================================
// 职责: 引擎/导入错误统一映射为对外错误码
// ==========================================

use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("对象不存在: {0}")]
    NotFound(String),

    #[error("状态冲突: {0}")]
    Conflict(String),

    #[error("输入验证失败: {0}")]
    Validation(String),

    #[error("导入失败: {0}")]
    ImportFailed(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 对外错误码（前端/集成方按码分支）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::ImportFailed(_) => "IMPORT_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::Conflict(msg) => ApiError::Conflict(msg),
            EngineError::Validation(msg) => ApiError::Validation(msg),
            EngineError::Repository(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::ImportFailed(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
