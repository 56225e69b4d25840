// ==========================================
// 配方版本与成本核算系统 - 引擎层错误类型
// ==========================================
// 分类: NotFound(引用缺失) / Conflict(状态冲突) / Validation(输入非法)
// 仓储错误透传包装，供 API 层统一映射
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("对象不存在: {0}")]
    NotFound(String),

    #[error("状态冲突: {0}")]
    Conflict(String),

    #[error("输入验证失败: {0}")]
    Validation(String),

    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
