// ==========================================
// 藏书编目系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户友好的错误消息
// 约定: 每类失败对应一个明确变体,调用方能据此决定下一步动作
// ==========================================

use crate::domain::dimensions::DimensionError;
use crate::engine::allocation::AllocationError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入校验错误(未开启任何事务)
    // ==========================================
    #[error("尺寸非法: {0}")]
    InvalidDimensions(String),

    #[error("条码格式非法: {0}")]
    MalformedCode(String),

    #[error("条码 {code} 不属于允许的系列 {allowed:?}")]
    SeriesMismatch { code: String, allowed: Vec<String> },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 业务失败(事务内发生,已整体回滚)
    // ==========================================
    #[error("无匹配的尺寸规则: {0}")]
    NoMatchingSizeRule(String),

    #[error("系列 {series} 无可用条码(已尝试: {allowed:?})")]
    PoolExhausted { series: String, allowed: Vec<String> },

    #[error("条码不在池内: {0}")]
    CodeNotInPool(String),

    #[error("条码不可用: {0}")]
    CodeNotAvailable(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 台账一致性错误(需人工对账,不自动修复)
    // ==========================================
    #[error("台账不一致: {0}")]
    LedgerInconsistency(String),

    // ==========================================
    // 数据质量错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

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

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 占用竞争
            RepositoryError::CodeAlreadyAssigned { code } => ApiError::CodeNotAvailable(code),

            // 数据库错误
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
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 AllocationError 转换
// ==========================================
impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::NoMatchingSizeRule {
                width_mm,
                height_mm,
            } => ApiError::NoMatchingSizeRule(format!("宽={}mm 高={}mm", width_mm, height_mm)),
            AllocationError::PoolExhausted { series, allowed } => {
                ApiError::PoolExhausted { series, allowed }
            }
            AllocationError::CodeNotInPool { code } => ApiError::CodeNotInPool(code),
            AllocationError::CodeNotAvailable { code } => ApiError::CodeNotAvailable(code),
            AllocationError::SeriesMismatch { code, allowed } => {
                ApiError::SeriesMismatch { code, allowed }
            }
            AllocationError::MalformedCode { code } => ApiError::MalformedCode(code),
            AllocationError::Repository(inner) => inner.into(),
        }
    }
}

// ==========================================
// 从 DimensionError 转换
// ==========================================
impl From<DimensionError> for ApiError {
    fn from(err: DimensionError) -> Self {
        ApiError::InvalidDimensions(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
