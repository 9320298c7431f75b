// ==========================================
// 解冻库存滚动系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换下层错误为用户友好的错误消息
// 红线: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::SimulationError;
use crate::importer::ImportError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    /// 库存链与请求不一致(最新记录已收市/历史被外部修改)
    #[error("状态冲突: {0}")]
    StateConflict(String),

    #[error("缺少训练数据: {0}")]
    NoTrainingData(String),

    // ==========================================
    // 配置与数据访问错误
    // ==========================================
    #[error("配置读取失败: {0}")]
    ConfigError(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

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
// 目的: 将仓储层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
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
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SimulationError 转换
// ==========================================
impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            SimulationError::NoTrainingData(msg) => ApiError::NoTrainingData(msg),
            SimulationError::StateConflict(msg) => ApiError::StateConflict(msg),
            SimulationError::ConfigError(msg) => ApiError::ConfigError(msg),
            SimulationError::Repository(e) => e.into(),
            SimulationError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => e.into(),
            ImportError::Other(e) => ApiError::Other(e),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 输入校验辅助函数
// ==========================================

/// 校验收市销量输入: 必须为非负有限数
pub fn validate_sales_kg(sales_kg: f64) -> ApiResult<()> {
    if !sales_kg.is_finite() {
        return Err(ApiError::InvalidInput(format!(
            "销量必须为有限数值, 实际 {}",
            sales_kg
        )));
    }
    if sales_kg < 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "销量不可为负, 实际 {}",
            sales_kg
        )));
    }
    Ok(())
}
