// ==========================================
// 解冻库存滚动系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum SimulationError {
    // ===== 输入错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ===== 预测错误 =====
    #[error("无训练数据: {0}")]
    NoTrainingData(String),

    // ===== 状态错误 =====
    #[error("状态冲突: {0}")]
    StateConflict(String),

    // ===== 配置错误 =====
    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ===== 下层透传 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimulationResult<T> = Result<T, SimulationError>;
