// ==========================================
// 解冻库存滚动系统 - 配置层
// ==========================================
// 职责: 系统配置管理与推演参数快照
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod planning_config_trait;
pub mod planning_params;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use planning_config_trait::PlanningConfigReader;
pub use planning_params::PlanningParams;
