// ==========================================
// 解冻库存滚动系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供 CLI 入口调用
// ==========================================

pub mod error;
pub mod report_api;
pub mod simulation_api;

// 重导出核心类型
pub use error::{validate_sales_kg, ApiError, ApiResult};
pub use report_api::{ForecastModelStatus, ReportApi};
pub use simulation_api::{ResetOutcome, SimulationApi};
