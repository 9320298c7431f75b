// ==========================================
// 解冻库存滚动系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod forecast;
pub mod inventory;
pub mod report;
pub mod types;

// 重导出核心类型
pub use forecast::{ForecastPoint, ModelMetrics, SalesObservation};
pub use inventory::DailyInventoryState;
pub use report::{DailyReportRow, HorizonProjection, RunNotice};
pub use types::{LotAge, NoticeCode, NoticeLevel, ResetScope};
