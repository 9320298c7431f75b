// ==========================================
// 解冻库存滚动系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 关键决策必须可解释(提示/明细)
// ==========================================

pub mod error;
pub mod forecast;
pub mod loss;
pub mod orchestrator;
pub mod projection;
pub mod rollover;

// 重导出核心引擎
pub use error::{SimulationError, SimulationResult};
pub use forecast::{DemandModel, DemandPredictor, ForecastAdapter, ModelKind};
pub use loss::LossRecalcEngine;
pub use orchestrator::{DayRunSummary, SimulationOrchestrator};
pub use projection::ProjectionEngine;
pub use rollover::{DayTransition, RolloverEngine, SalesAllocation, ThawDecision};
