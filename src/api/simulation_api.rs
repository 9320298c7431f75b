// ==========================================
// 解冻库存滚动系统 - 模拟操作 API
// ==========================================
// 职责: 封装收市推进与重置操作, 校验输入后委托编排器
// 红线: 库存链写路径唯一入口, 纯查询走 ReportApi
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::error::{validate_sales_kg, ApiResult};
use crate::config::ConfigManager;
use crate::domain::ResetScope;
use crate::engine::{DayRunSummary, SimulationOrchestrator};
use crate::repository::{InventoryStateRepository, ReportRepository};

// ==========================================
// ResetOutcome - 重置结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ResetOutcome {
    pub scope: ResetScope,
    /// 被删除的库存链记录数
    pub removed_states: usize,
    /// 被删除的日报行数
    pub removed_reports: usize,
    /// 被撤销的链尾日期(仅 LAST_DAY 且链非空时有值)
    pub removed_date: Option<NaiveDate>,
    /// 撤销后重新打开的日期(仅 LAST_DAY 且链长大于1时有值)
    pub reopened_date: Option<NaiveDate>,
}

// ==========================================
// SimulationApi - 模拟操作 API
// ==========================================
pub struct SimulationApi {
    orchestrator: Arc<SimulationOrchestrator<ConfigManager>>,
    inventory_repo: Arc<InventoryStateRepository>,
    report_repo: Arc<ReportRepository>,
}

impl SimulationApi {
    pub fn new(
        orchestrator: Arc<SimulationOrchestrator<ConfigManager>>,
        inventory_repo: Arc<InventoryStateRepository>,
        report_repo: Arc<ReportRepository>,
    ) -> Self {
        Self {
            orchestrator,
            inventory_repo,
            report_repo,
        }
    }

    /// 收市推进一天
    ///
    /// # 参数
    /// - sales_kg: 当日观测销量(公斤), 非负有限数
    ///
    /// # 返回
    /// - Ok(DayRunSummary): 本次推进摘要(含当日日报行)
    /// - Err(ApiError): 输入无效 / 状态冲突 / 无训练数据
    pub fn advance_day(&self, sales_kg: f64) -> ApiResult<DayRunSummary> {
        validate_sales_kg(sales_kg)?;
        let summary = self.orchestrator.advance_day(sales_kg)?;
        Ok(summary)
    }

    /// 重训预测并重建横向预测表(销量历史变化后手动触发用)
    pub fn rebuild_projections(&self) -> ApiResult<usize> {
        let rows = self.orchestrator.rebuild_projections()?;
        Ok(rows)
    }

    /// 按范围重置库存链
    pub fn reset(&self, scope: ResetScope) -> ApiResult<ResetOutcome> {
        match scope {
            ResetScope::LastDay => self.reset_last_day(),
            ResetScope::All => self.reset_all(),
        }
    }

    // 撤销最近一天: 删除链尾记录, 前一天重新打开(观测销量清空)
    fn reset_last_day(&self) -> ApiResult<ResetOutcome> {
        let removed_date = match self.inventory_repo.delete_latest()? {
            Some(date) => date,
            None => {
                info!("库存链为空, 无可撤销记录");
                return Ok(ResetOutcome {
                    scope: ResetScope::LastDay,
                    removed_states: 0,
                    removed_reports: 0,
                    removed_date: None,
                    reopened_date: None,
                });
            }
        };

        // 被删日期一般是未收市记录, 没有日报; 外部改库时可能有, 一并清掉
        let mut removed_reports = self.report_repo.delete_daily_report(removed_date)?;

        // 重新打开那天的日报描述的是已被撤销的推进, 同样失效
        let reopened_date = self
            .inventory_repo
            .find_latest()?
            .map(|state| state.state_date);
        if let Some(date) = reopened_date {
            removed_reports += self.report_repo.delete_daily_report(date)?;
        }

        info!(
            removed_date = %removed_date,
            reopened_date = ?reopened_date,
            removed_reports,
            "撤销最近一天完成"
        );

        Ok(ResetOutcome {
            scope: ResetScope::LastDay,
            removed_states: 1,
            removed_reports,
            removed_date: Some(removed_date),
            reopened_date,
        })
    }

    // 清空全部: 库存链 + 日报 + 横向预测整表删除, 销量历史与配置保留
    fn reset_all(&self) -> ApiResult<ResetOutcome> {
        let removed_states = self.inventory_repo.clear()?;
        let (removed_reports, removed_projections) = self.report_repo.clear_all()?;

        if removed_states == 0 && removed_reports == 0 && removed_projections == 0 {
            warn!("重置请求作用于空库, 无记录被删除");
        }

        info!(
            removed_states,
            removed_reports, removed_projections, "清空库存链完成"
        );

        Ok(ResetOutcome {
            scope: ResetScope::All,
            removed_states,
            removed_reports,
            removed_date: None,
            reopened_date: None,
        })
    }
}
