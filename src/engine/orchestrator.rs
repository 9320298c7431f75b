// ==========================================
// 解冻库存滚动系统 - 推演编排器
// ==========================================
// 用途: 协调预测对齐、单日推演、报废重算与落库顺序
// 红线: 业务算术在各引擎内完成, 编排器只管流程与持久化
// ==========================================

use crate::config::PlanningConfigReader;
use crate::domain::inventory::DailyInventoryState;
use crate::domain::report::{DailyReportRow, RunNotice};
use crate::domain::types::NoticeCode;
use crate::engine::error::{SimulationError, SimulationResult};
use crate::engine::forecast::ForecastAdapter;
use crate::engine::loss::LossRecalcEngine;
use crate::engine::projection::ProjectionEngine;
use crate::engine::rollover::{DayTransition, RolloverEngine};
use crate::repository::{InventoryStateRepository, ReportRepository};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// DayRunSummary - 单日推演摘要
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct DayRunSummary {
    pub run_id: String,          // 推演ID
    pub closed_date: NaiveDate,  // 被收市的日期
    pub next_date: NaiveDate,    // 新开台的日期
    pub bootstrapped: bool,      // 本次是否发生了空历史引导
    pub report: DailyReportRow,  // 当日报表行
    pub elapsed_ms: u64,         // 推演耗时
}

// ==========================================
// SimulationOrchestrator - 推演编排器
// ==========================================

pub struct SimulationOrchestrator<C>
where
    C: PlanningConfigReader,
{
    config: Arc<C>,
    inventory_repo: Arc<InventoryStateRepository>,
    report_repo: Arc<ReportRepository>,
    forecast: Arc<ForecastAdapter<C>>,
    rollover: RolloverEngine,
    loss: LossRecalcEngine,
    projection: ProjectionEngine,
}

impl<C> SimulationOrchestrator<C>
where
    C: PlanningConfigReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - config: 配置读取器
    /// - inventory_repo: 库存状态仓储
    /// - report_repo: 报表仓储
    /// - forecast: 预测适配器(与其他模块共享)
    pub fn new(
        config: Arc<C>,
        inventory_repo: Arc<InventoryStateRepository>,
        report_repo: Arc<ReportRepository>,
        forecast: Arc<ForecastAdapter<C>>,
    ) -> Self {
        Self {
            config,
            inventory_repo,
            report_repo,
            forecast,
            rollover: RolloverEngine::new(),
            loss: LossRecalcEngine::new(),
            projection: ProjectionEngine::new(),
        }
    }

    /// 执行单日滚动推演(收市当日 → 开台次日)
    ///
    /// # 参数
    /// - sales_kg: 当日实际销量(公斤)
    ///
    /// # 返回
    /// DayRunSummary 推演摘要(含当日报表行)
    pub fn advance_day(&self, sales_kg: f64) -> SimulationResult<DayRunSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        info!(run_id = %run_id, sales_kg, "开始单日滚动推演");

        // ==========================================
        // 步骤1: 取推演参数快照
        // ==========================================
        let params = self
            .config
            .get_planning_params()
            .map_err(|e| SimulationError::ConfigError(e.to_string()))?;

        // ==========================================
        // 步骤2: 预测表与销量历史对齐
        // ==========================================
        debug!("步骤2: 对齐预测表");
        self.forecast.ensure_current()?;

        // ==========================================
        // 步骤3: 取最新状态, 空历史则由预测引导
        // ==========================================
        let (current, bootstrapped) = match self.inventory_repo.find_latest()? {
            Some(latest) => {
                if latest.is_closed() {
                    // 正常流程不可能出现: 收市与开台在同一事务内完成
                    return Err(SimulationError::StateConflict(format!(
                        "最新记录 {} 已收市, 历史可能被外部修改",
                        latest.state_date
                    )));
                }
                (latest, false)
            }
            None => {
                let start_date = self
                    .forecast
                    .training_end()
                    .map(|end| end + Duration::days(1))
                    .ok_or_else(|| {
                        SimulationError::NoTrainingData(
                            "历史为空且无销量数据, 无法引导起始状态".to_string(),
                        )
                    })?;
                let state = self
                    .rollover
                    .bootstrap_state(start_date, self.forecast.as_ref(), &params);
                self.inventory_repo.append_open_state(&state)?;
                info!(
                    start_date = %start_date,
                    lot1_kg = state.sellable_lot1_kg,
                    thawing_kg = state.thawing_total_kg(),
                    "空历史, 已由预测引导起始状态"
                );
                (state, true)
            }
        };

        // ==========================================
        // 步骤4: 单日收市推演
        // ==========================================
        debug!(closing_date = %current.state_date, "步骤4: 执行单日推演");
        let transition =
            self.rollover
                .advance_day(&current, sales_kg, self.forecast.as_ref(), &params)?;

        // ==========================================
        // 步骤5: 预演收市后的完整历史, 重算报废列
        // ==========================================
        let mut staged = self.inventory_repo.find_all()?;
        if let Some(last) = staged.last_mut() {
            if last.state_date == current.state_date {
                last.observed_sales_kg = Some(sales_kg);
            }
        }
        staged.push(transition.next_state.clone());
        let loss_column = self.loss.recompute_column(&staged);

        // ==========================================
        // 步骤6: 原子落库(收市 + 开台 + 报废列)
        // ==========================================
        self.inventory_repo.commit_day_transition(
            current.state_date,
            sales_kg,
            &transition.next_state,
            &loss_column,
        )?;

        // ==========================================
        // 步骤7: 日报表与地平线投影(尽力而为)
        // ==========================================
        let mut report = self.build_report_row(&current, &transition, &params, &run_id);
        if let Err(e) = self.report_repo.upsert_daily_report(&report) {
            warn!(error = %e, "日报表落库失败, 推演结果本身已生效");
            report.notices.push(RunNotice::warning(
                NoticeCode::ReportRefreshFailed,
                json!({ "stage": "daily_report", "error": e.to_string() }),
            ));
        }

        match self.rebuild_projections() {
            Ok(count) => debug!(rows = count, "地平线投影已刷新"),
            Err(e) => {
                warn!(error = %e, "地平线投影刷新失败, 推演结果本身已生效");
                report.notices.push(RunNotice::warning(
                    NoticeCode::ReportRefreshFailed,
                    json!({ "stage": "projection", "error": e.to_string() }),
                ));
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            closed_date = %current.state_date,
            next_date = %transition.next_state.state_date,
            sales_kg,
            thaw_kg = transition.thaw.final_kg,
            projected_loss_kg = transition.projected_loss_kg,
            notices = report.notices.len(),
            elapsed_ms,
            "单日滚动推演完成"
        );

        Ok(DayRunSummary {
            run_id,
            closed_date: current.state_date,
            next_date: transition.next_state.state_date,
            bootstrapped,
            report,
            elapsed_ms,
        })
    }

    /// 重建地平线投影表(训练截止次日 → 预测表末尾)
    ///
    /// 无可用模型时清空投影, 避免陈旧数据误导。
    pub fn rebuild_projections(&self) -> SimulationResult<usize> {
        self.forecast.ensure_current()?;

        let (training_end, horizon_end) =
            match (self.forecast.training_end(), self.forecast.horizon_end()) {
                (Some(t), Some(h)) => (t, h),
                _ => {
                    self.report_repo.replace_projections(&[])?;
                    return Ok(0);
                }
            };

        let start = training_end + Duration::days(1);
        let rows = self
            .projection
            .build_window(self.forecast.as_ref(), start, horizon_end);
        let count = self.report_repo.replace_projections(&rows)?;
        Ok(count)
    }

    /// 组装当日报表行
    fn build_report_row(
        &self,
        current: &DailyInventoryState,
        transition: &DayTransition,
        params: &crate::config::PlanningParams,
        run_id: &str,
    ) -> DailyReportRow {
        DailyReportRow {
            report_date: current.state_date,
            sku_code: params.sku_code.clone(),
            recommended_pull_kg: transition.thaw.final_kg,
            recommended_pull_boxes: params.boxes_for_kg(transition.thaw.final_kg),
            thawing_kg: current.thawing_total_kg(),
            available_kg: current.total_sellable_kg(),
            lot_age: current.lot_age(),
            projected_loss_kg: transition.projected_loss_kg,
            projected_loss_boxes: params.boxes_for_kg(transition.projected_loss_kg),
            notices: transition.notices.clone(),
            run_id: run_id.to_string(),
            generated_at: chrono::Local::now().naive_local(),
        }
    }
}
