// ==========================================
// 解冻库存滚动系统 - 日滚动引擎
// ==========================================
// 职责: 单日收市推演(先老后新分摊 → 出冻决策 → 次日状态)
// 输入: 当日未收市状态 + 实际销量 + 预测查询
// 输出: DayTransition (分摊明细 + 出冻决策 + 次日状态 + 提示)
// 红线: 纯计算, 不触库; Repository 操作由编排器处理
// ==========================================

use crate::config::PlanningParams;
use crate::domain::inventory::DailyInventoryState;
use crate::domain::report::RunNotice;
use crate::domain::types::NoticeCode;
use crate::engine::error::{SimulationError, SimulationResult};
use crate::engine::forecast::DemandPredictor;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;

// ==========================================
// 推演输出结构
// ==========================================

/// 先老后新的销量分摊明细
#[derive(Debug, Clone, Serialize)]
pub struct SalesAllocation {
    pub sold_from_old_kg: f64,  // 从老批次(lot2)售出
    pub unsold_old_kg: f64,     // 老批次未售出(今晚到期报废)
    pub sold_from_new_kg: f64,  // 从新批次(lot1)售出
    pub carryover_new_kg: f64,  // 新批次结转(明日转为老批次)
    pub excess_demand_kg: f64,  // 超出在库的需求(截断部分)
}

/// 出冻决策明细
#[derive(Debug, Clone, Serialize)]
pub struct ThawDecision {
    pub target_date: NaiveDate,   // 本次出冻覆盖的需求日
    pub forecast_kg: Option<f64>, // 需求日预测(模型原始输出)
    pub required_kg: f64,         // 需求缺口 max(0, 预测 - 结转)
    pub final_kg: f64,            // 最终出冻量(下限/覆盖日处理后)
    pub override_applied: bool,   // 是否命中日历覆盖日
}

/// 单日推演结果
#[derive(Debug, Clone, Serialize)]
pub struct DayTransition {
    pub closing_date: NaiveDate,         // 被收市的日期
    pub sales_kg: f64,                   // 当日实际销量
    pub allocation: SalesAllocation,     // 销量分摊
    pub thaw: ThawDecision,              // 出冻决策
    pub projected_loss_kg: f64,          // 次日预计报废(公斤)
    pub next_state: DailyInventoryState, // 次日状态(未收市)
    pub notices: Vec<RunNotice>,         // 推演提示
}

// ==========================================
// RolloverEngine - 日滚动引擎
// ==========================================
pub struct RolloverEngine {
    // 无状态引擎,不需要注入依赖
    // Repository 操作由调用方处理
}

impl RolloverEngine {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 推演一天: 收市当日状态并组装次日状态
    ///
    /// # 参数
    /// - `state`: 当日未收市状态
    /// - `sales_kg`: 当日实际销量(公斤)
    /// - `predictor`: 预测查询
    /// - `params`: 推演参数快照
    ///
    /// # 返回
    /// DayTransition 推演结果(含次日状态, 未落库)
    pub fn advance_day(
        &self,
        state: &DailyInventoryState,
        sales_kg: f64,
        predictor: &dyn DemandPredictor,
        params: &PlanningParams,
    ) -> SimulationResult<DayTransition> {
        if !sales_kg.is_finite() || sales_kg < 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "实际销量必须为非负有限值: {}",
                sales_kg
            )));
        }

        let mut notices = Vec::new();

        // 1. 先老后新分摊当日销量
        let allocation = self.allocate_sales(state, sales_kg);
        if allocation.excess_demand_kg > 0.0 {
            notices.push(RunNotice::warning(
                NoticeCode::DemandExceededStock,
                json!({
                    "date": state.state_date.to_string(),
                    "excess_kg": allocation.excess_demand_kg,
                    "available_kg": state.total_sellable_kg(),
                }),
            ));
            tracing::warn!(
                state_date = %state.state_date,
                excess_kg = allocation.excess_demand_kg,
                "当日需求超出在库可售量, 超出部分按截断处理"
            );
        }

        // 2. 出冻决策(覆盖 L+1 天后的需求)
        let thaw = self.decide_thaw(
            state.state_date,
            allocation.carryover_new_kg,
            predictor,
            params,
            &mut notices,
        );

        // 3. 次日预计报废(结转部分明日卖不掉的量)
        let projected_loss_kg = self.project_next_day_loss(
            state.state_date,
            allocation.carryover_new_kg,
            predictor,
            &mut notices,
        );

        // 4. 管线推进一位, 组装次日状态
        let (ready_kg, next_pipeline) =
            self.shift_pipeline(&state.thawing_kg, thaw.final_kg, params.thaw_lead_days);
        let next_state = DailyInventoryState::new(
            state.state_date + Duration::days(1),
            next_pipeline,
            ready_kg,
            allocation.carryover_new_kg,
        );

        Ok(DayTransition {
            closing_date: state.state_date,
            sales_kg,
            allocation,
            thaw,
            projected_loss_kg,
            next_state,
            notices,
        })
    }

    /// 空历史时由预测合成起始状态
    ///
    /// - lot1 覆盖起始日需求
    /// - 管线各档覆盖起始日后 1..=L 天需求(出池越早越靠末位)
    /// - lot2 = 0 (没有更老的批次)
    pub fn bootstrap_state(
        &self,
        start_date: NaiveDate,
        predictor: &dyn DemandPredictor,
        params: &PlanningParams,
    ) -> DailyInventoryState {
        let lead_days = params.thaw_lead_days.max(1);
        let lot1 = predictor.predict(start_date).unwrap_or(0.0).max(0.0);

        let mut pipeline = vec![0.0; lead_days];
        for j in 1..=lead_days {
            let kg = predictor
                .predict(start_date + Duration::days(j as i64))
                .unwrap_or(0.0)
                .max(0.0);
            pipeline[lead_days - j] = kg;
        }

        DailyInventoryState::new(start_date, pipeline, lot1, 0.0)
    }

    // ==========================================
    // 分步计算
    // ==========================================

    /// 先老后新(FIFO)分摊销量
    fn allocate_sales(&self, state: &DailyInventoryState, sales_kg: f64) -> SalesAllocation {
        let sold_from_old_kg = sales_kg.min(state.sellable_lot2_kg);
        let unsold_old_kg = state.sellable_lot2_kg - sold_from_old_kg;

        let remaining = sales_kg - sold_from_old_kg;
        let sold_from_new_kg = remaining.min(state.sellable_lot1_kg);
        let carryover_new_kg = state.sellable_lot1_kg - sold_from_new_kg;
        let excess_demand_kg = remaining - sold_from_new_kg;

        SalesAllocation {
            sold_from_old_kg,
            unsold_old_kg,
            sold_from_new_kg,
            carryover_new_kg,
            excess_demand_kg,
        }
    }

    /// 出冻决策: 需求缺口 → 下限 → 日历覆盖日
    fn decide_thaw(
        &self,
        state_date: NaiveDate,
        carryover_new_kg: f64,
        predictor: &dyn DemandPredictor,
        params: &PlanningParams,
        notices: &mut Vec<RunNotice>,
    ) -> ThawDecision {
        // 今日出冻明日入池, L 天后出池可售
        let target_date = state_date + Duration::days(params.thaw_lead_days as i64 + 1);
        let forecast_kg = predictor.predict(target_date);
        if forecast_kg.is_none() {
            notices.push(RunNotice::warning(
                NoticeCode::MissingForecast,
                json!({
                    "date": target_date.to_string(),
                    "context": "thaw_sizing",
                }),
            ));
            tracing::warn!(
                target_date = %target_date,
                "需求日超出预测表范围, 出冻决策按预测0处理"
            );
        }

        let required_kg = (forecast_kg.unwrap_or(0.0) - carryover_new_kg).max(0.0);
        let mut final_kg = required_kg.max(params.min_thaw_kg);
        let mut override_applied = false;

        if state_date.day() == params.override_day_of_month {
            final_kg = params.override_thaw_kg;
            override_applied = true;
            notices.push(RunNotice::info(
                NoticeCode::CalendarOverrideApplied,
                json!({
                    "day_of_month": params.override_day_of_month,
                    "override_kg": params.override_thaw_kg,
                }),
            ));
        }

        ThawDecision {
            target_date,
            forecast_kg,
            required_kg,
            final_kg,
            override_applied,
        }
    }

    /// 次日预计报废: 结转量中明日需求吃不掉的部分
    fn project_next_day_loss(
        &self,
        state_date: NaiveDate,
        carryover_new_kg: f64,
        predictor: &dyn DemandPredictor,
        notices: &mut Vec<RunNotice>,
    ) -> f64 {
        let tomorrow = state_date + Duration::days(1);
        let forecast_kg = predictor.predict(tomorrow);
        if forecast_kg.is_none() {
            notices.push(RunNotice::info(
                NoticeCode::MissingForecast,
                json!({
                    "date": tomorrow.to_string(),
                    "context": "projected_loss",
                }),
            ));
        }
        (carryover_new_kg - forecast_kg.unwrap_or(0.0)).max(0.0)
    }

    /// 管线推进一位: 末档出池转可售, 新出冻入首档
    ///
    /// 前置天数配置变化时, 老批次保持靠近出池端的位置。
    fn shift_pipeline(
        &self,
        current: &[f64],
        pull_kg: f64,
        lead_days: usize,
    ) -> (f64, Vec<f64>) {
        let lead_days = lead_days.max(1);
        let ready_kg = current.last().copied().unwrap_or(0.0);
        let rest = &current[..current.len().saturating_sub(1)];

        let mut next = Vec::with_capacity(lead_days);
        next.push(pull_kg);
        if rest.len() >= lead_days {
            // 前置期缩短: 只保留最接近出池的几档
            next.extend(rest.iter().skip(rest.len() + 1 - lead_days));
        } else {
            for _ in 0..(lead_days - 1 - rest.len()) {
                next.push(0.0);
            }
            next.extend(rest.iter());
        }

        (ready_kg, next)
    }
}

impl Default for RolloverEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::NoticeLevel;
    use std::collections::BTreeMap;

    struct StubPredictor(BTreeMap<NaiveDate, f64>);

    impl StubPredictor {
        fn new(points: &[(&str, f64)]) -> Self {
            Self(
                points
                    .iter()
                    .map(|(s, kg)| (d(s), *kg))
                    .collect(),
            )
        }

        fn empty() -> Self {
            Self(BTreeMap::new())
        }
    }

    impl DemandPredictor for StubPredictor {
        fn predict(&self, date: NaiveDate) -> Option<f64> {
            self.0.get(&date).copied()
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn state(date: &str, thawing: Vec<f64>, lot1: f64, lot2: f64) -> DailyInventoryState {
        DailyInventoryState::new(d(date), thawing, lot1, lot2)
    }

    /// 销量吃穿老批次: lot2=5, lot1=8, 销量10 → 老批次清空, 新批次结转3
    #[test]
    fn test_allocation_spills_into_new_lot() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![20.0], 8.0, 5.0);
        let predictor = StubPredictor::new(&[("2024-05-07", 6.0), ("2024-05-08", 12.0)]);

        let result = engine
            .advance_day(&current, 10.0, &predictor, &PlanningParams::default())
            .unwrap();

        assert!((result.allocation.sold_from_old_kg - 5.0).abs() < 1e-9);
        assert!((result.allocation.unsold_old_kg - 0.0).abs() < 1e-9);
        assert!((result.allocation.sold_from_new_kg - 5.0).abs() < 1e-9);
        assert!((result.allocation.carryover_new_kg - 3.0).abs() < 1e-9);
        assert!((result.allocation.excess_demand_kg - 0.0).abs() < 1e-9);

        // 次日状态: 结转3成为老批次, 出池20成为新批次
        assert_eq!(result.next_state.state_date, d("2024-05-07"));
        assert!((result.next_state.sellable_lot2_kg - 3.0).abs() < 1e-9);
        assert!((result.next_state.sellable_lot1_kg - 20.0).abs() < 1e-9);
    }

    /// 销量吃不完老批次: lot2=5, 销量3 → 未售老批次2今晚报废
    #[test]
    fn test_allocation_leaves_unsold_old() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![20.0], 8.0, 5.0);
        let predictor = StubPredictor::new(&[("2024-05-07", 6.0), ("2024-05-08", 12.0)]);

        let result = engine
            .advance_day(&current, 3.0, &predictor, &PlanningParams::default())
            .unwrap();

        assert!((result.allocation.sold_from_old_kg - 3.0).abs() < 1e-9);
        assert!((result.allocation.unsold_old_kg - 2.0).abs() < 1e-9);
        assert!((result.allocation.sold_from_new_kg - 0.0).abs() < 1e-9);
        assert!((result.allocation.carryover_new_kg - 8.0).abs() < 1e-9);
    }

    /// 质量守恒: 期初在库 = 售出 + 报废 + 结转
    #[test]
    fn test_mass_conservation() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![15.5], 12.3, 7.7);
        let predictor = StubPredictor::new(&[("2024-05-07", 9.0), ("2024-05-08", 14.0)]);

        let result = engine
            .advance_day(&current, 11.1, &predictor, &PlanningParams::default())
            .unwrap();

        let opening = current.total_sellable_kg();
        let accounted = result.allocation.sold_from_old_kg
            + result.allocation.sold_from_new_kg
            + result.allocation.unsold_old_kg
            + result.allocation.carryover_new_kg;
        assert!((opening - accounted).abs() < 1e-9);
    }

    /// 超量需求被截断并产生警示
    #[test]
    fn test_excess_demand_is_clamped_with_notice() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![10.0], 4.0, 2.0);
        let predictor = StubPredictor::new(&[("2024-05-07", 5.0), ("2024-05-08", 5.0)]);

        let result = engine
            .advance_day(&current, 50.0, &predictor, &PlanningParams::default())
            .unwrap();

        assert!((result.allocation.excess_demand_kg - 44.0).abs() < 1e-9);
        assert!((result.allocation.carryover_new_kg - 0.0).abs() < 1e-9);
        assert!(result
            .notices
            .iter()
            .any(|n| n.code == NoticeCode::DemandExceededStock
                && n.level == NoticeLevel::Warning));
        // 截断后次日状态仍非负
        assert!(result.next_state.quantities_non_negative());
    }

    /// 出冻决策: 缺口 = 预测(+2日) - 结转
    #[test]
    fn test_thaw_sizing_covers_target_gap() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![0.0], 10.0, 0.0);
        // 结转 = 10 - 4 = 6, 后天需求20 → 缺口14
        let predictor = StubPredictor::new(&[("2024-05-07", 6.0), ("2024-05-08", 20.0)]);

        let result = engine
            .advance_day(&current, 4.0, &predictor, &PlanningParams::default())
            .unwrap();

        assert_eq!(result.thaw.target_date, d("2024-05-08"));
        assert!((result.thaw.required_kg - 14.0).abs() < 1e-9);
        assert!((result.thaw.final_kg - 14.0).abs() < 1e-9);
        assert!(!result.thaw.override_applied);
        // 新出冻进入管线首档
        assert!((result.next_state.thawing_kg[0] - 14.0).abs() < 1e-9);
    }

    /// 缺口低于下限时按下限出冻(0 < 缺口 < 下限 同样适用)
    #[test]
    fn test_thaw_floor_applies_to_small_gap() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![0.0], 10.0, 0.0);
        // 结转10, 后天需求12 → 缺口2 < 下限5
        let predictor = StubPredictor::new(&[("2024-05-07", 6.0), ("2024-05-08", 12.0)]);

        let result = engine
            .advance_day(&current, 0.0, &predictor, &PlanningParams::default())
            .unwrap();

        assert!((result.thaw.required_kg - 2.0).abs() < 1e-9);
        assert!((result.thaw.final_kg - 5.0).abs() < 1e-9);
    }

    /// 日历覆盖日: 出冻量固定为覆盖值, 不做下限比较
    #[test]
    fn test_calendar_override_fixes_thaw() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-23", vec![0.0], 0.0, 0.0);
        let predictor = StubPredictor::new(&[("2024-05-24", 500.0), ("2024-05-25", 500.0)]);

        let result = engine
            .advance_day(&current, 0.0, &predictor, &PlanningParams::default())
            .unwrap();

        assert!(result.thaw.override_applied);
        assert!((result.thaw.final_kg - 130.0).abs() < 1e-9);
        assert!(result
            .notices
            .iter()
            .any(|n| n.code == NoticeCode::CalendarOverrideApplied));
    }

    /// 预测缺失: 按0处理并产生警示
    #[test]
    fn test_missing_forecast_substitutes_zero() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![3.0], 10.0, 0.0);
        let predictor = StubPredictor::empty();

        let result = engine
            .advance_day(&current, 4.0, &predictor, &PlanningParams::default())
            .unwrap();

        // 缺口 max(0, 0 - 6) = 0 → 按下限出冻
        assert!((result.thaw.required_kg - 0.0).abs() < 1e-9);
        assert!((result.thaw.final_kg - 5.0).abs() < 1e-9);
        assert!((result.projected_loss_kg - 6.0).abs() < 1e-9);
        assert!(result
            .notices
            .iter()
            .filter(|n| n.code == NoticeCode::MissingForecast)
            .count() >= 2);
    }

    /// 次日预计报废 = max(0, 结转 - 明日预测)
    #[test]
    fn test_projected_loss() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![0.0], 10.0, 0.0);
        let predictor = StubPredictor::new(&[("2024-05-07", 4.0), ("2024-05-08", 30.0)]);

        let result = engine
            .advance_day(&current, 3.0, &predictor, &PlanningParams::default())
            .unwrap();

        // 结转7, 明日预测4 → 预计报废3
        assert!((result.projected_loss_kg - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_sales_rejected() {
        let engine = RolloverEngine::new();
        let current = state("2024-05-06", vec![0.0], 10.0, 0.0);
        let predictor = StubPredictor::empty();

        let err = engine
            .advance_day(&current, -1.0, &predictor, &PlanningParams::default())
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));

        let err = engine
            .advance_day(&current, f64::NAN, &predictor, &PlanningParams::default())
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }

    /// 多档管线: 新出冻入首档, 各档顺移, 末档出池
    #[test]
    fn test_multi_stage_pipeline_shift() {
        let engine = RolloverEngine::new();
        let params = PlanningParams {
            thaw_lead_days: 3,
            ..PlanningParams::default()
        };
        let current = state("2024-05-06", vec![30.0, 20.0, 10.0], 5.0, 0.0);
        // L=3 → 需求日为 +4 天
        let predictor = StubPredictor::new(&[("2024-05-07", 2.0), ("2024-05-10", 50.0)]);

        let result = engine.advance_day(&current, 5.0, &predictor, &params).unwrap();

        assert_eq!(result.thaw.target_date, d("2024-05-10"));
        assert!((result.thaw.final_kg - 50.0).abs() < 1e-9);
        // 末档10出池成为新批次
        assert!((result.next_state.sellable_lot1_kg - 10.0).abs() < 1e-9);
        assert_eq!(result.next_state.thawing_kg, vec![50.0, 30.0, 20.0]);
    }

    /// 由预测合成起始状态: lot1 覆盖当日, 管线覆盖后续, lot2=0
    #[test]
    fn test_bootstrap_from_forecast() {
        let engine = RolloverEngine::new();
        let predictor = StubPredictor::new(&[
            ("2024-06-01", 18.0),
            ("2024-06-02", 22.0),
        ]);

        let state = engine.bootstrap_state(d("2024-06-01"), &predictor, &PlanningParams::default());

        assert_eq!(state.state_date, d("2024-06-01"));
        assert!((state.sellable_lot1_kg - 18.0).abs() < 1e-9);
        assert!((state.sellable_lot2_kg - 0.0).abs() < 1e-9);
        assert_eq!(state.thawing_kg, vec![22.0]);
        assert!(state.observed_sales_kg.is_none());
    }

    /// 负预测合成时截断为0, 状态保持非负
    #[test]
    fn test_bootstrap_clamps_negative_forecast() {
        let engine = RolloverEngine::new();
        let predictor = StubPredictor::new(&[
            ("2024-06-01", -4.0),
            ("2024-06-02", 22.0),
        ]);

        let state = engine.bootstrap_state(d("2024-06-01"), &predictor, &PlanningParams::default());

        assert!((state.sellable_lot1_kg - 0.0).abs() < 1e-9);
        assert!(state.quantities_non_negative());
    }

    /// 多档引导: 出池越早的档位越靠末位
    #[test]
    fn test_bootstrap_multi_stage_order() {
        let engine = RolloverEngine::new();
        let params = PlanningParams {
            thaw_lead_days: 2,
            ..PlanningParams::default()
        };
        let predictor = StubPredictor::new(&[
            ("2024-06-01", 10.0),
            ("2024-06-02", 20.0),
            ("2024-06-03", 30.0),
        ]);

        let state = engine.bootstrap_state(d("2024-06-01"), &predictor, &params);

        // 明日出池(覆盖06-02)在末位, 后日出池(覆盖06-03)在首位
        assert_eq!(state.thawing_kg, vec![30.0, 20.0]);
        assert!((state.sellable_lot1_kg - 10.0).abs() < 1e-9);
    }
}
