// ==========================================
// 解冻库存滚动系统 - 地平线投影引擎
// ==========================================
// 职责: 由预测表生成未来逐日的 出冻/解冻/可售 三元组
// 口径: 当日可售=预测(d), 当日解冻中=预测(d+1), 当日应出冻=预测(d+2)
// 约束: 三项齐备才产出该日(窗口末尾两天自然截断), 负预测截断为0
// ==========================================

use crate::domain::report::HorizonProjection;
use crate::engine::forecast::DemandPredictor;
use chrono::{Duration, NaiveDate};

// ==========================================
// ProjectionEngine - 地平线投影引擎
// ==========================================
pub struct ProjectionEngine {
    // 无状态引擎,不需要注入依赖
}

impl ProjectionEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 生成 [start, end] 窗口内的逐日投影
    ///
    /// # 参数
    /// - predictor: 预测查询
    /// - start: 窗口起始日(含)
    /// - end: 窗口结束日(含)
    pub fn build_window(
        &self,
        predictor: &dyn DemandPredictor,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<HorizonProjection> {
        let mut rows = Vec::new();
        let mut date = start;

        while date <= end {
            let available = predictor.predict(date);
            let thawing = predictor.predict(date + Duration::days(1));
            let pull = predictor.predict(date + Duration::days(2));

            if let (Some(available_kg), Some(thawing_kg), Some(pull_kg)) =
                (available, thawing, pull)
            {
                rows.push(HorizonProjection {
                    projection_date: date,
                    pull_kg: pull_kg.max(0.0),
                    thawing_kg: thawing_kg.max(0.0),
                    available_kg: available_kg.max(0.0),
                });
            }

            date += Duration::days(1);
        }

        rows
    }
}

impl Default for ProjectionEngine {
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
    use std::collections::BTreeMap;

    struct StubPredictor(BTreeMap<NaiveDate, f64>);

    impl DemandPredictor for StubPredictor {
        fn predict(&self, date: NaiveDate) -> Option<f64> {
            self.0.get(&date).copied()
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table(points: &[(&str, f64)]) -> StubPredictor {
        StubPredictor(points.iter().map(|(s, kg)| (d(s), *kg)).collect())
    }

    /// 三元组口径: 可售=d, 解冻中=d+1, 出冻=d+2
    #[test]
    fn test_triplet_alignment() {
        let predictor = table(&[
            ("2024-07-01", 10.0),
            ("2024-07-02", 20.0),
            ("2024-07-03", 30.0),
        ]);
        let engine = ProjectionEngine::new();

        let rows = engine.build_window(&predictor, d("2024-07-01"), d("2024-07-03"));

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].projection_date, d("2024-07-01"));
        assert!((rows[0].available_kg - 10.0).abs() < 1e-9);
        assert!((rows[0].thawing_kg - 20.0).abs() < 1e-9);
        assert!((rows[0].pull_kg - 30.0).abs() < 1e-9);
    }

    /// 窗口末尾两天因 d+1/d+2 超出预测表被自然截断
    #[test]
    fn test_window_truncated_at_horizon_tail() {
        let predictor = table(&[
            ("2024-07-01", 10.0),
            ("2024-07-02", 20.0),
            ("2024-07-03", 30.0),
            ("2024-07-04", 40.0),
            ("2024-07-05", 50.0),
        ]);
        let engine = ProjectionEngine::new();

        let rows = engine.build_window(&predictor, d("2024-07-01"), d("2024-07-05"));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows.last().unwrap().projection_date, d("2024-07-03"));
    }

    #[test]
    fn test_negative_forecast_clamped() {
        let predictor = table(&[
            ("2024-07-01", -5.0),
            ("2024-07-02", 20.0),
            ("2024-07-03", -1.0),
        ]);
        let engine = ProjectionEngine::new();

        let rows = engine.build_window(&predictor, d("2024-07-01"), d("2024-07-01"));

        assert_eq!(rows.len(), 1);
        assert!((rows[0].available_kg - 0.0).abs() < 1e-9);
        assert!((rows[0].pull_kg - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window() {
        let predictor = table(&[("2024-07-01", 10.0)]);
        let engine = ProjectionEngine::new();

        let rows = engine.build_window(&predictor, d("2024-07-02"), d("2024-07-01"));
        assert!(rows.is_empty());
    }
}
