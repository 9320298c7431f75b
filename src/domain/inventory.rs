// ==========================================
// 解冻库存滚动系统 - 每日库存状态领域模型
// ==========================================
// 口径: 每条记录描述某一日的开盘库存位置
// 红线: 历史只追加, 滚动字段落库后不再改写;
//       仅允许回填当日实际销量与重算派生报废列
// ==========================================

use crate::domain::types::LotAge;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// DailyInventoryState - 每日库存状态
// ==========================================
// 解冻管线: 按入池先后排列, 首位为最新入池,
// 末位将于次日出池转为可售第1天
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyInventoryState {
    pub state_date: NaiveDate,          // 状态日期
    pub thawing_kg: Vec<f64>,           // 解冻管线(公斤), 长度=解冻前置天数
    pub sellable_lot1_kg: f64,          // 可售第1天批次(昨日出池)
    pub sellable_lot2_kg: f64,          // 可售第2天批次(今晚到期)
    pub observed_sales_kg: Option<f64>, // 实际销量(收市回填, 未回填为空)
    pub realized_loss_kg: Option<f64>,  // 实际报废(重算通道派生)
    pub created_at: NaiveDateTime,      // 创建时间
}

impl DailyInventoryState {
    /// 创建一条未收市的新状态记录
    pub fn new(
        state_date: NaiveDate,
        thawing_kg: Vec<f64>,
        sellable_lot1_kg: f64,
        sellable_lot2_kg: f64,
    ) -> Self {
        Self {
            state_date,
            thawing_kg,
            sellable_lot1_kg,
            sellable_lot2_kg,
            observed_sales_kg: None,
            realized_loss_kg: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }

    /// 解冻管线总量(公斤)
    pub fn thawing_total_kg(&self) -> f64 {
        self.thawing_kg.iter().sum()
    }

    /// 明日出池转为可售的那一档(管线末位, 空管线为0)
    pub fn thawing_ready_kg(&self) -> f64 {
        self.thawing_kg.last().copied().unwrap_or(0.0)
    }

    /// 当日可售总量(两档批次合计)
    pub fn total_sellable_kg(&self) -> f64 {
        self.sellable_lot1_kg + self.sellable_lot2_kg
    }

    /// 当日批次库龄(取在库最老一档)
    pub fn lot_age(&self) -> LotAge {
        if self.sellable_lot2_kg > 0.0 {
            LotAge::TwoDays
        } else if self.sellable_lot1_kg > 0.0 {
            LotAge::OneDay
        } else {
            LotAge::None
        }
    }

    /// 记录是否已收市(已回填实际销量)
    pub fn is_closed(&self) -> bool {
        self.observed_sales_kg.is_some()
    }

    /// 数量不变式: 各库存量均非负
    pub fn quantities_non_negative(&self) -> bool {
        self.sellable_lot1_kg >= 0.0
            && self.sellable_lot2_kg >= 0.0
            && self.thawing_kg.iter().all(|kg| *kg >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_state(lot1: f64, lot2: f64) -> DailyInventoryState {
        DailyInventoryState::new(
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            vec![42.5],
            lot1,
            lot2,
        )
    }

    #[test]
    fn test_totals_and_ready_stage() {
        let state = create_test_state(80.0, 20.0);
        assert_eq!(state.thawing_total_kg(), 42.5);
        assert_eq!(state.thawing_ready_kg(), 42.5);
        assert_eq!(state.total_sellable_kg(), 100.0);
        assert!(!state.is_closed());
    }

    #[test]
    fn test_multi_stage_pipeline_ready_is_last() {
        let mut state = create_test_state(10.0, 0.0);
        state.thawing_kg = vec![30.0, 50.0];
        assert_eq!(state.thawing_total_kg(), 80.0);
        // 末位是最早入池的一档, 明日出池
        assert_eq!(state.thawing_ready_kg(), 50.0);
    }

    #[test]
    fn test_lot_age_prefers_oldest() {
        assert_eq!(create_test_state(10.0, 5.0).lot_age(), LotAge::TwoDays);
        assert_eq!(create_test_state(10.0, 0.0).lot_age(), LotAge::OneDay);
        assert_eq!(create_test_state(0.0, 0.0).lot_age(), LotAge::None);
    }

    #[test]
    fn test_non_negative_invariant() {
        let mut state = create_test_state(10.0, 5.0);
        assert!(state.quantities_non_negative());
        state.sellable_lot2_kg = -0.5;
        assert!(!state.quantities_non_negative());
    }
}
