// ==========================================
// 解冻库存滚动系统 - 报废重算引擎
// ==========================================
// 职责: 全量历史派生实际报废列
// 规则: 第 i 条的实际报废 = 第 i-1 条收市后未售出的老批次
// 性质: 幂等, O(n), 可随时安全重跑
// ==========================================

use crate::domain::inventory::DailyInventoryState;
use chrono::NaiveDate;

// ==========================================
// LossRecalcEngine - 报废重算引擎
// ==========================================
pub struct LossRecalcEngine {
    // 无状态引擎,不需要注入依赖
    // Repository 操作由调用方处理
}

impl LossRecalcEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 对按日期升序的完整历史重算实际报废列
    ///
    /// # 参数
    /// - history: 完整历史, 按日期升序
    ///
    /// # 返回
    /// - Vec<(日期, 实际报废公斤)>: 与输入等长, 首条恒为0
    pub fn recompute_column(&self, history: &[DailyInventoryState]) -> Vec<(NaiveDate, f64)> {
        let mut column = Vec::with_capacity(history.len());

        for (i, record) in history.iter().enumerate() {
            let loss_kg = if i == 0 {
                0.0
            } else {
                self.unsold_old_kg(&history[i - 1])
            };
            column.push((record.state_date, loss_kg));
        }

        column
    }

    /// 某条记录收市后未售出的老批次(今晚到期报废的量)
    ///
    /// 未收市记录按销量0处理: 整个老批次视为未售出。
    pub fn unsold_old_kg(&self, record: &DailyInventoryState) -> f64 {
        let sales_kg = record.observed_sales_kg.unwrap_or(0.0);
        let sold_from_old_kg = sales_kg.min(record.sellable_lot2_kg).max(0.0);
        (record.sellable_lot2_kg - sold_from_old_kg).max(0.0)
    }
}

impl Default for LossRecalcEngine {
    fn default() -> Self {
        Self::new()
    }
}
