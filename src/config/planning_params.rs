// ==========================================
// 解冻库存滚动系统 - 滚动推演参数快照
// ==========================================
// 职责: 承载一次推演所用的全部配置参数
// 说明: 推演开始时从 config_kv 取一次快照, 推演过程中不再读库
// ==========================================

use serde::{Deserialize, Serialize};

/// 滚动推演参数快照
///
/// 由 `ConfigManager::get_planning_params` 在每次推演开始时组装,
/// 引擎只依赖本结构, 不直接接触配置存储。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningParams {
    /// SKU 编码(单品系统, 仅用于报表标识)
    pub sku_code: String,
    /// 每箱净重(公斤), 用于公斤 → 箱的换算
    pub box_weight_kg: f64,
    /// 最低出冻量(公斤), 出冻决策的下限
    pub min_thaw_kg: f64,
    /// 日历覆盖日(每月第几日固定出冻量)
    pub override_day_of_month: u32,
    /// 日历覆盖日的固定出冻量(公斤)
    pub override_thaw_kg: f64,
    /// 解冻前置天数 L(出冻后 L 天转为可售)
    pub thaw_lead_days: usize,
    /// 预测地平线(训练截止后再向前预测的天数)
    pub forecast_horizon_days: i64,
}

impl Default for PlanningParams {
    fn default() -> Self {
        Self {
            sku_code: "384706".to_string(),
            box_weight_kg: 15.3,
            min_thaw_kg: 5.0,
            override_day_of_month: 23,
            override_thaw_kg: 130.0,
            thaw_lead_days: 1,
            forecast_horizon_days: 30,
        }
    }
}

impl PlanningParams {
    /// 公斤换算为整箱数(向上取整, 非正的箱重视为换算不可用返回0)
    pub fn boxes_for_kg(&self, kg: f64) -> i64 {
        if self.box_weight_kg <= 0.0 || kg <= 0.0 {
            return 0;
        }
        (kg / self.box_weight_kg).ceil() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = PlanningParams::default();
        assert_eq!(params.sku_code, "384706");
        assert_eq!(params.box_weight_kg, 15.3);
        assert_eq!(params.min_thaw_kg, 5.0);
        assert_eq!(params.override_day_of_month, 23);
        assert_eq!(params.override_thaw_kg, 130.0);
        assert_eq!(params.thaw_lead_days, 1);
        assert_eq!(params.forecast_horizon_days, 30);
    }

    #[test]
    fn test_boxes_for_kg_rounds_up() {
        let params = PlanningParams::default();
        // 50 / 15.3 = 3.27 → 4箱
        assert_eq!(params.boxes_for_kg(50.0), 4);
        // 正好整箱不进位
        assert_eq!(params.boxes_for_kg(30.6), 2);
        assert_eq!(params.boxes_for_kg(0.0), 0);
        assert_eq!(params.boxes_for_kg(-3.0), 0);
    }

    #[test]
    fn test_boxes_for_kg_invalid_box_weight() {
        let params = PlanningParams {
            box_weight_kg: 0.0,
            ..PlanningParams::default()
        };
        assert_eq!(params.boxes_for_kg(100.0), 0);
    }
}
