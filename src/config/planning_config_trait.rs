// ==========================================
// 解冻库存滚动系统 - 推演配置读取 Trait
// ==========================================
// 职责: 定义推演与预测模块所需的配置读取接口(不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::planning_params::PlanningParams;
use std::error::Error;

// ==========================================
// PlanningConfigReader Trait
// ==========================================
// 用途: 推演编排器、预测适配器所需的配置读取接口
// 实现者: ConfigManager(从 config_kv 表读取)
pub trait PlanningConfigReader: Send + Sync {
    /// 获取 SKU 编码
    ///
    /// # 默认值
    /// - "384706"
    fn get_sku_code(&self) -> Result<String, Box<dyn Error>>;

    /// 获取每箱净重(公斤)
    ///
    /// # 默认值
    /// - 15.3
    fn get_box_weight_kg(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取最低出冻量(公斤)
    ///
    /// # 默认值
    /// - 5.0
    fn get_min_thaw_kg(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取日历覆盖日(每月第几日)
    ///
    /// # 默认值
    /// - 23
    fn get_override_day_of_month(&self) -> Result<u32, Box<dyn Error>>;

    /// 获取日历覆盖日的固定出冻量(公斤)
    ///
    /// # 默认值
    /// - 130.0
    fn get_override_thaw_kg(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取解冻前置天数 L
    ///
    /// # 默认值
    /// - 1
    fn get_thaw_lead_days(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取预测地平线天数
    ///
    /// # 默认值
    /// - 30
    fn get_forecast_horizon_days(&self) -> Result<i64, Box<dyn Error>>;

    /// 组装一次推演所用的完整参数快照
    fn get_planning_params(&self) -> Result<PlanningParams, Box<dyn Error>> {
        Ok(PlanningParams {
            sku_code: self.get_sku_code()?,
            box_weight_kg: self.get_box_weight_kg()?,
            min_thaw_kg: self.get_min_thaw_kg()?,
            override_day_of_month: self.get_override_day_of_month()?,
            override_thaw_kg: self.get_override_thaw_kg()?,
            thaw_lead_days: self.get_thaw_lead_days()?,
            forecast_horizon_days: self.get_forecast_horizon_days()?,
        })
    }
}
