// ==========================================
// 解冻库存滚动系统 - 需求预测领域模型
// ==========================================
// 口径: 训练样本为"日期 -> 当日销量(公斤)",
//       预测点为"日期 -> 预测销量(公斤)"
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// SalesObservation - 历史销量观测(训练样本)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesObservation {
    pub sales_date: NaiveDate,           // 销售日期
    pub sales_kg: f64,                   // 当日销量(公斤)
    pub import_batch_id: Option<String>, // 导入批次ID
    pub created_at: NaiveDateTime,       // 入库时间
}

impl SalesObservation {
    pub fn new(sales_date: NaiveDate, sales_kg: f64) -> Self {
        Self {
            sales_date,
            sales_kg,
            import_batch_id: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }
}

// ==========================================
// ForecastPoint - 单日预测点
// ==========================================
// 不可变, 每个日期至多一个值; 超出预测窗无值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub forecast_date: NaiveDate, // 预测日期
    pub predicted_kg: f64,        // 预测销量(公斤)
}

// ==========================================
// ModelMetrics - 模型样本内评估指标
// ==========================================
// MAPE 跳过真实值为0的样本; 无有效样本时为空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mape_pct: Option<f64>,       // 平均绝对百分比误差(%)
    pub rmse_kg: Option<f64>,        // 均方根误差(公斤)
    pub sample_count: usize,         // 参与评估的样本数
    pub trained_through: NaiveDate,  // 训练数据截止日期
    pub generated_at: NaiveDateTime, // 评估时间
}
