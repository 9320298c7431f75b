// ==========================================
// 解冻库存滚动系统 - 报表领域模型
// ==========================================
// 用途: 驾驶舱/CLI 展示, 只读派生数据
// 红线: 报表可随时由历史与预测重算, 不是状态本身
// ==========================================

use crate::domain::types::{LotAge, NoticeCode, NoticeLevel};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// DailyReportRow - 当日行动报表(每次推演一行)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportRow {
    pub report_date: NaiveDate,      // 推演日期
    pub sku_code: String,            // SKU编码
    pub recommended_pull_kg: f64,    // 今日建议出冻量(公斤)
    pub recommended_pull_boxes: i64, // 今日建议出冻量(箱)
    pub thawing_kg: f64,             // 当日解冻中合计(公斤)
    pub available_kg: f64,           // 当日可售合计(公斤)
    pub lot_age: LotAge,             // 批次库龄
    pub projected_loss_kg: f64,      // 次日预计报废(公斤)
    pub projected_loss_boxes: i64,   // 次日预计报废(箱)
    pub notices: Vec<RunNotice>,     // 推演提示(可解释性)
    pub run_id: String,              // 产生本行的推演ID
    pub generated_at: NaiveDateTime, // 生成时间
}

// ==========================================
// HorizonProjection - 预测窗前瞻三元组
// ==========================================
// 口径: 仅对"2天前瞻预测完整"的日期生成;
//       只读推演, 不构成状态迁移
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonProjection {
    pub projection_date: NaiveDate, // 目标日期
    pub pull_kg: f64,               // 当日应出冻量(覆盖2天后需求)
    pub thawing_kg: f64,            // 当日解冻中量(覆盖1天后需求)
    pub available_kg: f64,          // 当日可售量(覆盖当日需求)
}

// ==========================================
// RunNotice - 推演提示
// ==========================================
// 随推演结果返回并落入当日报表, 不中断流程
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunNotice {
    pub level: NoticeLevel,  // 提示等级
    pub code: NoticeCode,    // 提示代码
    pub detail: JsonValue,   // 结构化明细(可解释性)
}

impl RunNotice {
    pub fn info(code: NoticeCode, detail: JsonValue) -> Self {
        Self {
            level: NoticeLevel::Info,
            code,
            detail,
        }
    }

    pub fn warning(code: NoticeCode, detail: JsonValue) -> Self {
        Self {
            level: NoticeLevel::Warning,
            code,
            detail,
        }
    }
}
