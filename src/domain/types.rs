// ==========================================
// 解冻库存滚动系统 - 领域类型定义
// ==========================================
// 库龄口径: 可售期固定2天, 第2天收市未售出即报废
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 批次库龄 (Lot Age)
// ==========================================
// 口径: 取当日在库批次中最老的一档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotAge {
    TwoDays, // 在售第2天(今晚到期)
    OneDay,  // 在售第1天
    None,    // 无可售库存
}

impl fmt::Display for LotAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotAge::TwoDays => write!(f, "TWO_DAYS"),
            LotAge::OneDay => write!(f, "ONE_DAY"),
            LotAge::None => write!(f, "NONE"),
        }
    }
}

impl LotAge {
    /// 从字符串解析库龄
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TWO_DAYS" => LotAge::TwoDays,
            "ONE_DAY" => LotAge::OneDay,
            _ => LotAge::None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            LotAge::TwoDays => "TWO_DAYS",
            LotAge::OneDay => "ONE_DAY",
            LotAge::None => "NONE",
        }
    }

    /// 对应的 i18n 文案键
    pub fn label_key(&self) -> &'static str {
        match self {
            LotAge::TwoDays => "report.lot_age.two_days",
            LotAge::OneDay => "report.lot_age.one_day",
            LotAge::None => "report.lot_age.none",
        }
    }
}

// ==========================================
// 提示等级 (Notice Level)
// ==========================================
// 红线: 提示不中断推演, 失败才中断
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeLevel {
    Info,    // 信息
    Warning, // 警告
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeLevel::Info => write!(f, "INFO"),
            NoticeLevel::Warning => write!(f, "WARNING"),
        }
    }
}

// ==========================================
// 提示代码 (Notice Code)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeCode {
    MissingForecast,         // 目标日期无预测值, 按0处理
    DemandExceededStock,     // 当日销量超过可售库存, 超出部分未计损
    CalendarOverrideApplied, // 日历覆盖规则生效
    ReportRefreshFailed,     // 派生报表刷新失败(主状态已提交)
}

impl fmt::Display for NoticeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeCode::MissingForecast => write!(f, "MISSING_FORECAST"),
            NoticeCode::DemandExceededStock => write!(f, "DEMAND_EXCEEDED_STOCK"),
            NoticeCode::CalendarOverrideApplied => write!(f, "CALENDAR_OVERRIDE_APPLIED"),
            NoticeCode::ReportRefreshFailed => write!(f, "REPORT_REFRESH_FAILED"),
        }
    }
}

impl NoticeCode {
    /// 对应的 i18n 文案键
    pub fn label_key(&self) -> &'static str {
        match self {
            NoticeCode::MissingForecast => "notice.missing_forecast",
            NoticeCode::DemandExceededStock => "notice.demand_exceeded_stock",
            NoticeCode::CalendarOverrideApplied => "notice.calendar_override_applied",
            NoticeCode::ReportRefreshFailed => "notice.report_refresh_failed",
        }
    }
}

// ==========================================
// 重置范围 (Reset Scope)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResetScope {
    LastDay, // 撤销最近一天
    All,     // 清空全部历史
}

impl fmt::Display for ResetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetScope::LastDay => write!(f, "LAST_DAY"),
            ResetScope::All => write!(f, "ALL"),
        }
    }
}
