// ==========================================
// 解冻库存滚动系统 - 报表查询 API
// ==========================================
// 职责: 日报/横向预测/库存链/模型指标的只读查询
// 红线: 只读, 不触发库存链写入
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::domain::{DailyInventoryState, DailyReportRow, HorizonProjection, ModelMetrics};
use crate::engine::{ForecastAdapter, ModelKind};
use crate::repository::{InventoryStateRepository, ReportRepository};

// ==========================================
// ForecastModelStatus - 预测模型状态
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ForecastModelStatus {
    pub model_kind: ModelKind,
    pub metrics: ModelMetrics,
    /// 预测窗末日(超出无预测值)
    pub horizon_end: Option<NaiveDate>,
}

// ==========================================
// ReportApi - 报表查询 API
// ==========================================
pub struct ReportApi {
    report_repo: Arc<ReportRepository>,
    inventory_repo: Arc<InventoryStateRepository>,
    forecast: Arc<ForecastAdapter<ConfigManager>>,
}

impl ReportApi {
    pub fn new(
        report_repo: Arc<ReportRepository>,
        inventory_repo: Arc<InventoryStateRepository>,
        forecast: Arc<ForecastAdapter<ConfigManager>>,
    ) -> Self {
        Self {
            report_repo,
            inventory_repo,
            forecast,
        }
    }

    /// 查询最近一次推进产出的日报行
    pub fn latest_daily_report(&self) -> ApiResult<Option<DailyReportRow>> {
        Ok(self.report_repo.find_latest_daily_report()?)
    }

    /// 按日期查询日报行
    pub fn daily_report(&self, report_date: NaiveDate) -> ApiResult<Option<DailyReportRow>> {
        Ok(self.report_repo.find_daily_report(report_date)?)
    }

    /// 查询横向预测表(按日期升序)
    pub fn horizon_projections(&self) -> ApiResult<Vec<HorizonProjection>> {
        Ok(self.report_repo.find_projections()?)
    }

    /// 查询完整库存链(按日期升序, 含已收市与未收市记录)
    pub fn inventory_history(&self) -> ApiResult<Vec<DailyInventoryState>> {
        Ok(self.inventory_repo.find_all()?)
    }

    /// 查询当前预测模型状态(必要时先按销量历史重训)
    ///
    /// # 返回
    /// - Ok(None): 销量历史为空, 无模型
    pub fn forecast_model_status(&self) -> ApiResult<Option<ForecastModelStatus>> {
        self.forecast.ensure_current()?;

        let (kind, metrics) = match (self.forecast.model_kind(), self.forecast.metrics()) {
            (Some(kind), Some(metrics)) => (kind, metrics),
            _ => return Ok(None),
        };

        Ok(Some(ForecastModelStatus {
            model_kind: kind,
            metrics,
            horizon_end: self.forecast.horizon_end(),
        }))
    }
}
