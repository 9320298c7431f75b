// ==========================================
// 解冻库存滚动系统 - 需求预测引擎
// ==========================================
// 职责: 销量历史拟合 + 按日预测查表
// 输入: sales_history (训练数据)
// 输出: 预测表 (训练起点 → 训练截止 + 地平线)
// ==========================================
// 模型: 最小二乘线性回归(截距 + 趋势 + 周内哑变量)
// 降级链: 全特征 → 纯趋势 → 样本均值
// ==========================================

use crate::config::PlanningConfigReader;
use crate::domain::forecast::{ModelMetrics, SalesObservation};
use crate::engine::error::{SimulationError, SimulationResult};
use crate::repository::SalesHistoryRepository;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// 全特征数: 截距 + 趋势 + 周一到周六哑变量(周日为基准日)
const FULL_FEATURES: usize = 8;
/// 趋势特征数: 截距 + 趋势
const TREND_FEATURES: usize = 2;
/// 法方程主元判奇阈值
const SINGULAR_EPS: f64 = 1e-10;

// ==========================================
// DemandPredictor - 按日预测查询接口
// ==========================================
// 实现者: ForecastAdapter(查预测表), 测试桩
pub trait DemandPredictor {
    /// 查询某日的预测销量(公斤)
    ///
    /// # 返回
    /// - Some(f64): 模型原始输出(可能为负, 由调用方按口径截断)
    /// - None: 日期在预测表范围之外
    fn predict(&self, date: NaiveDate) -> Option<f64>;
}

// ==========================================
// 模型系数与模型种类
// ==========================================

/// 实际生效的模型种类(降级链的落点)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelKind {
    TrendSeasonal,
    Trend,
    Mean,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::TrendSeasonal => "TREND_SEASONAL",
            ModelKind::Trend => "TREND",
            ModelKind::Mean => "MEAN",
        }
    }
}

#[derive(Debug, Clone)]
enum ModelCoefficients {
    /// 截距 + 趋势 + 周内哑变量(周一..周六)
    TrendSeasonal {
        intercept: f64,
        slope: f64,
        weekday: [f64; 6],
    },
    /// 截距 + 趋势
    Trend { intercept: f64, slope: f64 },
    /// 样本均值
    Mean { mean: f64 },
}

// ==========================================
// DemandModel - 拟合后的需求模型
// ==========================================
#[derive(Debug)]
pub struct DemandModel {
    train_start: NaiveDate,
    coefficients: ModelCoefficients,
}

impl DemandModel {
    /// 用销量历史拟合需求模型
    ///
    /// # 参数
    /// - observations: 销量观测(日期唯一)
    ///
    /// # 降级链
    /// - 样本数 >= 8 且法方程可解: 全特征模型
    /// - 否则样本数 >= 2 且可解: 纯趋势模型
    /// - 否则: 样本均值模型
    pub fn fit(observations: &[SalesObservation]) -> SimulationResult<Self> {
        if observations.is_empty() {
            return Err(SimulationError::NoTrainingData(
                "销量历史为空, 无法拟合需求模型".to_string(),
            ));
        }

        let train_start = observations
            .iter()
            .map(|o| o.sales_date)
            .min()
            .unwrap_or(observations[0].sales_date);

        let rows: Vec<([f64; FULL_FEATURES], f64)> = observations
            .iter()
            .map(|o| (feature_row(train_start, o.sales_date), o.sales_kg))
            .collect();

        // 全特征: 截距 + 趋势 + 周内哑变量
        if rows.len() >= FULL_FEATURES {
            if let Some(beta) = solve_normal_equations(&rows, FULL_FEATURES) {
                let mut weekday = [0.0; 6];
                weekday.copy_from_slice(&beta[2..FULL_FEATURES]);
                return Ok(Self {
                    train_start,
                    coefficients: ModelCoefficients::TrendSeasonal {
                        intercept: beta[0],
                        slope: beta[1],
                        weekday,
                    },
                });
            }
            warn!(sample_count = rows.len(), "全特征法方程奇异, 降级为趋势模型");
        }

        // 降级1: 截距 + 趋势
        if rows.len() >= TREND_FEATURES {
            if let Some(beta) = solve_normal_equations(&rows, TREND_FEATURES) {
                return Ok(Self {
                    train_start,
                    coefficients: ModelCoefficients::Trend {
                        intercept: beta[0],
                        slope: beta[1],
                    },
                });
            }
            warn!(sample_count = rows.len(), "趋势法方程奇异, 降级为均值模型");
        }

        // 降级2: 样本均值
        let mean = rows.iter().map(|(_, y)| *y).sum::<f64>() / rows.len() as f64;
        Ok(Self {
            train_start,
            coefficients: ModelCoefficients::Mean { mean },
        })
    }

    /// 预测某日销量(公斤, 模型原始输出不截断)
    pub fn predict_kg(&self, date: NaiveDate) -> f64 {
        let t = (date - self.train_start).num_days() as f64;
        match &self.coefficients {
            ModelCoefficients::TrendSeasonal {
                intercept,
                slope,
                weekday,
            } => {
                let mut y = *intercept + *slope * t;
                let wd = date.weekday().num_days_from_monday() as usize;
                if wd < 6 {
                    y += weekday[wd];
                }
                y
            }
            ModelCoefficients::Trend { intercept, slope } => *intercept + *slope * t,
            ModelCoefficients::Mean { mean } => *mean,
        }
    }

    /// 样本内评估(MAPE 跳过实际为0的样本, RMSE 全样本)
    pub fn evaluate(&self, observations: &[SalesObservation]) -> ModelMetrics {
        let mut se_sum = 0.0;
        let mut ape_sum = 0.0;
        let mut ape_count = 0usize;

        for obs in observations {
            let err = obs.sales_kg - self.predict_kg(obs.sales_date);
            se_sum += err * err;
            if obs.sales_kg.abs() > f64::EPSILON {
                ape_sum += (err / obs.sales_kg).abs();
                ape_count += 1;
            }
        }

        let sample_count = observations.len();
        let rmse_kg = if sample_count > 0 {
            Some((se_sum / sample_count as f64).sqrt())
        } else {
            None
        };
        let mape_pct = if ape_count > 0 {
            Some(ape_sum / ape_count as f64 * 100.0)
        } else {
            None
        };
        let trained_through = observations
            .iter()
            .map(|o| o.sales_date)
            .max()
            .unwrap_or(self.train_start);

        ModelMetrics {
            mape_pct,
            rmse_kg,
            sample_count,
            trained_through,
            generated_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn train_start(&self) -> NaiveDate {
        self.train_start
    }

    pub fn kind(&self) -> ModelKind {
        match self.coefficients {
            ModelCoefficients::TrendSeasonal { .. } => ModelKind::TrendSeasonal,
            ModelCoefficients::Trend { .. } => ModelKind::Trend,
            ModelCoefficients::Mean { .. } => ModelKind::Mean,
        }
    }
}

/// 构造某日的特征行: [1, 距训练起点天数, 周一..周六哑变量]
fn feature_row(train_start: NaiveDate, date: NaiveDate) -> [f64; FULL_FEATURES] {
    let mut row = [0.0; FULL_FEATURES];
    row[0] = 1.0;
    row[1] = (date - train_start).num_days() as f64;
    let wd = date.weekday().num_days_from_monday() as usize;
    if wd < 6 {
        row[2 + wd] = 1.0;
    }
    row
}

/// 构造并求解法方程 X'Xb = X'y (取每行前 k 个特征)
fn solve_normal_equations(rows: &[([f64; FULL_FEATURES], f64)], k: usize) -> Option<Vec<f64>> {
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];

    for (features, y) in rows {
        for i in 0..k {
            xty[i] += features[i] * y;
            for j in 0..k {
                xtx[i][j] += features[i] * features[j];
            }
        }
    }

    solve_linear_system(&mut xtx, &mut xty)
}

/// 列主元高斯消元, 矩阵奇异返回 None
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if a[pivot_row][col].abs() < SINGULAR_EPS {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for c in col..n {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for c in (row + 1)..n {
            acc -= a[row][c] * x[c];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}

// ==========================================
// ForecastAdapter - 带缓存的预测适配器
// ==========================================
// 缓存键: 销量历史指纹(条数 + 日期范围 + 总量)
// 失效: 指纹变化时重建, 推演过程中只查表不触库
struct CachedForecast {
    fingerprint: String,
    table: BTreeMap<NaiveDate, f64>,
    metrics: ModelMetrics,
    model_kind: ModelKind,
    training_end: NaiveDate,
    horizon_end: NaiveDate,
}

pub struct ForecastAdapter<C>
where
    C: PlanningConfigReader,
{
    sales_repo: Arc<SalesHistoryRepository>,
    config: Arc<C>,
    cache: Mutex<Option<CachedForecast>>,
}

impl<C> ForecastAdapter<C>
where
    C: PlanningConfigReader,
{
    pub fn new(sales_repo: Arc<SalesHistoryRepository>, config: Arc<C>) -> Self {
        Self {
            sales_repo,
            config,
            cache: Mutex::new(None),
        }
    }

    /// 让预测表与销量历史保持一致, 必要时重建
    ///
    /// # 返回
    /// - Ok(true): 本次发生了重建
    /// - Ok(false): 缓存命中或无训练数据
    pub fn ensure_current(&self) -> SimulationResult<bool> {
        let fingerprint = self.sales_repo.fingerprint()?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|e| SimulationError::StateConflict(format!("预测缓存锁获取失败: {}", e)))?;

        let fingerprint = match fingerprint {
            Some(fp) => fp,
            None => {
                if cache.is_some() {
                    warn!("销量历史已清空, 预测缓存失效");
                    *cache = None;
                }
                return Ok(false);
            }
        };

        if let Some(cached) = cache.as_ref() {
            if cached.fingerprint == fingerprint {
                return Ok(false);
            }
        }

        let started = Instant::now();
        let observations = self.sales_repo.find_all()?;
        let model = DemandModel::fit(&observations)?;
        let metrics = model.evaluate(&observations);
        let training_end = metrics.trained_through;

        let horizon_days = self
            .config
            .get_forecast_horizon_days()
            .map_err(|e| SimulationError::ConfigError(e.to_string()))?;
        let horizon_end = training_end + chrono::Duration::days(horizon_days);

        let mut table = BTreeMap::new();
        let mut date = model.train_start();
        while date <= horizon_end {
            table.insert(date, model.predict_kg(date));
            date += chrono::Duration::days(1);
        }

        info!(
            model_kind = model.kind().as_str(),
            sample_count = metrics.sample_count,
            mape_pct = ?metrics.mape_pct,
            rmse_kg = ?metrics.rmse_kg,
            training_end = %training_end,
            horizon_end = %horizon_end,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "需求模型重建完成"
        );

        *cache = Some(CachedForecast {
            fingerprint,
            table,
            metrics,
            model_kind: model.kind(),
            training_end,
            horizon_end,
        });
        Ok(true)
    }

    /// 强制丢弃缓存(下次 ensure_current 必然重建)
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }

    pub fn has_model(&self) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.is_some())
            .unwrap_or(false)
    }

    pub fn metrics(&self) -> Option<ModelMetrics> {
        let cache = self.cache.lock().ok()?;
        cache.as_ref().map(|c| c.metrics.clone())
    }

    pub fn model_kind(&self) -> Option<ModelKind> {
        let cache = self.cache.lock().ok()?;
        cache.as_ref().map(|c| c.model_kind)
    }

    /// 训练数据截止日期
    pub fn training_end(&self) -> Option<NaiveDate> {
        let cache = self.cache.lock().ok()?;
        cache.as_ref().map(|c| c.training_end)
    }

    /// 预测表最后一天
    pub fn horizon_end(&self) -> Option<NaiveDate> {
        let cache = self.cache.lock().ok()?;
        cache.as_ref().map(|c| c.horizon_end)
    }
}

impl<C> DemandPredictor for ForecastAdapter<C>
where
    C: PlanningConfigReader,
{
    fn predict(&self, date: NaiveDate) -> Option<f64> {
        let cache = self.cache.lock().ok()?;
        cache.as_ref()?.table.get(&date).copied()
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obs(date: &str, kg: f64) -> SalesObservation {
        SalesObservation::new(d(date), kg)
    }

    /// y = 50 + 2t 的纯线性序列, 样本不足8条 → 趋势模型, 外推应继续沿直线
    #[test]
    fn test_fit_trend_only_on_small_sample() {
        let observations: Vec<SalesObservation> = (0..5)
            .map(|t| {
                SalesObservation::new(
                    d("2024-01-01") + chrono::Duration::days(t),
                    50.0 + 2.0 * t as f64,
                )
            })
            .collect();

        let model = DemandModel::fit(&observations).unwrap();
        assert_eq!(model.kind(), ModelKind::Trend);

        let yhat = model.predict_kg(d("2024-01-11"));
        assert!((yhat - 70.0).abs() < 1e-6, "外推值 {} 应接近 70", yhat);
    }

    /// 四周纯周期数据(无趋势) → 全特征模型应还原每个周内档位
    #[test]
    fn test_fit_recovers_weekday_pattern() {
        // 周一..周日档位
        let pattern = [100.0, 80.0, 90.0, 85.0, 120.0, 150.0, 60.0];
        let start = d("2024-01-01"); // 周一
        let observations: Vec<SalesObservation> = (0..28)
            .map(|t| {
                SalesObservation::new(
                    start + chrono::Duration::days(t),
                    pattern[(t % 7) as usize],
                )
            })
            .collect();

        let model = DemandModel::fit(&observations).unwrap();
        assert_eq!(model.kind(), ModelKind::TrendSeasonal);

        // 下一个周五(2024-02-02)应接近 120
        let yhat = model.predict_kg(d("2024-02-02"));
        assert!((yhat - 120.0).abs() < 1e-6, "周五预测 {} 应接近 120", yhat);
        // 下一个周日(2024-02-04)应接近 60
        let yhat = model.predict_kg(d("2024-02-04"));
        assert!((yhat - 60.0).abs() < 1e-6, "周日预测 {} 应接近 60", yhat);
    }

    /// 全部落在同一周内日 → 哑变量列奇异, 应降级为趋势模型而不是失败
    #[test]
    fn test_fit_degrades_on_singular_design() {
        let observations: Vec<SalesObservation> = (0..10)
            .map(|w| {
                SalesObservation::new(
                    d("2024-01-01") + chrono::Duration::days(w * 7),
                    100.0 + 7.0 * w as f64,
                )
            })
            .collect();

        let model = DemandModel::fit(&observations).unwrap();
        assert_eq!(model.kind(), ModelKind::Trend);
        let yhat = model.predict_kg(d("2024-01-08"));
        assert!((yhat - 107.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_single_observation_uses_mean() {
        let observations = vec![obs("2024-03-15", 88.0)];
        let model = DemandModel::fit(&observations).unwrap();
        assert_eq!(model.kind(), ModelKind::Mean);
        assert!((model.predict_kg(d("2024-06-01")) - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_empty_history_is_error() {
        let err = DemandModel::fit(&[]).unwrap_err();
        assert!(matches!(err, SimulationError::NoTrainingData(_)));
    }

    #[test]
    fn test_evaluate_skips_zero_actuals_in_mape() {
        let observations = vec![
            obs("2024-01-01", 100.0),
            obs("2024-01-02", 0.0),
            obs("2024-01-03", 100.0),
        ];
        // 均值模型: (100 + 0 + 100) / 3 = 66.67
        let model = DemandModel {
            train_start: d("2024-01-01"),
            coefficients: ModelCoefficients::Mean { mean: 200.0 / 3.0 },
        };
        let metrics = model.evaluate(&observations);

        assert_eq!(metrics.sample_count, 3);
        assert_eq!(metrics.trained_through, d("2024-01-03"));
        // MAPE 仅统计两条非零样本: |100-66.67|/100 = 33.33%
        let mape = metrics.mape_pct.unwrap();
        assert!((mape - 100.0 / 3.0).abs() < 1e-6, "MAPE {} 应接近 33.33", mape);
        assert!(metrics.rmse_kg.unwrap() > 0.0);
    }

    #[test]
    fn test_evaluate_perfect_fit() {
        let observations: Vec<SalesObservation> = (0..4)
            .map(|t| {
                SalesObservation::new(d("2024-01-01") + chrono::Duration::days(t), 10.0 + t as f64)
            })
            .collect();
        let model = DemandModel::fit(&observations).unwrap();
        let metrics = model.evaluate(&observations);

        assert!(metrics.rmse_kg.unwrap() < 1e-9);
        assert!(metrics.mape_pct.unwrap() < 1e-9);
    }

    #[test]
    fn test_solve_linear_system_singular_returns_none() {
        let mut a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let mut b = vec![3.0, 6.0];
        assert!(solve_linear_system(&mut a, &mut b).is_none());
    }

    #[test]
    fn test_solve_linear_system_pivoting() {
        // 首行主元为0, 必须换行
        let mut a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let mut b = vec![2.0, 3.0];
        let x = solve_linear_system(&mut a, &mut b).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }
}
