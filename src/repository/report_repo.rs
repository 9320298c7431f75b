// ==========================================
// 解冻库存滚动系统 - 报表仓储
// ==========================================
// 职责: 管理 daily_report 与 forecast_projection 表
// 红线: 两表均为派生数据, 可随时由历史与预测重算;
//       预测窗报表整表替换, 不做增量合并
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::report::{DailyReportRow, HorizonProjection, RunNotice};
use crate::domain::types::LotAge;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ReportRepository - 报表仓储
// ==========================================
/// 报表仓储
/// 职责: 当日行动报表的 upsert 与预测窗前瞻报表的整表刷新
pub struct ReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReportRepository {
    /// 创建新的 ReportRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入/覆盖一行当日行动报表
    pub fn upsert_daily_report(&self, report: &DailyReportRow) -> RepositoryResult<()> {
        let notices_json =
            serde_json::to_string(&report.notices).map_err(|e| RepositoryError::FieldValueError {
                field: "notices_json".to_string(),
                message: e.to_string(),
            })?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO daily_report (
                report_date, sku_code,
                recommended_pull_kg, recommended_pull_boxes,
                thawing_kg, available_kg, lot_age,
                projected_loss_kg, projected_loss_boxes,
                notices_json, run_id, generated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                report.report_date.to_string(),
                report.sku_code,
                report.recommended_pull_kg,
                report.recommended_pull_boxes,
                report.thawing_kg,
                report.available_kg,
                report.lot_age.to_db_str(),
                report.projected_loss_kg,
                report.projected_loss_boxes,
                notices_json,
                report.run_id,
                report.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按日期查询当日行动报表
    pub fn find_daily_report(&self, report_date: NaiveDate) -> RepositoryResult<Option<DailyReportRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM daily_report WHERE report_date = ?1"
        ))?;

        let result = stmt.query_row(params![report_date.to_string()], map_report_row);

        match result {
            Ok(report) => Ok(Some(report)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询最新一行当日行动报表
    pub fn find_latest_daily_report(&self) -> RepositoryResult<Option<DailyReportRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM daily_report ORDER BY report_date DESC LIMIT 1"
        ))?;

        let result = stmt.query_row([], map_report_row);

        match result {
            Ok(report) => Ok(Some(report)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 删除指定日期的当日行动报表(撤销最近一天时联动)
    pub fn delete_daily_report(&self, report_date: NaiveDate) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            "DELETE FROM daily_report WHERE report_date = ?1",
            params![report_date.to_string()],
        )?;
        Ok(count)
    }

    /// 整表替换预测窗前瞻报表
    ///
    /// # 返回
    /// - Ok(usize): 写入的行数
    pub fn replace_projections(&self, projections: &[HorizonProjection]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM forecast_projection", [])?;

        let mut count = 0;
        for p in projections {
            tx.execute(
                r#"
                INSERT INTO forecast_projection (
                    projection_date, pull_kg, thawing_kg, available_kg
                ) VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    p.projection_date.to_string(),
                    p.pull_kg,
                    p.thawing_kg,
                    p.available_kg,
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 查询预测窗前瞻报表(按日期升序)
    pub fn find_projections(&self) -> RepositoryResult<Vec<HorizonProjection>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT projection_date, pull_kg, thawing_kg, available_kg
            FROM forecast_projection
            ORDER BY projection_date ASC
            "#,
        )?;

        let projections = stmt
            .query_map([], |row| {
                Ok(HorizonProjection {
                    projection_date: NaiveDate::parse_from_str(&row.get::<_, String>(0)?, "%Y-%m-%d")
                        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
                    pull_kg: row.get(1)?,
                    thawing_kg: row.get(2)?,
                    available_kg: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(projections)
    }

    /// 清空全部报表(清空历史时联动)
    ///
    /// # 返回
    /// - Ok((usize, usize)): (当日报表删除数, 前瞻报表删除数)
    pub fn clear_all(&self) -> RepositoryResult<(usize, usize)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let daily = tx.execute("DELETE FROM daily_report", [])?;
        let projections = tx.execute("DELETE FROM forecast_projection", [])?;
        tx.commit()?;
        Ok((daily, projections))
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// daily_report 表的查询列清单(与 map_report_row 对齐)
const REPORT_COLUMNS: &str = r#"
    report_date, sku_code,
    recommended_pull_kg, recommended_pull_boxes,
    thawing_kg, available_kg, lot_age,
    projected_loss_kg, projected_loss_boxes,
    notices_json, run_id, generated_at
"#;

/// 行映射: daily_report -> DailyReportRow
fn map_report_row(row: &Row<'_>) -> SqliteResult<DailyReportRow> {
    let notices_json: String = row.get(9)?;
    let notices: Vec<RunNotice> = serde_json::from_str(&notices_json).unwrap_or_default();

    Ok(DailyReportRow {
        report_date: NaiveDate::parse_from_str(&row.get::<_, String>(0)?, "%Y-%m-%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        sku_code: row.get(1)?,
        recommended_pull_kg: row.get(2)?,
        recommended_pull_boxes: row.get(3)?,
        thawing_kg: row.get(4)?,
        available_kg: row.get(5)?,
        lot_age: LotAge::from_str(&row.get::<_, String>(6)?),
        projected_loss_kg: row.get(7)?,
        projected_loss_boxes: row.get(8)?,
        notices,
        run_id: row.get(10)?,
        generated_at: chrono::NaiveDateTime::parse_from_str(
            &row.get::<_, String>(11)?,
            "%Y-%m-%d %H:%M:%S",
        )
        .unwrap_or_else(|_| chrono::NaiveDateTime::default()),
    })
}
