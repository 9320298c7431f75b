// ==========================================
// 解冻库存滚动系统 - 历史销量仓储
// ==========================================
// 职责: 管理 sales_history 表(模型训练数据)
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::forecast::SalesObservation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// SalesHistoryRepository - 历史销量仓储
// ==========================================
/// 历史销量仓储
/// 职责: 训练数据的批量写入与有序读取, 并提供数据指纹
/// 用途: 预测适配器据指纹判断是否需要重建模型
pub struct SalesHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SalesHistoryRepository {
    /// 创建新的 SalesHistoryRepository 实例
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

    /// 批量写入销量观测（INSERT OR REPLACE, 按日期幂等）
    ///
    /// # 返回
    /// - Ok(usize): 写入的记录数
    ///
    /// # 说明
    /// - 同日期重复导入以最后一次为准
    /// - 使用事务确保原子性
    pub fn batch_upsert(&self, observations: &[SalesObservation]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for obs in observations {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO sales_history (
                    sales_date, sales_kg, import_batch_id, created_at
                ) VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    obs.sales_date.to_string(),
                    obs.sales_kg,
                    obs.import_batch_id,
                    obs.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 查询全部销量观测(按日期升序)
    pub fn find_all(&self) -> RepositoryResult<Vec<SalesObservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT sales_date, sales_kg, import_batch_id, created_at
            FROM sales_history
            ORDER BY sales_date ASC
            "#,
        )?;

        let observations = stmt
            .query_map([], map_observation_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(observations)
    }

    /// 观测条数
    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sales_history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 最后一个观测日期
    pub fn find_last_date(&self) -> RepositoryResult<Option<NaiveDate>> {
        let conn = self.get_conn()?;
        let last: Option<String> =
            conn.query_row("SELECT MAX(sales_date) FROM sales_history", [], |row| row.get(0))?;

        match last {
            Some(s) => {
                let date = NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                    RepositoryError::FieldValueError {
                        field: "sales_date".to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(Some(date))
            }
            None => Ok(None),
        }
    }

    /// 训练数据指纹
    ///
    /// 口径: 条数 + 日期范围 + 销量总和(保留3位小数)。
    /// 任一训练数据变化都会改变指纹, 触发预测适配器重建。
    ///
    /// # 返回
    /// - Ok(Some(String)): 指纹
    /// - Ok(None): 无训练数据
    pub fn fingerprint(&self) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let (count, min_date, max_date, total): (i64, Option<String>, Option<String>, Option<f64>) =
            conn.query_row(
                "SELECT COUNT(*), MIN(sales_date), MAX(sales_date), SUM(sales_kg) FROM sales_history",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        if count == 0 {
            return Ok(None);
        }

        Ok(Some(format!(
            "{}|{}|{}|{:.3}",
            count,
            min_date.unwrap_or_default(),
            max_date.unwrap_or_default(),
            total.unwrap_or(0.0),
        )))
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 行映射: sales_history -> SalesObservation
fn map_observation_row(row: &Row<'_>) -> SqliteResult<SalesObservation> {
    Ok(SalesObservation {
        sales_date: NaiveDate::parse_from_str(&row.get::<_, String>(0)?, "%Y-%m-%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        sales_kg: row.get(1)?,
        import_batch_id: row.get(2)?,
        created_at: chrono::NaiveDateTime::parse_from_str(
            &row.get::<_, String>(3)?,
            "%Y-%m-%d %H:%M:%S",
        )
        .unwrap_or_else(|_| chrono::NaiveDateTime::default()),
    })
}
