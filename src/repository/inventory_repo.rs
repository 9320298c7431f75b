// ==========================================
// 解冻库存滚动系统 - 每日库存状态仓储
// ==========================================
// 职责: 管理 inventory_state 表(唯一事实来源)
// 红线: Repository 不含业务逻辑
// 红线: 历史只追加; 一天的"收市+追加+报废列重写"必须在
//       同一事务内完成, 失败则全部回滚
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::inventory::DailyInventoryState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// inventory_state 表的查询列清单(与 map_state_row 对齐)
const STATE_COLUMNS: &str = r#"
    state_date, thawing_kg_json, sellable_lot1_kg, sellable_lot2_kg,
    observed_sales_kg, realized_loss_kg, created_at
"#;

// ==========================================
// InventoryStateRepository - 每日库存状态仓储
// ==========================================
/// 每日库存状态仓储
/// 职责: 提供"读全量 / 读最新 / 原子提交一天"的存取语义
pub struct InventoryStateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryStateRepository {
    /// 创建新的 InventoryStateRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
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

    /// 查询全部历史(按日期升序)
    pub fn find_all(&self) -> RepositoryResult<Vec<DailyInventoryState>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STATE_COLUMNS} FROM inventory_state ORDER BY state_date ASC"
        ))?;

        let states = stmt
            .query_map([], map_state_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(states)
    }

    /// 查询最新一条记录
    pub fn find_latest(&self) -> RepositoryResult<Option<DailyInventoryState>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STATE_COLUMNS} FROM inventory_state ORDER BY state_date DESC LIMIT 1"
        ))?;

        let result = stmt.query_row([], map_state_row);

        match result {
            Ok(state) => Ok(Some(state)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按日期查询单条记录
    pub fn find_by_date(&self, state_date: NaiveDate) -> RepositoryResult<Option<DailyInventoryState>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STATE_COLUMNS} FROM inventory_state WHERE state_date = ?1"
        ))?;

        let result = stmt.query_row(params![state_date.to_string()], map_state_row);

        match result {
            Ok(state) => Ok(Some(state)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 历史记录条数
    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM inventory_state", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 追加一条未收市记录(冷启动引导用)
    ///
    /// # 说明
    /// - 日期重复时由主键约束拒绝(UniqueConstraintViolation)
    pub fn append_open_state(&self, state: &DailyInventoryState) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO inventory_state (
                state_date, thawing_kg_json, sellable_lot1_kg, sellable_lot2_kg,
                observed_sales_kg, realized_loss_kg, created_at
            ) VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5)
            "#,
            params![
                state.state_date.to_string(),
                encode_thawing(&state.thawing_kg)?,
                state.sellable_lot1_kg,
                state.sellable_lot2_kg,
                state.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 原子提交一天的推演结果
    ///
    /// 同一事务内完成:
    /// 1. 回填 closing_date 记录的实际销量(收市)
    /// 2. 追加次日新记录
    /// 3. 重写整列实际报废(重算通道输出)
    ///
    /// # 参数
    /// - closing_date: 被收市的记录日期
    /// - sales_kg: 当日实际销量
    /// - next_state: 次日新状态
    /// - loss_column: 重算后的 (日期, 实际报废) 全量列
    ///
    /// # 说明
    /// - 任一步失败整体回滚, 不落半截状态
    pub fn commit_day_transition(
        &self,
        closing_date: NaiveDate,
        sales_kg: f64,
        next_state: &DailyInventoryState,
        loss_column: &[(NaiveDate, f64)],
    ) -> RepositoryResult<()> {
        let thawing_json = encode_thawing(&next_state.thawing_kg)?;
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let closed = tx.execute(
            "UPDATE inventory_state SET observed_sales_kg = ?2 WHERE state_date = ?1",
            params![closing_date.to_string(), sales_kg],
        )?;
        if closed != 1 {
            return Err(RepositoryError::NotFound {
                entity: "inventory_state".to_string(),
                id: closing_date.to_string(),
            });
        }

        tx.execute(
            r#"
            INSERT INTO inventory_state (
                state_date, thawing_kg_json, sellable_lot1_kg, sellable_lot2_kg,
                observed_sales_kg, realized_loss_kg, created_at
            ) VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5)
            "#,
            params![
                next_state.state_date.to_string(),
                thawing_json,
                next_state.sellable_lot1_kg,
                next_state.sellable_lot2_kg,
                next_state.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        for (state_date, loss_kg) in loss_column {
            tx.execute(
                "UPDATE inventory_state SET realized_loss_kg = ?2 WHERE state_date = ?1",
                params![state_date.to_string(), loss_kg],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 重写整列实际报废(独立重算入口, 幂等)
    pub fn update_loss_column(&self, loss_column: &[(NaiveDate, f64)]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for (state_date, loss_kg) in loss_column {
            count += tx.execute(
                "UPDATE inventory_state SET realized_loss_kg = ?2 WHERE state_date = ?1",
                params![state_date.to_string(), loss_kg],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 撤销最近一天
    ///
    /// 同一事务内: 删除最新记录, 并将新的最新记录重新置为未收市
    /// (其实际销量清空, 等待重新推演)
    ///
    /// # 返回
    /// - Ok(Some(date)): 被删除记录的日期
    /// - Ok(None): 历史为空
    pub fn delete_latest(&self) -> RepositoryResult<Option<NaiveDate>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let latest: Option<String> = {
            let mut stmt =
                tx.prepare("SELECT state_date FROM inventory_state ORDER BY state_date DESC LIMIT 1")?;
            let result = stmt.query_row([], |row| row.get(0));
            match result {
                Ok(d) => Some(d),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            }
        };

        let latest = match latest {
            Some(d) => d,
            None => return Ok(None),
        };

        tx.execute(
            "DELETE FROM inventory_state WHERE state_date = ?1",
            params![latest],
        )?;
        tx.execute(
            r#"
            UPDATE inventory_state SET observed_sales_kg = NULL
            WHERE state_date = (SELECT MAX(state_date) FROM inventory_state)
            "#,
            [],
        )?;

        tx.commit()?;

        let dropped = NaiveDate::parse_from_str(&latest, "%Y-%m-%d")
            .map_err(|e| RepositoryError::FieldValueError {
                field: "state_date".to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(dropped))
    }

    /// 清空全部历史
    ///
    /// # 返回
    /// - Ok(usize): 删除的记录数
    pub fn clear(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute("DELETE FROM inventory_state", [])?;
        Ok(count)
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 解冻管线编码为 JSON 数组文本
fn encode_thawing(thawing_kg: &[f64]) -> RepositoryResult<String> {
    serde_json::to_string(thawing_kg).map_err(|e| RepositoryError::FieldValueError {
        field: "thawing_kg_json".to_string(),
        message: e.to_string(),
    })
}

/// 行映射: inventory_state -> DailyInventoryState
fn map_state_row(row: &Row<'_>) -> SqliteResult<DailyInventoryState> {
    let thawing_json: String = row.get(1)?;
    Ok(DailyInventoryState {
        state_date: NaiveDate::parse_from_str(&row.get::<_, String>(0)?, "%Y-%m-%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        thawing_kg: serde_json::from_str(&thawing_json).unwrap_or_default(),
        sellable_lot1_kg: row.get(2)?,
        sellable_lot2_kg: row.get(3)?,
        observed_sales_kg: row.get(4)?,
        realized_loss_kg: row.get(5)?,
        created_at: chrono::NaiveDateTime::parse_from_str(
            &row.get::<_, String>(6)?,
            "%Y-%m-%d %H:%M:%S",
        )
        .unwrap_or_else(|_| chrono::NaiveDateTime::default()),
    })
}
