// ==========================================
// 解冻库存滚动系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::planning_config_trait::PlanningConfigReader;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = crate::db::open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 参数
    /// - key: 配置键
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;

        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    ///
    /// # 参数
    /// - key: 配置键
    /// - default: 默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 返回
    /// - Ok(String): 配置快照的JSON字符串
    /// - Err: 获取失败
    ///
    /// # 用途
    /// - 推演归档、故障排查时记录当时生效的配置
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 参数
    /// - snapshot_json: 配置快照的JSON字符串
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    /// - Err: 恢复失败
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute("BEGIN TRANSACTION", [])?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = conn.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        conn.execute("COMMIT", [])?;

        Ok(count)
    }
}

// ==========================================
// PlanningConfigReader Trait 实现
// ==========================================
impl PlanningConfigReader for ConfigManager {
    fn get_sku_code(&self) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::SKU_CODE, "384706")?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Ok("384706".to_string())
        } else {
            Ok(trimmed.to_string())
        }
    }

    fn get_box_weight_kg(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::BOX_WEIGHT_KG, "15.3")?;
        match value.parse::<f64>() {
            Ok(v) if v > 0.0 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::BOX_WEIGHT_KG,
                    raw_value = %value,
                    "箱重配置无效, 回退默认值"
                );
                Ok(15.3)
            }
        }
    }

    fn get_min_thaw_kg(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MIN_THAW_KG, "5.0")?;
        match value.parse::<f64>() {
            Ok(v) if v >= 0.0 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::MIN_THAW_KG,
                    raw_value = %value,
                    "最低出冻量配置无效, 回退默认值"
                );
                Ok(5.0)
            }
        }
    }

    fn get_override_day_of_month(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::OVERRIDE_DAY_OF_MONTH, "23")?;
        match value.parse::<u32>() {
            Ok(v) if (1..=31).contains(&v) => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::OVERRIDE_DAY_OF_MONTH,
                    raw_value = %value,
                    "日历覆盖日配置无效, 回退默认值"
                );
                Ok(23)
            }
        }
    }

    fn get_override_thaw_kg(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::OVERRIDE_THAW_KG, "130.0")?;
        match value.parse::<f64>() {
            Ok(v) if v >= 0.0 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::OVERRIDE_THAW_KG,
                    raw_value = %value,
                    "覆盖日出冻量配置无效, 回退默认值"
                );
                Ok(130.0)
            }
        }
    }

    fn get_thaw_lead_days(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::THAW_LEAD_DAYS, "1")?;
        match value.parse::<usize>() {
            Ok(v) if v >= 1 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::THAW_LEAD_DAYS,
                    raw_value = %value,
                    "解冻前置天数配置无效, 回退默认值"
                );
                Ok(1)
            }
        }
    }

    fn get_forecast_horizon_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::FORECAST_HORIZON_DAYS, "30")?;
        match value.parse::<i64>() {
            Ok(v) if v >= 1 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::FORECAST_HORIZON_DAYS,
                    raw_value = %value,
                    "预测地平线配置无效, 回退默认值"
                );
                Ok(30)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 品项与换算
    pub const SKU_CODE: &str = "sku_code";
    pub const BOX_WEIGHT_KG: &str = "box_weight_kg";

    // 出冻决策
    pub const MIN_THAW_KG: &str = "min_thaw_kg";
    pub const OVERRIDE_DAY_OF_MONTH: &str = "override_day_of_month";
    pub const OVERRIDE_THAW_KG: &str = "override_thaw_kg";

    // 解冻物理参数
    pub const THAW_LEAD_DAYS: &str = "thaw_lead_days";

    // 预测
    pub const FORECAST_HORIZON_DAYS: &str = "forecast_horizon_days";
}
