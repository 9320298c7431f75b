// ==========================================
// 解冻库存滚动系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少偶发 busy 错误
// - 建库 DDL 集中于此, 应用启动与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等, 可重复执行）
///
/// 表清单:
/// - schema_version: 库版本标记
/// - config_scope / config_kv: 键值配置
/// - sales_history: 历史销量(模型训练数据)
/// - inventory_state: 每日库存状态(唯一事实来源, 只追加)
/// - daily_report: 当日行动报表(派生, 可重算)
/// - forecast_projection: 预测窗前瞻报表(派生, 整表替换)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS sales_history (
            sales_date TEXT PRIMARY KEY,
            sales_kg REAL NOT NULL,
            import_batch_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS inventory_state (
            state_date TEXT PRIMARY KEY,
            thawing_kg_json TEXT NOT NULL,
            sellable_lot1_kg REAL NOT NULL,
            sellable_lot2_kg REAL NOT NULL,
            observed_sales_kg REAL,
            realized_loss_kg REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS daily_report (
            report_date TEXT PRIMARY KEY,
            sku_code TEXT NOT NULL,
            recommended_pull_kg REAL NOT NULL,
            recommended_pull_boxes INTEGER NOT NULL,
            thawing_kg REAL NOT NULL,
            available_kg REAL NOT NULL,
            lot_age TEXT NOT NULL,
            projected_loss_kg REAL NOT NULL,
            projected_loss_boxes INTEGER NOT NULL,
            notices_json TEXT NOT NULL DEFAULT '[]',
            run_id TEXT NOT NULL,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS forecast_projection (
            projection_date TEXT PRIMARY KEY,
            pull_kg REAL NOT NULL,
            thawing_kg REAL NOT NULL,
            available_kg REAL NOT NULL,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    // 预置全局配置作用域(config_kv 外键依赖)
    conn.execute(
        "INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key) \
         VALUES ('global', 'GLOBAL', 'global')",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
