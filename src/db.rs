// ==========================================
// 配方版本与成本核算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等的 schema 初始化（配方文档按 recipe / recipe_version / recipe_component 三表归一化存储）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
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

/// 默认数据库路径（本地数据目录下）
///
/// 可通过环境变量 RECIPE_DB_PATH 覆盖。
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("RECIPE_DB_PATH") {
        return path;
    }

    let mut dir: PathBuf = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("recipe-backend");
    let _ = std::fs::create_dir_all(&dir);
    dir.push("recipe.db");
    dir.to_string_lossy().to_string()
}

/// 初始化数据库 schema（幂等）
///
/// 表结构:
/// - product / process: 目录数据（核心只读）
/// - recipe: 每个成品一条，current_version 指向唯一的“当前版本”
/// - recipe_version: 配方版本（以 (recipe_id, version) 为主键）
/// - recipe_component: 版本组件（以 (recipe_id, version, product_id) 为主键，
///   主键同时在存储层保证“同一材料不重复出现”的合并不变量）
/// - staging_recipe_row: CSV 导入暂存行（列名与导入模板一一对应）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS product (
            product_id TEXT PRIMARY KEY,
            sku TEXT NOT NULL UNIQUE,
            name TEXT,
            kind TEXT NOT NULL,
            unit TEXT,
            net_price REAL,
            gross_price REAL,
            last_cost REAL
        );

        CREATE TABLE IF NOT EXISTS process (
            process_id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT,
            cost REAL
        );

        CREATE TABLE IF NOT EXISTS recipe (
            recipe_id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL UNIQUE REFERENCES product(product_id),
            current_version INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_version (
            recipe_id TEXT NOT NULL REFERENCES recipe(recipe_id) ON DELETE CASCADE,
            version INTEGER NOT NULL,
            state TEXT NOT NULL,
            publish_date TEXT NOT NULL,
            publisher TEXT,
            base_qty REAL NOT NULL,
            unit_pt TEXT,
            process_id TEXT,
            special_process_name TEXT,
            special_process_cost REAL,
            cost REAL,
            PRIMARY KEY (recipe_id, version)
        );

        CREATE TABLE IF NOT EXISTS recipe_component (
            recipe_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            product_id TEXT NOT NULL REFERENCES product(product_id),
            qty_per_base REAL NOT NULL,
            unit TEXT,
            waste_pct REAL NOT NULL DEFAULT 0,
            seq_no INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, version, product_id),
            FOREIGN KEY (recipe_id, version)
                REFERENCES recipe_version(recipe_id, version) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS staging_recipe_row (
            row_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            product_sku TEXT,
            version TEXT,
            state TEXT,
            mark_current TEXT,
            base_qty TEXT,
            unit_pt TEXT,
            component_sku TEXT,
            qty_per_base TEXT,
            unit_mp TEXT,
            waste_pct TEXT,
            process_code TEXT,
            special_process_name TEXT,
            special_process_cost TEXT,
            publish_date TEXT,
            publisher TEXT,
            notes TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_staging_batch
            ON staging_recipe_row(batch_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
