// ==========================================
// 藏书编目系统 - SQLite 连接初始化与迁移
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表通过显式迁移入口执行（进程启动时调用），不做惰性全局标志建表
// ==========================================

use rusqlite::{params, Connection};
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
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

/// 执行建表迁移（幂等，可重复调用）
///
/// 约束：
/// - assignment 通过两个部分唯一索引保证“每个条码至多一条在用占用、每本书至多一条在用占用”
/// - barcode_code.code 使用 NOCASE 排序规则，大小写不敏感全局唯一
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- 尺寸分段规则（管理端维护，本系统只读）
        CREATE TABLE IF NOT EXISTS size_band (
            band_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            min_width_mm INTEGER NOT NULL,
            max_width_mm INTEGER,
            height_threshold_mm INTEGER NOT NULL,
            equal_heights_mm TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 条码库存（预制标签，只改状态，永不删除）
        CREATE TABLE IF NOT EXISTS barcode_code (
            code_id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL COLLATE NOCASE UNIQUE,
            series TEXT NOT NULL,
            band_id TEXT REFERENCES size_band(band_id),
            status TEXT NOT NULL DEFAULT 'AVAILABLE',
            rank_in_series INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_barcode_series_status
            ON barcode_code(series, status);

        -- 占用台账（开/闭区间，审计轨迹，永不物理删除）
        CREATE TABLE IF NOT EXISTS assignment (
            assignment_id TEXT PRIMARY KEY,
            code TEXT NOT NULL REFERENCES barcode_code(code),
            book_id TEXT NOT NULL,
            assigned_at TEXT NOT NULL,
            freed_at TEXT,
            assigned_by TEXT,
            freed_by TEXT,
            series TEXT,
            fallback_used INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_assignment_book
            ON assignment(book_id, freed_at);

        -- 每个条码至多一条在用占用记录
        CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_open_code
            ON assignment(code) WHERE freed_at IS NULL;

        -- 每本书至多一条在用占用记录
        CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_open_book
            ON assignment(book_id) WHERE freed_at IS NULL;
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
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
