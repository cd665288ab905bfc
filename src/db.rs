// ==========================================
// 成衣批次追踪系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表脚本与 schema_version
// - 统一写事务入口：BEGIN IMMEDIATE，先拿写锁再读
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

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

/// 开启写事务（IMMEDIATE）
///
/// 并发的第二个写请求会在 busy_timeout 内等待，拿到锁后读到的是前一个事务已提交的状态。
pub fn begin_write(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// 建表（幂等）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
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

// ==========================================
// 时间戳编解码
// ==========================================

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

/// 解析时间戳列（用于 row mapper）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_PARSE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 解析可空时间戳列
pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// 当前时间（UTC，截断到微秒，与存储精度一致）
pub fn now() -> NaiveDateTime {
    use chrono::SubsecRound;
    chrono::Utc::now().naive_utc().trunc_subsecs(6)
}

// ==========================================
// 建表脚本
// ==========================================
const SCHEMA_SQL: &str = r#"
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

CREATE TABLE IF NOT EXISTS stage_name (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stage TEXT NOT NULL UNIQUE,
    last_update TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS planning (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mpo TEXT NOT NULL UNIQUE,
    updated_by TEXT NOT NULL,
    last_update TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS planning_route_step (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    planning_id INTEGER NOT NULL REFERENCES planning(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL CHECK (sequence >= 1),
    stage TEXT NOT NULL,
    UNIQUE (planning_id, sequence),
    UNIQUE (planning_id, stage)
);

CREATE TABLE IF NOT EXISTS received_bundle (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mpo TEXT NOT NULL,
    buyer TEXT NOT NULL,
    style TEXT NOT NULL,
    marker TEXT NOT NULL,
    bundle_no INTEGER NOT NULL CHECK (bundle_no >= 0),
    bundle_barcode TEXT NOT NULL UNIQUE,
    size TEXT NOT NULL,
    shade TEXT NOT NULL,
    color TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    received_at TEXT NOT NULL,
    received_by TEXT,
    status TEXT NOT NULL DEFAULT 'received' CHECK (status IN ('received', 'allocated')),
    UNIQUE (mpo, marker, bundle_no)
);

CREATE TABLE IF NOT EXISTS batch (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mpo TEXT NOT NULL,
    size TEXT NOT NULL,
    color TEXT NOT NULL,
    planning_id INTEGER NOT NULL REFERENCES planning(id) ON DELETE CASCADE,
    updated_at TEXT NOT NULL,
    updated_by TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS batch_bundle (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batch(id) ON DELETE CASCADE,
    received_id INTEGER NOT NULL UNIQUE REFERENCES received_bundle(id) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    UNIQUE (batch_id, received_id)
);

CREATE TABLE IF NOT EXISTS batch_stage (
    batch_id INTEGER PRIMARY KEY REFERENCES batch(id) ON DELETE CASCADE,
    current_stage TEXT NOT NULL,
    sequence INTEGER NOT NULL CHECK (sequence >= 1),
    current_status TEXT NOT NULL CHECK (current_status IN ('in', 'closed'))
);

CREATE TABLE IF NOT EXISTS batch_stage_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batch(id) ON DELETE CASCADE,
    stage TEXT NOT NULL,
    sequence INTEGER NOT NULL CHECK (sequence >= 1),
    entered_at TEXT NOT NULL,
    closed_at TEXT,
    entered_by TEXT NOT NULL,
    closed_by TEXT,
    UNIQUE (batch_id, sequence),
    UNIQUE (batch_id, stage)
);

CREATE TABLE IF NOT EXISTS rejection (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    individual_barcode TEXT NOT NULL UNIQUE,
    batch_id INTEGER NOT NULL REFERENCES batch(id) ON DELETE CASCADE,
    stage TEXT NOT NULL,
    reason TEXT NOT NULL CHECK (reason IN (
        'stitching_defect', 'fabric_defect', 'measurement_issue', 'color_mismatch',
        'physical_damage', 'finishing_issue', 'missing_part', 'other'
    )),
    rejected_at TEXT NOT NULL,
    rejected_by TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS batch_qc_stage_summary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batch(id) ON DELETE CASCADE,
    stage TEXT NOT NULL,
    rejection_count INTEGER NOT NULL CHECK (rejection_count >= 1),
    last_update TEXT NOT NULL,
    UNIQUE (batch_id, stage)
);

CREATE TABLE IF NOT EXISTS first_wash_batch (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    shade TEXT NOT NULL,
    source_kind TEXT NOT NULL CHECK (source_kind IN ('batch', 'bundle')),
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    total_quantity INTEGER NOT NULL DEFAULT 0,
    status TEXT
);

CREATE TABLE IF NOT EXISTS first_wash_batch_source (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wash_batch_id INTEGER NOT NULL REFERENCES first_wash_batch(id) ON DELETE CASCADE,
    batch_id INTEGER NOT NULL UNIQUE REFERENCES batch(id),
    quantity INTEGER NOT NULL CHECK (quantity >= 1)
);

CREATE TABLE IF NOT EXISTS first_wash_bundle_source (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wash_batch_id INTEGER NOT NULL REFERENCES first_wash_batch(id) ON DELETE CASCADE,
    bundle_id INTEGER NOT NULL UNIQUE REFERENCES received_bundle(id),
    quantity INTEGER NOT NULL CHECK (quantity >= 1)
);

CREATE INDEX IF NOT EXISTS idx_batch_mpo ON batch(mpo);
CREATE INDEX IF NOT EXISTS idx_history_batch ON batch_stage_history(batch_id, entered_at);
CREATE INDEX IF NOT EXISTS idx_rejection_batch_stage ON rejection(batch_id, stage);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_timestamp_roundtrip_accepts_plain_seconds() {
        let ts = now();
        let parsed = parse_ts(0, &format_ts(&ts)).unwrap();
        assert_eq!(parsed, ts);

        let legacy = parse_ts(0, "2026-01-18 08:30:00").unwrap();
        assert_eq!(legacy.format("%H:%M").to_string(), "08:30");
    }
}
