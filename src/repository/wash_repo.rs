// ==========================================
// 成衣批次追踪系统 - 洗水投料数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: first_wash_batch / first_wash_batch_source / first_wash_bundle_source
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::types::WashSourceKind;
use crate::domain::wash::{WashBatch, WashBatchDetail, WashSource};
use crate::repository::error::{invalid_enum_column, RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const WASH_COLUMNS: &str =
    "id, shade, source_kind, created_at, created_by, total_quantity, status";

/// 来源表与来源列
fn source_table(kind: WashSourceKind) -> (&'static str, &'static str) {
    match kind {
        WashSourceKind::Batch => ("first_wash_batch_source", "batch_id"),
        WashSourceKind::Bundle => ("first_wash_bundle_source", "bundle_id"),
    }
}

// ==========================================
// WashRepository - 一洗投料仓储
// ==========================================
pub struct WashRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WashRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<WashBatchDetail>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 查询全部洗水批次（新建在前）
    pub fn list_all(&self) -> RepositoryResult<Vec<WashBatchDetail>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM first_wash_batch ORDER BY created_at DESC, id DESC",
            WASH_COLUMNS
        ))?;
        let headers = stmt
            .query_map([], map_wash_row)?
            .collect::<Result<Vec<_>, _>>()?;

        headers
            .into_iter()
            .map(|wash_batch| -> RepositoryResult<WashBatchDetail> {
                let sources = Self::load_sources(&conn, wash_batch.id, wash_batch.source_kind)?;
                Ok(WashBatchDetail { wash_batch, sources })
            })
            .collect()
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<WashBatchDetail>> {
        let header = conn
            .query_row(
                &format!("SELECT {} FROM first_wash_batch WHERE id = ?1", WASH_COLUMNS),
                params![id],
                map_wash_row,
            )
            .optional()?;

        match header {
            Some(wash_batch) => {
                let sources = Self::load_sources(conn, wash_batch.id, wash_batch.source_kind)?;
                Ok(Some(WashBatchDetail { wash_batch, sources }))
            }
            None => Ok(None),
        }
    }

    /// 批次是否已作为洗水来源
    pub fn batch_is_sourced_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<bool> {
        let sourced: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM first_wash_batch_source WHERE batch_id = ?1)",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(sourced)
    }

    pub fn insert_header_tx(
        tx: &Transaction,
        shade: &str,
        source_kind: WashSourceKind,
        created_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        tx.execute(
            "INSERT INTO first_wash_batch (shade, source_kind, created_at, created_by, total_quantity)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![shade, source_kind.to_db_str(), format_ts(now), created_by],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn insert_source_tx(
        tx: &Transaction,
        source_kind: WashSourceKind,
        wash_batch_id: i64,
        source_id: i64,
        quantity: i64,
    ) -> RepositoryResult<i64> {
        let (table, column) = source_table(source_kind);
        tx.execute(
            &format!(
                "INSERT INTO {} (wash_batch_id, {}, quantity) VALUES (?1, ?2, ?3)",
                table, column
            ),
            params![wash_batch_id, source_id, quantity],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn set_total_quantity_tx(
        tx: &Transaction,
        id: i64,
        total_quantity: i64,
    ) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE first_wash_batch SET total_quantity = ?1 WHERE id = ?2",
            params![total_quantity, id],
        )?;
        Ok(())
    }

    fn load_sources(
        conn: &Connection,
        wash_batch_id: i64,
        source_kind: WashSourceKind,
    ) -> RepositoryResult<Vec<WashSource>> {
        let (table, column) = source_table(source_kind);
        let mut stmt = conn.prepare(&format!(
            "SELECT id, wash_batch_id, {}, quantity FROM {} WHERE wash_batch_id = ?1 ORDER BY id ASC",
            column, table
        ))?;
        let sources = stmt
            .query_map(params![wash_batch_id], |row| {
                Ok(WashSource {
                    id: row.get(0)?,
                    wash_batch_id: row.get(1)?,
                    source_id: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }
}

fn map_wash_row(row: &Row) -> rusqlite::Result<WashBatch> {
    let kind_raw: String = row.get(2)?;
    let source_kind = WashSourceKind::from_str(&kind_raw)
        .ok_or_else(|| invalid_enum_column(2, "source_kind", &kind_raw))?;
    let created_at: String = row.get(3)?;
    Ok(WashBatch {
        id: row.get(0)?,
        shade: row.get(1)?,
        source_kind,
        created_at: parse_ts(3, &created_at)?,
        created_by: row.get(4)?,
        total_quantity: row.get(5)?,
        status: row.get(6)?,
    })
}
