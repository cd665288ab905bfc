// ==========================================
// 成衣批次追踪系统 - 生产批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: batch / batch_bundle
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::inventory::{Batch, BatchBundle};
use crate::repository::bundle_repo::map_bundle_at;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const BATCH_COLUMNS: &str = "id, mpo, size, color, planning_id, updated_at, updated_by";

// ==========================================
// BatchRepository - 批次仓储
// ==========================================
pub struct BatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Batch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 查询全部批次（新建在前）
    pub fn list_all(&self) -> RepositoryResult<Vec<Batch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch ORDER BY updated_at DESC, id DESC",
            BATCH_COLUMNS
        ))?;
        let batches = stmt
            .query_map([], map_batch_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    /// 查询批次成员（含扎包明细）
    pub fn list_members(&self, batch_id: i64) -> RepositoryResult<Vec<BatchBundle>> {
        let conn = self.get_conn()?;
        Self::list_members_tx(&conn, batch_id)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Batch>> {
        let batch = conn
            .query_row(
                &format!("SELECT {} FROM batch WHERE id = ?1", BATCH_COLUMNS),
                params![id],
                map_batch_row,
            )
            .optional()?;
        Ok(batch)
    }

    pub fn list_members_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Vec<BatchBundle>> {
        let mut stmt = conn.prepare(
            r#"SELECT bb.id, bb.batch_id, bb.received_id, bb.added_at,
                      r.id, r.mpo, r.buyer, r.style, r.marker, r.bundle_no, r.bundle_barcode,
                      r.size, r.shade, r.color, r.quantity, r.received_at, r.received_by, r.status
               FROM batch_bundle bb
               JOIN received_bundle r ON r.id = bb.received_id
               WHERE bb.batch_id = ?1
               ORDER BY bb.id ASC"#,
        )?;
        let members = stmt
            .query_map(params![batch_id], |row| {
                let added_at: String = row.get(3)?;
                Ok(BatchBundle {
                    id: row.get(0)?,
                    batch_id: row.get(1)?,
                    received_id: row.get(2)?,
                    added_at: parse_ts(3, &added_at)?,
                    received: map_bundle_at(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// 批次数量合计（成员扎包 quantity 之和）
    pub fn total_quantity_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<i64> {
        let total: i64 = conn.query_row(
            r#"SELECT COALESCE(SUM(r.quantity), 0)
               FROM batch_bundle bb
               JOIN received_bundle r ON r.id = bb.received_id
               WHERE bb.batch_id = ?1"#,
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn insert_tx(
        tx: &Transaction,
        mpo: &str,
        size: &str,
        color: &str,
        planning_id: i64,
        updated_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        tx.execute(
            r#"INSERT INTO batch (mpo, size, color, planning_id, updated_at, updated_by)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![mpo, size, color, planning_id, format_ts(now), updated_by],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn insert_members_tx(
        tx: &Transaction,
        batch_id: i64,
        received_ids: &[i64],
        now: &NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            "INSERT INTO batch_bundle (batch_id, received_id, added_at) VALUES (?1, ?2, ?3)",
        )?;
        let added_at = format_ts(now);
        let mut count = 0;
        for received_id in received_ids {
            stmt.execute(params![batch_id, received_id, added_at])?;
            count += 1;
        }
        Ok(count)
    }

    /// 删除批次（成员行级联删除）；返回删除行数
    pub fn delete_tx(tx: &Transaction, id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute("DELETE FROM batch WHERE id = ?1", params![id])?;
        Ok(affected)
    }
}

fn map_batch_row(row: &Row) -> rusqlite::Result<Batch> {
    let updated_at: String = row.get(5)?;
    Ok(Batch {
        id: row.get(0)?,
        mpo: row.get(1)?,
        size: row.get(2)?,
        color: row.get(3)?,
        planning_id: row.get(4)?,
        updated_at: parse_ts(5, &updated_at)?,
        updated_by: row.get(6)?,
    })
}
