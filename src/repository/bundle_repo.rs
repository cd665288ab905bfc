// ==========================================
// 成衣批次追踪系统 - 收货扎包数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: received_bundle
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::inventory::{NewBundle, ReceivedBundle};
use crate::domain::types::AllocationStatus;
use crate::repository::error::{invalid_enum_column, RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

pub(crate) const BUNDLE_COLUMNS: &str = "id, mpo, buyer, style, marker, bundle_no, bundle_barcode, \
     size, shade, color, quantity, received_at, received_by, status";

// ==========================================
// BundleRepository - 扎包仓储
// ==========================================
pub struct BundleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BundleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ReceivedBundle>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 查询全部扎包（按收货时间倒序）
    pub fn list_all(&self) -> RepositoryResult<Vec<ReceivedBundle>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM received_bundle ORDER BY received_at DESC, id DESC",
            BUNDLE_COLUMNS
        ))?;
        let bundles = stmt
            .query_map([], map_bundle_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bundles)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<ReceivedBundle>> {
        let bundle = conn
            .query_row(
                &format!("SELECT {} FROM received_bundle WHERE id = ?1", BUNDLE_COLUMNS),
                params![id],
                map_bundle_row,
            )
            .optional()?;
        Ok(bundle)
    }

    pub fn find_by_barcode_tx(
        conn: &Connection,
        bundle_barcode: &str,
    ) -> RepositoryResult<Option<ReceivedBundle>> {
        let bundle = conn
            .query_row(
                &format!(
                    "SELECT {} FROM received_bundle WHERE bundle_barcode = ?1",
                    BUNDLE_COLUMNS
                ),
                params![bundle_barcode],
                map_bundle_row,
            )
            .optional()?;
        Ok(bundle)
    }

    /// 按 (mpo, marker, bundle_no) 精确查询
    pub fn find_by_marker_tx(
        conn: &Connection,
        mpo: &str,
        marker: &str,
        bundle_no: i64,
    ) -> RepositoryResult<Option<ReceivedBundle>> {
        let bundle = conn
            .query_row(
                &format!(
                    "SELECT {} FROM received_bundle
                     WHERE mpo = ?1 AND marker = ?2 AND bundle_no = ?3",
                    BUNDLE_COLUMNS
                ),
                params![mpo, marker, bundle_no],
                map_bundle_row,
            )
            .optional()?;
        Ok(bundle)
    }

    /// 扎包所属批次（未组批返回 None）
    pub fn find_owning_batch_id_tx(conn: &Connection, bundle_id: i64) -> RepositoryResult<Option<i64>> {
        let batch_id = conn
            .query_row(
                "SELECT batch_id FROM batch_bundle WHERE received_id = ?1",
                params![bundle_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(batch_id)
    }

    pub fn insert_tx(
        tx: &Transaction,
        bundle: &NewBundle,
        received_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        tx.execute(
            r#"INSERT INTO received_bundle (
                mpo, buyer, style, marker, bundle_no, bundle_barcode,
                size, shade, color, quantity, received_at, received_by, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"#,
            params![
                bundle.mpo,
                bundle.buyer,
                bundle.style,
                bundle.marker,
                bundle.bundle_no,
                bundle.bundle_barcode,
                bundle.size,
                bundle.shade,
                bundle.color,
                bundle.quantity,
                format_ts(now),
                received_by,
                AllocationStatus::Received.to_db_str(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 翻转占用标记（带前置状态守卫）
    ///
    /// # 返回
    /// - 实际更新的行数；0 表示扎包不存在或当前状态不是 `from`
    pub fn transition_status_tx(
        tx: &Transaction,
        id: i64,
        from: AllocationStatus,
        to: AllocationStatus,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE received_bundle SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.to_db_str(), id, from.to_db_str()],
        )?;
        Ok(affected)
    }

    /// 删除未占用扎包；返回删除行数
    pub fn delete_free_tx(tx: &Transaction, id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM received_bundle WHERE id = ?1 AND status = ?2",
            params![id, AllocationStatus::Received.to_db_str()],
        )?;
        Ok(affected)
    }
}

/// received_bundle 行映射（列顺序见 BUNDLE_COLUMNS，可带偏移量用于 JOIN 查询）
pub(crate) fn map_bundle_at(row: &Row, offset: usize) -> rusqlite::Result<ReceivedBundle> {
    let received_at: String = row.get(offset + 11)?;
    let status_raw: String = row.get(offset + 13)?;
    let status = AllocationStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_enum_column(offset + 13, "status", &status_raw))?;

    Ok(ReceivedBundle {
        id: row.get(offset)?,
        mpo: row.get(offset + 1)?,
        buyer: row.get(offset + 2)?,
        style: row.get(offset + 3)?,
        marker: row.get(offset + 4)?,
        bundle_no: row.get(offset + 5)?,
        bundle_barcode: row.get(offset + 6)?,
        size: row.get(offset + 7)?,
        shade: row.get(offset + 8)?,
        color: row.get(offset + 9)?,
        quantity: row.get(offset + 10)?,
        received_at: parse_ts(offset + 11, &received_at)?,
        received_by: row.get(offset + 12)?,
        status,
    })
}

fn map_bundle_row(row: &Row) -> rusqlite::Result<ReceivedBundle> {
    map_bundle_at(row, 0)
}
