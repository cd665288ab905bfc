// ==========================================
// 成衣批次追踪系统 - 质检次品数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: rejection / batch_qc_stage_summary
// ==========================================
// 计数维护只使用单条 SQL 的 rejection_count = rejection_count ± 1，
// 不在应用层做读改写
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::rejection::{QcStageSummary, Rejection};
use crate::domain::types::DefectReason;
use crate::repository::error::{invalid_enum_column, RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const REJECTION_COLUMNS: &str =
    "id, individual_barcode, batch_id, stage, reason, rejected_at, rejected_by";
const SUMMARY_COLUMNS: &str = "id, batch_id, stage, rejection_count, last_update";

// ==========================================
// RejectionRepository - 次品记录 + 计数汇总
// ==========================================
pub struct RejectionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RejectionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Rejection>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 查询次品记录（可按批次过滤，新记录在前）
    pub fn list(&self, batch_id: Option<i64>) -> RepositoryResult<Vec<Rejection>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rejection
             WHERE (?1 IS NULL OR batch_id = ?1)
             ORDER BY rejected_at DESC, id DESC",
            REJECTION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![batch_id], map_rejection_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 查询计数汇总（批次、工序均可选）
    pub fn list_summaries(
        &self,
        batch_id: Option<i64>,
        stage: Option<&str>,
    ) -> RepositoryResult<Vec<QcStageSummary>> {
        let conn = self.get_conn()?;
        Self::list_summaries_tx(&conn, batch_id, stage)
    }

    pub fn list_summaries_tx(
        conn: &Connection,
        batch_id: Option<i64>,
        stage: Option<&str>,
    ) -> RepositoryResult<Vec<QcStageSummary>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch_qc_stage_summary
             WHERE (?1 IS NULL OR batch_id = ?1)
               AND (?2 IS NULL OR stage = ?2)
             ORDER BY batch_id ASC, stage ASC",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![batch_id, stage], map_summary_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Rejection>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM rejection WHERE id = ?1", REJECTION_COLUMNS),
                params![id],
                map_rejection_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_by_barcode_tx(
        conn: &Connection,
        individual_barcode: &str,
    ) -> RepositoryResult<Option<Rejection>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM rejection WHERE individual_barcode = ?1",
                    REJECTION_COLUMNS
                ),
                params![individual_barcode],
                map_rejection_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_summary_tx(
        conn: &Connection,
        batch_id: i64,
        stage: &str,
    ) -> RepositoryResult<Option<QcStageSummary>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM batch_qc_stage_summary WHERE batch_id = ?1 AND stage = ?2",
                    SUMMARY_COLUMNS
                ),
                params![batch_id, stage],
                map_summary_row,
            )
            .optional()?;
        Ok(row)
    }

    /// (batch, stage) 下的实际次品行数
    pub fn count_for_stage_tx(conn: &Connection, batch_id: i64, stage: &str) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM rejection WHERE batch_id = ?1 AND stage = ?2",
            params![batch_id, stage],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn insert_tx(
        tx: &Transaction,
        individual_barcode: &str,
        batch_id: i64,
        stage: &str,
        reason: DefectReason,
        rejected_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        tx.execute(
            r#"INSERT INTO rejection (
                individual_barcode, batch_id, stage, reason, rejected_at, rejected_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                individual_barcode,
                batch_id,
                stage,
                reason.to_db_str(),
                format_ts(now),
                rejected_by
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 改写原因、操作人、时间；不影响计数
    pub fn update_reason_tx(
        tx: &Transaction,
        id: i64,
        reason: DefectReason,
        rejected_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE rejection SET reason = ?1, rejected_by = ?2, rejected_at = ?3 WHERE id = ?4",
            params![reason.to_db_str(), rejected_by, format_ts(now), id],
        )?;
        Ok(affected)
    }

    pub fn delete_tx(tx: &Transaction, id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute("DELETE FROM rejection WHERE id = ?1", params![id])?;
        Ok(affected)
    }

    /// 计数 +1（无行则以 1 新建）
    pub fn increment_summary_tx(
        tx: &Transaction,
        batch_id: i64,
        stage: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO batch_qc_stage_summary (batch_id, stage, rejection_count, last_update)
               VALUES (?1, ?2, 1, ?3)
               ON CONFLICT(batch_id, stage) DO UPDATE SET
                   rejection_count = rejection_count + 1,
                   last_update = excluded.last_update"#,
            params![batch_id, stage, format_ts(now)],
        )?;
        Ok(())
    }

    /// 计数 -1（降到 0 时删除汇总行）
    ///
    /// # 返回
    /// - 受影响行数；0 表示汇总行不存在
    pub fn decrement_summary_tx(
        tx: &Transaction,
        batch_id: i64,
        stage: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let deleted = tx.execute(
            "DELETE FROM batch_qc_stage_summary
             WHERE batch_id = ?1 AND stage = ?2 AND rejection_count <= 1",
            params![batch_id, stage],
        )?;
        if deleted > 0 {
            return Ok(deleted);
        }

        let updated = tx.execute(
            "UPDATE batch_qc_stage_summary
             SET rejection_count = rejection_count - 1, last_update = ?3
             WHERE batch_id = ?1 AND stage = ?2 AND rejection_count > 1",
            params![batch_id, stage, format_ts(now)],
        )?;
        Ok(updated)
    }

    /// 按次品行重建某批次的全部汇总；返回重建后的汇总行数
    pub fn rebuild_summaries_tx(
        tx: &Transaction,
        batch_id: i64,
        now: &NaiveDateTime,
    ) -> RepositoryResult<usize> {
        tx.execute(
            "DELETE FROM batch_qc_stage_summary WHERE batch_id = ?1",
            params![batch_id],
        )?;
        let inserted = tx.execute(
            r#"INSERT INTO batch_qc_stage_summary (batch_id, stage, rejection_count, last_update)
               SELECT batch_id, stage, COUNT(*), ?2
               FROM rejection
               WHERE batch_id = ?1
               GROUP BY batch_id, stage"#,
            params![batch_id, format_ts(now)],
        )?;
        Ok(inserted)
    }
}

fn map_rejection_row(row: &Row) -> rusqlite::Result<Rejection> {
    let reason_raw: String = row.get(4)?;
    let reason = DefectReason::from_str(&reason_raw)
        .ok_or_else(|| invalid_enum_column(4, "reason", &reason_raw))?;
    let rejected_at: String = row.get(5)?;
    Ok(Rejection {
        id: row.get(0)?,
        individual_barcode: row.get(1)?,
        batch_id: row.get(2)?,
        stage: row.get(3)?,
        reason,
        rejected_at: parse_ts(5, &rejected_at)?,
        rejected_by: row.get(6)?,
    })
}

fn map_summary_row(row: &Row) -> rusqlite::Result<QcStageSummary> {
    let last_update: String = row.get(4)?;
    Ok(QcStageSummary {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        stage: row.get(2)?,
        rejection_count: row.get(3)?,
        last_update: parse_ts(4, &last_update)?,
    })
}
