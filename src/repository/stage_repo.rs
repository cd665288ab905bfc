// ==========================================
// 成衣批次追踪系统 - 工序推进数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: batch_stage / batch_stage_history
// ==========================================
// 写操作均带前置状态守卫（WHERE current_status = ...），
// 返回受影响行数，由调用方判断是否命中
// ==========================================

use crate::db::{format_ts, parse_opt_ts, parse_ts};
use crate::domain::progression::{BatchStage, StageHistory};
use crate::domain::types::StageStatus;
use crate::repository::error::{invalid_enum_column, RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const HISTORY_COLUMNS: &str =
    "id, batch_id, stage, sequence, entered_at, closed_at, entered_by, closed_by";

// ==========================================
// BatchStageRepository - 工序指针与历史仓储
// ==========================================
pub struct BatchStageRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchStageRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_batch(&self, batch_id: i64) -> RepositoryResult<Option<BatchStage>> {
        let conn = self.get_conn()?;
        Self::find_by_batch_tx(&conn, batch_id)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<BatchStage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT batch_id, current_stage, sequence, current_status
             FROM batch_stage ORDER BY batch_id ASC",
        )?;
        let stages = stmt
            .query_map([], map_stage_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stages)
    }

    /// 查询工序历史
    ///
    /// # 参数
    /// - `batch_id`: 批次过滤，None 表示全部
    ///
    /// # 返回
    /// - 按 entered_at、sequence 升序
    pub fn list_history(&self, batch_id: Option<i64>) -> RepositoryResult<Vec<StageHistory>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch_stage_history
             WHERE (?1 IS NULL OR batch_id = ?1)
             ORDER BY entered_at ASC, sequence ASC, id ASC",
            HISTORY_COLUMNS
        ))?;
        let history = stmt
            .query_map(params![batch_id], map_history_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }

    pub fn find_by_batch_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Option<BatchStage>> {
        let stage = conn
            .query_row(
                "SELECT batch_id, current_stage, sequence, current_status
                 FROM batch_stage WHERE batch_id = ?1",
                params![batch_id],
                map_stage_row,
            )
            .optional()?;
        Ok(stage)
    }

    pub fn find_history_tx(
        conn: &Connection,
        batch_id: i64,
        sequence: i32,
    ) -> RepositoryResult<Option<StageHistory>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM batch_stage_history WHERE batch_id = ?1 AND sequence = ?2",
                    HISTORY_COLUMNS
                ),
                params![batch_id, sequence],
                map_history_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 新建工序指针（首次开工）
    pub fn insert_tx(
        tx: &Transaction,
        batch_id: i64,
        stage: &str,
        sequence: i32,
    ) -> RepositoryResult<()> {
        tx.execute(
            "INSERT INTO batch_stage (batch_id, current_stage, sequence, current_status)
             VALUES (?1, ?2, ?3, ?4)",
            params![batch_id, stage, sequence, StageStatus::In.to_db_str()],
        )?;
        Ok(())
    }

    /// in -> closed（同一序号）
    pub fn close_tx(tx: &Transaction, batch_id: i64, sequence: i32) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE batch_stage SET current_status = ?1
             WHERE batch_id = ?2 AND sequence = ?3 AND current_status = ?4",
            params![
                StageStatus::Closed.to_db_str(),
                batch_id,
                sequence,
                StageStatus::In.to_db_str()
            ],
        )?;
        Ok(affected)
    }

    /// closed(seq) -> in(next_seq)
    pub fn advance_tx(
        tx: &Transaction,
        batch_id: i64,
        from_sequence: i32,
        next_sequence: i32,
        next_stage: &str,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE batch_stage SET current_stage = ?1, sequence = ?2, current_status = ?3
             WHERE batch_id = ?4 AND sequence = ?5 AND current_status = ?6",
            params![
                next_stage,
                next_sequence,
                StageStatus::In.to_db_str(),
                batch_id,
                from_sequence,
                StageStatus::Closed.to_db_str()
            ],
        )?;
        Ok(affected)
    }

    pub fn insert_history_tx(
        tx: &Transaction,
        batch_id: i64,
        stage: &str,
        sequence: i32,
        entered_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        tx.execute(
            "INSERT INTO batch_stage_history (batch_id, stage, sequence, entered_at, entered_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![batch_id, stage, sequence, format_ts(now), entered_by],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 关闭仍处于打开状态的历史行；返回更新行数
    pub fn close_history_tx(
        tx: &Transaction,
        batch_id: i64,
        sequence: i32,
        closed_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE batch_stage_history SET closed_at = ?1, closed_by = ?2
             WHERE batch_id = ?3 AND sequence = ?4 AND closed_at IS NULL",
            params![format_ts(now), closed_by, batch_id, sequence],
        )?;
        Ok(affected)
    }
}

fn map_stage_row(row: &Row) -> rusqlite::Result<BatchStage> {
    let status_raw: String = row.get(3)?;
    let current_status = StageStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_enum_column(3, "current_status", &status_raw))?;
    Ok(BatchStage {
        batch_id: row.get(0)?,
        current_stage: row.get(1)?,
        sequence: row.get(2)?,
        current_status,
    })
}

fn map_history_row(row: &Row) -> rusqlite::Result<StageHistory> {
    let entered_at: String = row.get(4)?;
    let closed_at: Option<String> = row.get(5)?;
    Ok(StageHistory {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        stage: row.get(2)?,
        sequence: row.get(3)?,
        entered_at: parse_ts(4, &entered_at)?,
        closed_at: parse_opt_ts(5, closed_at)?,
        entered_by: row.get(6)?,
        closed_by: row.get(7)?,
    })
}
