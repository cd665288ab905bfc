// ==========================================
// 成衣批次追踪系统 - 生产计划数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: planning / planning_route_step / stage_name
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::planning::{Planning, RouteStep, StageName};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// StageNameRepository - 工序名称字典
// ==========================================
pub struct StageNameRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StageNameRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询全部工序名（按名称升序）
    pub fn list_all(&self) -> RepositoryResult<Vec<StageName>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, stage, last_update FROM stage_name ORDER BY stage ASC")?;
        let names = stmt
            .query_map([], map_stage_name)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn find_by_stage_tx(conn: &Connection, stage: &str) -> RepositoryResult<Option<StageName>> {
        let name = conn
            .query_row(
                "SELECT id, stage, last_update FROM stage_name WHERE stage = ?1",
                params![stage],
                map_stage_name,
            )
            .optional()?;
        Ok(name)
    }

    pub fn insert_tx(tx: &Transaction, stage: &str, now: &NaiveDateTime) -> RepositoryResult<i64> {
        tx.execute(
            "INSERT INTO stage_name (stage, last_update) VALUES (?1, ?2)",
            params![stage, format_ts(now)],
        )?;
        Ok(tx.last_insert_rowid())
    }
}

fn map_stage_name(row: &Row) -> rusqlite::Result<StageName> {
    let last_update: String = row.get(2)?;
    Ok(StageName {
        id: row.get(0)?,
        stage: row.get(1)?,
        last_update: parse_ts(2, &last_update)?,
    })
}

// ==========================================
// PlanningRepository - 工艺路线仓储
// ==========================================
pub struct PlanningRepository {
    conn: Arc<Mutex<Connection>>,
}

const PLANNING_COLUMNS: &str = "id, mpo, updated_by, last_update";

impl PlanningRepository {
    /// 创建新的PlanningRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按id查询计划（含工艺路线）
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Planning>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 按生产订单号查询计划（含工艺路线）
    pub fn find_by_mpo(&self, mpo: &str) -> RepositoryResult<Option<Planning>> {
        let conn = self.get_conn()?;
        Self::find_by_mpo_tx(&conn, mpo)
    }

    /// 查询计划列表
    ///
    /// # 参数
    /// - `search`: 按 mpo 模糊匹配（不区分大小写），None 表示全部
    ///
    /// # 返回
    /// - 按 last_update 降序
    pub fn list(&self, search: Option<&str>) -> RepositoryResult<Vec<Planning>> {
        let conn = self.get_conn()?;

        let headers = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM planning
                     WHERE lower(mpo) LIKE '%' || lower(?1) || '%'
                     ORDER BY last_update DESC, id DESC",
                    PLANNING_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![term], map_planning_header)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM planning ORDER BY last_update DESC, id DESC",
                    PLANNING_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], map_planning_header)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        headers
            .into_iter()
            .map(|mut plan| -> RepositoryResult<Planning> {
                plan.route_steps = Self::load_steps(&conn, plan.id)?;
                Ok(plan)
            })
            .collect()
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Planning>> {
        let header = conn
            .query_row(
                &format!("SELECT {} FROM planning WHERE id = ?1", PLANNING_COLUMNS),
                params![id],
                map_planning_header,
            )
            .optional()?;
        Self::attach_steps(conn, header)
    }

    pub fn find_by_mpo_tx(conn: &Connection, mpo: &str) -> RepositoryResult<Option<Planning>> {
        let header = conn
            .query_row(
                &format!("SELECT {} FROM planning WHERE mpo = ?1", PLANNING_COLUMNS),
                params![mpo],
                map_planning_header,
            )
            .optional()?;
        Self::attach_steps(conn, header)
    }

    /// 该生产订单下是否已有批次开工（存在 batch_stage 行）
    pub fn has_started_batches_tx(conn: &Connection, mpo: &str) -> RepositoryResult<bool> {
        let started: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM batch b
                JOIN batch_stage s ON s.batch_id = b.id
                WHERE b.mpo = ?1
             )",
            params![mpo],
            |row| row.get(0),
        )?;
        Ok(started)
    }

    pub fn insert_tx(
        tx: &Transaction,
        mpo: &str,
        updated_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        tx.execute(
            "INSERT INTO planning (mpo, updated_by, last_update) VALUES (?1, ?2, ?3)",
            params![mpo, updated_by, format_ts(now)],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 更新审计字段
    pub fn touch_tx(
        tx: &Transaction,
        id: i64,
        updated_by: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            "UPDATE planning SET updated_by = ?1, last_update = ?2 WHERE id = ?3",
            params![updated_by, format_ts(now), id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Planning", id));
        }
        Ok(())
    }

    /// 整体替换工艺路线（先删后建，sequence = 下标 + 1）
    pub fn replace_steps_tx(
        tx: &Transaction,
        planning_id: i64,
        stages: &[String],
    ) -> RepositoryResult<usize> {
        tx.execute(
            "DELETE FROM planning_route_step WHERE planning_id = ?1",
            params![planning_id],
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO planning_route_step (planning_id, sequence, stage) VALUES (?1, ?2, ?3)",
        )?;
        let mut count = 0;
        for (idx, stage) in stages.iter().enumerate() {
            stmt.execute(params![planning_id, (idx + 1) as i32, stage])?;
            count += 1;
        }
        Ok(count)
    }

    fn load_steps(conn: &Connection, planning_id: i64) -> RepositoryResult<Vec<RouteStep>> {
        let mut stmt = conn.prepare(
            "SELECT id, sequence, stage FROM planning_route_step
             WHERE planning_id = ?1
             ORDER BY sequence ASC",
        )?;
        let steps = stmt
            .query_map(params![planning_id], |row| {
                Ok(RouteStep {
                    id: row.get(0)?,
                    sequence: row.get(1)?,
                    stage: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    fn attach_steps(
        conn: &Connection,
        header: Option<Planning>,
    ) -> RepositoryResult<Option<Planning>> {
        match header {
            Some(mut plan) => {
                plan.route_steps = Self::load_steps(conn, plan.id)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }
}

/// 映射计划头（route_steps 由调用方补齐）
fn map_planning_header(row: &Row) -> rusqlite::Result<Planning> {
    let last_update: String = row.get(3)?;
    Ok(Planning {
        id: row.get(0)?,
        mpo: row.get(1)?,
        updated_by: row.get(2)?,
        last_update: parse_ts(3, &last_update)?,
        route_steps: Vec::new(),
    })
}
