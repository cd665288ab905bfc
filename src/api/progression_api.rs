// ==========================================
// 成衣批次追踪系统 - 工序推进 API
// ==========================================
// 职责: 读取工序指针 -> 状态机判定 -> 同一事务内更新指针与历史
// 并发: BEGIN IMMEDIATE 串行化写请求；写 SQL 另带前置状态守卫
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction};
use tracing::{error, info, instrument};

use crate::api::error::{tx_error, ApiError, ApiResult, STATUS_CREATED, STATUS_OK};
use crate::api::lock_conn;
use crate::db::{begin_write, now};
use crate::domain::planning::Planning;
use crate::domain::progression::{BatchStage, StageHistory, StageUpdateOutcome};
use crate::domain::types::{Actor, StageStatus};
use crate::engine::error::EngineResult;
use crate::engine::progression::{
    ProgressionState, StageProgressionEngine, StageRequest, StageTransition,
};
use crate::repository::batch_repo::BatchRepository;
use crate::repository::planning_repo::PlanningRepository;
use crate::repository::stage_repo::BatchStageRepository;

/// createOrUpdate 对应的 HTTP 状态（新建 201 / 更新 200）
pub fn outcome_status(outcome: &StageUpdateOutcome) -> u16 {
    if outcome.created {
        STATUS_CREATED
    } else {
        STATUS_OK
    }
}

// ==========================================
// ProgressionApi - 工序推进 API
// ==========================================
pub struct ProgressionApi {
    conn: Arc<Mutex<Connection>>,
    stage_repo: Arc<BatchStageRepository>,
}

impl ProgressionApi {
    pub fn new(conn: Arc<Mutex<Connection>>, stage_repo: Arc<BatchStageRepository>) -> Self {
        Self { conn, stage_repo }
    }

    /// 工序推进入口（序号取自路线）
    ///
    /// - 指针不存在：工序必须在路线内，且只能以 in 打开第一道工序
    /// - 指针存在：交给状态机判定
    #[instrument(skip(self, actor), fields(actor = %actor))]
    pub fn create_or_update(
        &self,
        batch_id: i64,
        stage: &str,
        status: StageStatus,
        actor: &Actor,
    ) -> ApiResult<StageUpdateOutcome> {
        self.run_transition(batch_id, actor, |plan| {
            StageProgressionEngine::resolve_request(plan, stage, status)
        })
    }

    /// 按调用方给出的 (工序, 序号, 状态) 推进
    #[instrument(skip(self, actor), fields(actor = %actor))]
    pub fn apply_transition(
        &self,
        batch_id: i64,
        stage: &str,
        sequence: i32,
        status: StageStatus,
        actor: &Actor,
    ) -> ApiResult<BatchStage> {
        let outcome = self.run_transition(batch_id, actor, |plan| {
            StageProgressionEngine::explicit_request(plan, stage, sequence, status)
        })?;
        Ok(outcome.stage)
    }

    pub fn get_batch_stage(&self, batch_id: i64) -> ApiResult<BatchStage> {
        self.stage_repo
            .find_by_batch(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("批次 {} 尚未开工", batch_id)))
    }

    pub fn list_batch_stages(&self) -> ApiResult<Vec<BatchStage>> {
        Ok(self.stage_repo.list_all()?)
    }

    /// 工序历史（按进入时间、序号升序）
    pub fn list_stage_history(&self, batch_id: Option<i64>) -> ApiResult<Vec<StageHistory>> {
        Ok(self.stage_repo.list_history(batch_id)?)
    }

    // ==========================================
    // 内部流程
    // ==========================================

    fn run_transition<F>(
        &self,
        batch_id: i64,
        actor: &Actor,
        build_request: F,
    ) -> ApiResult<StageUpdateOutcome>
    where
        F: FnOnce(&Planning) -> EngineResult<StageRequest>,
    {
        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let batch = BatchRepository::find_by_id_tx(&tx, batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("批次(id={})不存在", batch_id)))?;
        let plan = PlanningRepository::find_by_id_tx(&tx, batch.planning_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("工艺路线(id={})不存在", batch.planning_id))
        })?;

        let request = build_request(&plan)?;
        let pointer = BatchStageRepository::find_by_batch_tx(&tx, batch_id)?;
        let state = ProgressionState::from_pointer(pointer.as_ref());
        let transition = StageProgressionEngine::apply(&state, &request, &plan)?;

        Self::persist(&tx, batch_id, &transition, actor)?;

        let stage = BatchStageRepository::find_by_batch_tx(&tx, batch_id)?.ok_or_else(|| {
            ApiError::InternalError(format!("批次 {} 工序指针写入后读取失败", batch_id))
        })?;
        tx.commit().map_err(tx_error)?;

        info!(
            batch_id,
            stage = %stage.current_stage,
            sequence = stage.sequence,
            status = %stage.current_status,
            actor = %actor,
            "工序已更新"
        );
        Ok(StageUpdateOutcome {
            stage,
            created: pointer.is_none(),
        })
    }

    /// 执行状态转换（指针 + 历史）
    fn persist(
        tx: &Transaction,
        batch_id: i64,
        transition: &StageTransition,
        actor: &Actor,
    ) -> ApiResult<()> {
        let ts = now();
        match transition {
            StageTransition::Open { sequence, stage } => {
                BatchStageRepository::insert_tx(tx, batch_id, stage, *sequence)?;
                BatchStageRepository::insert_history_tx(
                    tx,
                    batch_id,
                    stage,
                    *sequence,
                    actor.as_str(),
                    &ts,
                )?;
            }
            StageTransition::Close { sequence, stage } => {
                let open_row = BatchStageRepository::find_history_tx(tx, batch_id, *sequence)?
                    .filter(|h| h.is_open());
                if open_row.is_none() {
                    error!(
                        batch_id,
                        sequence = *sequence,
                        stage = %stage,
                        "数据一致性: 工序处于 in 但没有未关闭的进入记录"
                    );
                    return Err(ApiError::ValidationError(format!(
                        "没有工序 {} 的进入记录，无法关闭",
                        stage
                    )));
                }

                if BatchStageRepository::close_tx(tx, batch_id, *sequence)? == 0 {
                    return Err(ApiError::ValidationError(format!(
                        "工序 {} 已经是 closed",
                        stage
                    )));
                }
                if BatchStageRepository::close_history_tx(
                    tx,
                    batch_id,
                    *sequence,
                    actor.as_str(),
                    &ts,
                )? == 0
                {
                    error!(batch_id, sequence = *sequence, "数据一致性: 进入记录关闭失败");
                    return Err(ApiError::ValidationError(format!(
                        "工序 {} 的进入记录已关闭",
                        stage
                    )));
                }
            }
            StageTransition::Advance {
                from_sequence,
                sequence,
                stage,
            } => {
                if BatchStageRepository::advance_tx(tx, batch_id, *from_sequence, *sequence, stage)?
                    == 0
                {
                    return Err(ApiError::ValidationError(format!(
                        "批次 {} 的工序状态已变化，请刷新后重试",
                        batch_id
                    )));
                }
                BatchStageRepository::insert_history_tx(
                    tx,
                    batch_id,
                    stage,
                    *sequence,
                    actor.as_str(),
                    &ts,
                )?;
            }
        }
        Ok(())
    }
}
