// ==========================================
// 成衣批次追踪系统 - 生产计划 API
// ==========================================
// 职责: 工艺路线的创建、整体替换、查询；工序名称字典
// 红线: 已有批次开工的订单不允许修改路线
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::api::error::{tx_error, ApiError, ApiResult};
use crate::api::lock_conn;
use crate::db::{begin_write, now};
use crate::domain::planning::{Planning, StageName};
use crate::domain::types::Actor;
use crate::engine::route_plan::RoutePlanRules;
use crate::repository::planning_repo::{PlanningRepository, StageNameRepository};

// ==========================================
// PlanningApi - 生产计划 API
// ==========================================
pub struct PlanningApi {
    conn: Arc<Mutex<Connection>>,
    planning_repo: Arc<PlanningRepository>,
    stage_name_repo: Arc<StageNameRepository>,
}

impl PlanningApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        planning_repo: Arc<PlanningRepository>,
        stage_name_repo: Arc<StageNameRepository>,
    ) -> Self {
        Self {
            conn,
            planning_repo,
            stage_name_repo,
        }
    }

    // ==========================================
    // 写接口
    // ==========================================

    /// 创建工艺路线
    ///
    /// # 参数
    /// - mpo: 生产订单号（唯一）
    /// - stages: 有序工序名列表，sequence = 下标 + 1
    /// - actor: 操作人
    ///
    /// # 返回
    /// - Err(ValidationError): 订单已有路线 / 工序列表为空或重复
    pub fn create_plan(&self, mpo: &str, stages: &[String], actor: &Actor) -> ApiResult<Planning> {
        let mpo = RoutePlanRules::normalize_key("mpo", mpo)?;
        let stages = RoutePlanRules::normalize_stages(stages)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        if PlanningRepository::find_by_mpo_tx(&tx, &mpo)?.is_some() {
            return Err(ApiError::ValidationError(format!(
                "生产订单 {} 已有工艺路线",
                mpo
            )));
        }

        let ts = now();
        let planning_id = PlanningRepository::insert_tx(&tx, &mpo, actor.as_str(), &ts)?;
        PlanningRepository::replace_steps_tx(&tx, planning_id, &stages)?;
        let plan = PlanningRepository::find_by_id_tx(&tx, planning_id)?
            .ok_or_else(|| ApiError::InternalError(format!("计划 {} 写入后读取失败", planning_id)))?;

        tx.commit().map_err(tx_error)?;

        info!(
            planning_id = plan.id,
            mpo = %plan.mpo,
            stage_count = plan.route_steps.len(),
            actor = %actor,
            "工艺路线已创建"
        );
        Ok(plan)
    }

    /// 整体替换工艺路线（先删后建，不做合并）
    ///
    /// # 返回
    /// - Err(NotFound): 订单没有路线
    /// - Err(Conflict): 订单下已有批次开工
    pub fn replace_plan(&self, mpo: &str, stages: &[String], actor: &Actor) -> ApiResult<Planning> {
        let mpo = RoutePlanRules::normalize_key("mpo", mpo)?;
        let stages = RoutePlanRules::normalize_stages(stages)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let existing = PlanningRepository::find_by_mpo_tx(&tx, &mpo)?
            .ok_or_else(|| ApiError::NotFound(format!("生产订单 {} 没有工艺路线", mpo)))?;

        let started = PlanningRepository::has_started_batches_tx(&tx, &mpo)?;
        RoutePlanRules::ensure_replaceable(&mpo, started)?;

        let ts = now();
        PlanningRepository::replace_steps_tx(&tx, existing.id, &stages)?;
        PlanningRepository::touch_tx(&tx, existing.id, actor.as_str(), &ts)?;
        let plan = PlanningRepository::find_by_id_tx(&tx, existing.id)?
            .ok_or_else(|| ApiError::InternalError(format!("计划 {} 更新后读取失败", existing.id)))?;

        tx.commit().map_err(tx_error)?;

        info!(
            planning_id = plan.id,
            mpo = %plan.mpo,
            old_stage_count = existing.route_steps.len(),
            new_stage_count = plan.route_steps.len(),
            actor = %actor,
            "工艺路线已替换"
        );
        Ok(plan)
    }

    /// 登记工序名称
    pub fn register_stage_name(&self, stage: &str) -> ApiResult<StageName> {
        let stage = RoutePlanRules::normalize_key("stage", stage)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        if StageNameRepository::find_by_stage_tx(&tx, &stage)?.is_some() {
            return Err(ApiError::ValidationError(format!("工序名称 {} 已存在", stage)));
        }
        let ts = now();
        let id = StageNameRepository::insert_tx(&tx, &stage, &ts)?;
        tx.commit().map_err(tx_error)?;

        debug!(id, stage = %stage, "工序名称已登记");
        Ok(StageName {
            id,
            stage,
            last_update: ts,
        })
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按序号取工序名
    ///
    /// # 返回
    /// - Err(NotFound): 序号超出路线范围
    pub fn get_stage_at_sequence(&self, plan: &Planning, sequence: i32) -> ApiResult<String> {
        Ok(RoutePlanRules::stage_at(plan, sequence)?.to_string())
    }

    pub fn get_plan(&self, id: i64) -> ApiResult<Planning> {
        self.planning_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("工艺路线(id={})不存在", id)))
    }

    pub fn get_plan_by_mpo(&self, mpo: &str) -> ApiResult<Planning> {
        self.planning_repo
            .find_by_mpo(mpo.trim())?
            .ok_or_else(|| ApiError::NotFound(format!("生产订单 {} 没有工艺路线", mpo.trim())))
    }

    /// 查询路线列表（最近修改在前，可按 mpo 模糊搜索）
    pub fn list_plans(&self, search: Option<&str>) -> ApiResult<Vec<Planning>> {
        Ok(self.planning_repo.list(search)?)
    }

    pub fn list_stage_names(&self) -> ApiResult<Vec<StageName>> {
        Ok(self.stage_name_repo.list_all()?)
    }
}
