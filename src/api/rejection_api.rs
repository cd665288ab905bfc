// ==========================================
// 成衣批次追踪系统 - 质检次品 API
// ==========================================
// 职责: 次品登记/删除/改原因，(批次, 工序) 计数汇总维护与重建
// 红线: 次品只能在批次处于 (stage, in) 时登记或删除；
//       汇总计数与次品行在同一事务内维护
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::api::error::{tx_error, ApiError, ApiResult};
use crate::api::lock_conn;
use crate::db::{begin_write, now};
use crate::domain::rejection::{QcStageSummary, Rejection, RejectionBundleInfo, RejectionDetail};
use crate::domain::types::{Actor, DefectReason};
use crate::engine::barcode::derive_bundle_barcode;
use crate::engine::intake::IntakeRules;
use crate::engine::rejection::RejectionRules;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::bundle_repo::BundleRepository;
use crate::repository::rejection_repo::RejectionRepository;
use crate::repository::stage_repo::BatchStageRepository;

// ==========================================
// RejectionApi - 质检次品 API
// ==========================================
pub struct RejectionApi {
    conn: Arc<Mutex<Connection>>,
    rejection_repo: Arc<RejectionRepository>,
}

impl RejectionApi {
    pub fn new(conn: Arc<Mutex<Connection>>, rejection_repo: Arc<RejectionRepository>) -> Self {
        Self {
            conn,
            rejection_repo,
        }
    }

    /// 登记次品
    ///
    /// # 规则
    /// 1. 成衣条码全局只能登记一次
    /// 2. 由成衣条码推导扎包条码，扎包不存在为 NotFound
    /// 3. 扎包必须已分配到批次
    /// 4. 批次必须正处于 (stage, in)
    /// 5. 同一事务内：写次品行 + 汇总计数 +1
    pub fn record_rejection(
        &self,
        garment_barcode: &str,
        stage: &str,
        reason: DefectReason,
        actor: &Actor,
    ) -> ApiResult<Rejection> {
        let garment_barcode = IntakeRules::required("individual_barcode", garment_barcode)?;
        let stage = IntakeRules::required("stage", stage)?;
        let bundle_barcode = derive_bundle_barcode(&garment_barcode)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        if RejectionRepository::find_by_barcode_tx(&tx, &garment_barcode)?.is_some() {
            return Err(ApiError::ValidationError(format!(
                "成衣 {} 已登记过次品",
                garment_barcode
            )));
        }

        let bundle = BundleRepository::find_by_barcode_tx(&tx, &bundle_barcode)?.ok_or_else(|| {
            ApiError::NotFound(format!(
                "成衣 {} 所属扎包 {} 尚未收货",
                garment_barcode, bundle_barcode
            ))
        })?;
        let batch_id = BundleRepository::find_owning_batch_id_tx(&tx, bundle.id)?.ok_or_else(|| {
            ApiError::ValidationError(format!("扎包 {} 尚未分配到任何批次", bundle.bundle_barcode))
        })?;

        let pointer = BatchStageRepository::find_by_batch_tx(&tx, batch_id)?;
        RejectionRules::ensure_stage_active(pointer.as_ref(), &stage)?;

        let ts = now();
        let id = RejectionRepository::insert_tx(
            &tx,
            &garment_barcode,
            batch_id,
            &stage,
            reason,
            actor.as_str(),
            &ts,
        )?;
        RejectionRepository::increment_summary_tx(&tx, batch_id, &stage, &ts)?;
        let rejection = RejectionRepository::find_by_id_tx(&tx, id)?
            .ok_or_else(|| ApiError::InternalError(format!("次品 {} 写入后读取失败", id)))?;
        tx.commit().map_err(tx_error)?;

        info!(
            rejection_id = id,
            batch_id,
            stage = %stage,
            reason = %reason,
            actor = %actor,
            "次品已登记"
        );
        Ok(rejection)
    }

    /// 删除次品（批次须仍处于该工序 in），汇总计数 -1，降到 0 删除汇总行
    pub fn delete_rejection(&self, rejection_id: i64, stage: &str) -> ApiResult<()> {
        let stage = IntakeRules::required("stage", stage)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let record = RejectionRepository::find_by_id_tx(&tx, rejection_id)?
            .ok_or_else(|| ApiError::NotFound(format!("次品记录(id={})不存在", rejection_id)))?;
        RejectionRules::ensure_same_stage(&record.stage, &stage)?;

        let pointer = BatchStageRepository::find_by_batch_tx(&tx, record.batch_id)?;
        RejectionRules::ensure_stage_active(pointer.as_ref(), &stage)?;

        let ts = now();
        if RejectionRepository::decrement_summary_tx(&tx, record.batch_id, &record.stage, &ts)? == 0 {
            warn!(
                batch_id = record.batch_id,
                stage = %record.stage,
                "数据一致性: 次品存在但没有汇总行"
            );
        }
        RejectionRepository::delete_tx(&tx, rejection_id)?;
        tx.commit().map_err(tx_error)?;

        info!(
            rejection_id,
            batch_id = record.batch_id,
            stage = %record.stage,
            "次品已删除"
        );
        Ok(())
    }

    /// 修改次品原因（同时改写操作人与时间，不影响计数）
    pub fn update_rejection_reason(
        &self,
        rejection_id: i64,
        reason: DefectReason,
        actor: &Actor,
    ) -> ApiResult<Rejection> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let ts = now();
        if RejectionRepository::update_reason_tx(&tx, rejection_id, reason, actor.as_str(), &ts)? == 0 {
            return Err(ApiError::NotFound(format!(
                "次品记录(id={})不存在",
                rejection_id
            )));
        }
        let rejection = RejectionRepository::find_by_id_tx(&tx, rejection_id)?.ok_or_else(|| {
            ApiError::InternalError(format!("次品 {} 更新后读取失败", rejection_id))
        })?;
        tx.commit().map_err(tx_error)?;

        info!(rejection_id, reason = %reason, actor = %actor, "次品原因已修改");
        Ok(rejection)
    }

    /// 按次品行重建某批次的汇总计数（修复用）
    pub fn rebuild_qc_summaries(&self, batch_id: i64) -> ApiResult<Vec<QcStageSummary>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        if BatchRepository::find_by_id_tx(&tx, batch_id)?.is_none() {
            return Err(ApiError::NotFound(format!("批次(id={})不存在", batch_id)));
        }
        let rebuilt = RejectionRepository::rebuild_summaries_tx(&tx, batch_id, &now())?;
        let summaries = RejectionRepository::list_summaries_tx(&tx, Some(batch_id), None)?;
        tx.commit().map_err(tx_error)?;

        info!(batch_id, rebuilt, "次品汇总已重建");
        Ok(summaries)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_rejection(&self, rejection_id: i64) -> ApiResult<Rejection> {
        self.rejection_repo
            .find_by_id(rejection_id)?
            .ok_or_else(|| ApiError::NotFound(format!("次品记录(id={})不存在", rejection_id)))
    }

    pub fn list_rejections(&self, batch_id: Option<i64>) -> ApiResult<Vec<Rejection>> {
        Ok(self.rejection_repo.list(batch_id)?)
    }

    /// 次品详情：附带所属扎包的 mpo/marker/size/shade/color
    pub fn get_rejection_detail(&self, rejection_id: i64) -> ApiResult<RejectionDetail> {
        let rejection = self.get_rejection(rejection_id)?;
        let bundle_barcode = derive_bundle_barcode(&rejection.individual_barcode)?;

        let conn = lock_conn(&self.conn)?;
        let bundle = BundleRepository::find_by_barcode_tx(&conn, &bundle_barcode)?.ok_or_else(|| {
            ApiError::NotFound(format!(
                "成衣 {} 所属扎包 {} 不存在",
                rejection.individual_barcode, bundle_barcode
            ))
        })?;

        Ok(RejectionDetail {
            details: RejectionBundleInfo {
                mpo: bundle.mpo,
                marker: bundle.marker,
                size: bundle.size,
                shade: bundle.shade,
                color: bundle.color,
            },
            rejection,
        })
    }

    /// 计数汇总（批次、工序均可选）
    pub fn list_qc_summaries(
        &self,
        batch_id: Option<i64>,
        stage: Option<&str>,
    ) -> ApiResult<Vec<QcStageSummary>> {
        Ok(self.rejection_repo.list_summaries(batch_id, stage)?)
    }
}
