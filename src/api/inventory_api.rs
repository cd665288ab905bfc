// ==========================================
// 成衣批次追踪系统 - 库存台账 API
// ==========================================
// 职责: 收货、自由扎包查询、组批/删批、扎包删除
// 红线: 一个扎包同一时间只能被一个下游占用
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::error::{tx_error, ApiError, ApiResult};
use crate::api::lock_conn;
use crate::db::{begin_write, now};
use crate::domain::inventory::{BatchDetail, NewBundle, ReceivedBundle};
use crate::domain::types::{Actor, AllocationStatus};
use crate::engine::allocation::AllocationRules;
use crate::engine::intake::IntakeRules;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::bundle_repo::BundleRepository;
use crate::repository::planning_repo::PlanningRepository;
use crate::repository::stage_repo::BatchStageRepository;
use crate::repository::wash_repo::WashRepository;

/// 批量收货时被跳过的扎包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedBundle {
    /// 在入参中的下标
    pub index: usize,
    pub bundle_barcode: String,
    pub reason: String,
}

/// 批量收货结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveSummary {
    pub received: Vec<ReceivedBundle>,
    pub skipped: Vec<SkippedBundle>,
}

// ==========================================
// InventoryApi - 库存台账 API
// ==========================================
pub struct InventoryApi {
    conn: Arc<Mutex<Connection>>,
    bundle_repo: Arc<BundleRepository>,
    batch_repo: Arc<BatchRepository>,
}

impl InventoryApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        bundle_repo: Arc<BundleRepository>,
        batch_repo: Arc<BatchRepository>,
    ) -> Self {
        Self {
            conn,
            bundle_repo,
            batch_repo,
        }
    }

    // ==========================================
    // 扎包
    // ==========================================

    /// 收货（占用标记 = received，盖收货人/时间）
    ///
    /// # 返回
    /// - Err(ValidationError): 必填缺失 / 条码重复 / (mpo, marker, bundle_no) 重复
    pub fn receive_bundle(&self, bundle: &NewBundle, actor: &Actor) -> ApiResult<ReceivedBundle> {
        let bundle = IntakeRules::normalize_bundle(bundle)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        if let Some(reason) = Self::duplicate_reason(&tx, &bundle)? {
            return Err(ApiError::ValidationError(reason));
        }
        let received = Self::insert_bundle(&tx, &bundle, actor)?;
        tx.commit().map_err(tx_error)?;

        debug!(
            bundle_id = received.id,
            barcode = %received.bundle_barcode,
            actor = %actor,
            "扎包已收货"
        );
        Ok(received)
    }

    /// 批量收货（单事务）
    ///
    /// # 参数
    /// - skip_existing: true 时已存在的扎包跳过并记录原因；false 时整体失败
    pub fn receive_bundles(
        &self,
        bundles: &[NewBundle],
        actor: &Actor,
        skip_existing: bool,
    ) -> ApiResult<ReceiveSummary> {
        let normalized = bundles
            .iter()
            .enumerate()
            .map(|(idx, b)| {
                IntakeRules::normalize_bundle(b)
                    .map_err(|e| ApiError::ValidationError(format!("第{}条: {}", idx + 1, e)))
            })
            .collect::<ApiResult<Vec<_>>>()?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let mut summary = ReceiveSummary {
            received: Vec::with_capacity(normalized.len()),
            skipped: Vec::new(),
        };
        for (index, bundle) in normalized.iter().enumerate() {
            if let Some(reason) = Self::duplicate_reason(&tx, bundle)? {
                if !skip_existing {
                    return Err(ApiError::ValidationError(format!(
                        "第{}条: {}",
                        index + 1,
                        reason
                    )));
                }
                summary.skipped.push(SkippedBundle {
                    index,
                    bundle_barcode: bundle.bundle_barcode.clone(),
                    reason,
                });
                continue;
            }
            summary.received.push(Self::insert_bundle(&tx, bundle, actor)?);
        }
        tx.commit().map_err(tx_error)?;

        info!(
            received = summary.received.len(),
            skipped = summary.skipped.len(),
            actor = %actor,
            "批量收货完成"
        );
        Ok(summary)
    }

    /// 按 (mpo, marker, bundle_no) 查询可用扎包
    ///
    /// # 返回
    /// - Err(NotFound): 扎包不存在
    /// - Err(Conflict): 扎包已被占用
    pub fn lookup_free_bundle(
        &self,
        mpo: &str,
        marker: &str,
        bundle_no: i64,
    ) -> ApiResult<ReceivedBundle> {
        let mpo = IntakeRules::required("mpo", mpo)?;
        let marker = IntakeRules::required("marker", marker)?;

        let conn = lock_conn(&self.conn)?;
        let bundle = BundleRepository::find_by_marker_tx(&conn, &mpo, &marker, bundle_no)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "扎包不存在: mpo={}, marker={}, bundle_no={}",
                    mpo, marker, bundle_no
                ))
            })?;
        AllocationRules::ensure_free(&bundle)?;
        Ok(bundle)
    }

    /// 删除扎包（仅限未占用）
    pub fn delete_bundle(&self, bundle_id: i64) -> ApiResult<()> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let bundle = BundleRepository::find_by_id_tx(&tx, bundle_id)?
            .ok_or_else(|| ApiError::NotFound(format!("扎包(id={})不存在", bundle_id)))?;
        AllocationRules::ensure_bundle_deletable(&bundle)?;

        if BundleRepository::delete_free_tx(&tx, bundle_id)? == 0 {
            return Err(ApiError::Conflict(format!(
                "扎包 {} 状态已变化，不能删除",
                bundle.bundle_barcode
            )));
        }
        tx.commit().map_err(tx_error)?;

        debug!(bundle_id, barcode = %bundle.bundle_barcode, "扎包已删除");
        Ok(())
    }

    pub fn get_bundle(&self, bundle_id: i64) -> ApiResult<ReceivedBundle> {
        self.bundle_repo
            .find_by_id(bundle_id)?
            .ok_or_else(|| ApiError::NotFound(format!("扎包(id={})不存在", bundle_id)))
    }

    pub fn list_bundles(&self) -> ApiResult<Vec<ReceivedBundle>> {
        Ok(self.bundle_repo.list_all()?)
    }

    // ==========================================
    // 批次
    // ==========================================

    /// 组批
    ///
    /// # 规则（按顺序）
    /// 1. id 非空、不重复
    /// 2. 每个 id 都存在、均未占用、(mpo, size, color) 一致
    /// 3. 按 mpo 绑定工艺路线（不存在则 NotFound）
    /// 4. 同一事务内：建批次 + 成员行 + 翻转占用标记
    pub fn create_batch(&self, bundle_ids: &[i64], actor: &Actor) -> ApiResult<BatchDetail> {
        AllocationRules::check_requested_ids(bundle_ids)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let mut found = Vec::with_capacity(bundle_ids.len());
        for id in bundle_ids {
            if let Some(bundle) = BundleRepository::find_by_id_tx(&tx, *id)? {
                found.push(bundle);
            }
        }
        let key = AllocationRules::check_batch_candidates(bundle_ids, &found)?;

        let plan = PlanningRepository::find_by_mpo_tx(&tx, &key.mpo)?
            .ok_or_else(|| ApiError::NotFound(format!("生产订单 {} 没有工艺路线", key.mpo)))?;

        let ts = now();
        let batch_id = BatchRepository::insert_tx(
            &tx,
            &key.mpo,
            &key.size,
            &key.color,
            plan.id,
            actor.as_str(),
            &ts,
        )?;
        BatchRepository::insert_members_tx(&tx, batch_id, bundle_ids, &ts)?;
        for id in bundle_ids {
            let flipped = BundleRepository::transition_status_tx(
                &tx,
                *id,
                AllocationStatus::Received,
                AllocationStatus::Allocated,
            )?;
            if flipped == 0 {
                return Err(ApiError::Conflict(format!("扎包(id={})已被占用", id)));
            }
        }

        let detail = Self::load_detail(&tx, batch_id)?;
        tx.commit().map_err(tx_error)?;

        info!(
            batch_id,
            mpo = %key.mpo,
            size = %key.size,
            color = %key.color,
            bundle_count = bundle_ids.len(),
            total_quantity = detail.total_quantity,
            actor = %actor,
            "批次已创建"
        );
        Ok(detail)
    }

    /// 删除批次（仅限未开工），成员扎包恢复为 received
    pub fn delete_batch(&self, batch_id: i64) -> ApiResult<()> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        if BatchRepository::find_by_id_tx(&tx, batch_id)?.is_none() {
            return Err(ApiError::NotFound(format!("批次(id={})不存在", batch_id)));
        }
        let started = BatchStageRepository::find_by_batch_tx(&tx, batch_id)?.is_some();
        AllocationRules::ensure_batch_deletable(batch_id, started)?;
        if WashRepository::batch_is_sourced_tx(&tx, batch_id)? {
            return Err(ApiError::Conflict(format!(
                "批次 {} 已投入洗水，不能删除",
                batch_id
            )));
        }

        let members = BatchRepository::list_members_tx(&tx, batch_id)?;
        for member in &members {
            let reverted = BundleRepository::transition_status_tx(
                &tx,
                member.received_id,
                AllocationStatus::Allocated,
                AllocationStatus::Received,
            )?;
            if reverted == 0 {
                warn!(
                    batch_id,
                    bundle_id = member.received_id,
                    "批次成员扎包不是 allocated 状态"
                );
            }
        }
        BatchRepository::delete_tx(&tx, batch_id)?;
        tx.commit().map_err(tx_error)?;

        info!(batch_id, released = members.len(), "批次已删除");
        Ok(())
    }

    /// 批次详情（成员 + 数量合计 + 路线）
    pub fn get_batch(&self, batch_id: i64) -> ApiResult<BatchDetail> {
        let conn = lock_conn(&self.conn)?;
        Self::load_detail(&conn, batch_id)
    }

    pub fn list_batches(&self) -> ApiResult<Vec<BatchDetail>> {
        let batches = self.batch_repo.list_all()?;
        let conn = lock_conn(&self.conn)?;
        batches
            .iter()
            .map(|batch| Self::load_detail(&conn, batch.id))
            .collect()
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn duplicate_reason(tx: &Transaction, bundle: &NewBundle) -> ApiResult<Option<String>> {
        if BundleRepository::find_by_barcode_tx(tx, &bundle.bundle_barcode)?.is_some() {
            return Ok(Some(format!("扎包条码 {} 已存在", bundle.bundle_barcode)));
        }
        if BundleRepository::find_by_marker_tx(tx, &bundle.mpo, &bundle.marker, bundle.bundle_no)?
            .is_some()
        {
            return Ok(Some(format!(
                "扎包已存在: mpo={}, marker={}, bundle_no={}",
                bundle.mpo, bundle.marker, bundle.bundle_no
            )));
        }
        Ok(None)
    }

    fn insert_bundle(tx: &Transaction, bundle: &NewBundle, actor: &Actor) -> ApiResult<ReceivedBundle> {
        let ts = now();
        let id = BundleRepository::insert_tx(tx, bundle, actor.as_str(), &ts)?;
        BundleRepository::find_by_id_tx(tx, id)?
            .ok_or_else(|| ApiError::InternalError(format!("扎包 {} 写入后读取失败", id)))
    }

    fn load_detail(conn: &Connection, batch_id: i64) -> ApiResult<BatchDetail> {
        let batch = BatchRepository::find_by_id_tx(conn, batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("批次(id={})不存在", batch_id)))?;
        let members = BatchRepository::list_members_tx(conn, batch_id)?;
        let planning = PlanningRepository::find_by_id_tx(conn, batch.planning_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("工艺路线(id={})不存在", batch.planning_id))
        })?;
        Ok(BatchDetail::new(batch, members, planning))
    }
}
