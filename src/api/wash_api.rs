// ==========================================
// 成衣批次追踪系统 - 一洗投料 API
// ==========================================
// 职责: 创建洗水批次（整批来源或单扎来源），全部成功或全部回滚
// 红线: 单扎来源必须未占用，投料后翻转为 allocated；
//       整批来源同一批次只能投料一次
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction};
use tracing::{debug, info, instrument};

use crate::api::error::{tx_error, ApiError, ApiResult};
use crate::api::lock_conn;
use crate::db::{begin_write, now};
use crate::domain::types::{Actor, AllocationStatus, WashSourceKind};
use crate::domain::wash::{NewWashBatch, WashBatchDetail, WashItem};
use crate::engine::wash_intake::WashIntakeRules;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::bundle_repo::BundleRepository;
use crate::repository::wash_repo::WashRepository;

pub struct WashApi {
    conn: Arc<Mutex<Connection>>,
    wash_repo: Arc<WashRepository>,
}

impl WashApi {
    pub fn new(conn: Arc<Mutex<Connection>>, wash_repo: Arc<WashRepository>) -> Self {
        Self { conn, wash_repo }
    }

    /// 创建洗水批次
    ///
    /// # 返回
    /// - Err(ValidationError): 来源种类不唯一 / 数量 < 1 / 扎包已占用 / 超量
    /// - Err(NotFound): 来源批次或扎包不存在
    /// - Err(Conflict): 整批来源已投料过
    #[instrument(skip(self, request, actor), fields(actor = %actor))]
    pub fn create_wash_batch(
        &self,
        request: &NewWashBatch,
        actor: &Actor,
    ) -> ApiResult<WashBatchDetail> {
        let plan = WashIntakeRules::check_request(request)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = begin_write(&mut conn).map_err(tx_error)?;

        let wash_batch_id =
            WashRepository::insert_header_tx(&tx, &plan.shade, plan.source_kind, actor.as_str(), &now())?;

        for item in &plan.items {
            match plan.source_kind {
                WashSourceKind::Bundle => Self::consume_bundle(&tx, wash_batch_id, item)?,
                WashSourceKind::Batch => Self::consume_batch(&tx, wash_batch_id, item)?,
            }
        }

        WashRepository::set_total_quantity_tx(&tx, wash_batch_id, plan.total_quantity())?;
        let detail = WashRepository::find_by_id_tx(&tx, wash_batch_id)?.ok_or_else(|| {
            ApiError::InternalError(format!("洗水批次 {} 写入后读取失败", wash_batch_id))
        })?;
        tx.commit().map_err(tx_error)?;

        info!(
            wash_batch_id,
            shade = %detail.wash_batch.shade,
            source_kind = %plan.source_kind,
            sources = detail.sources.len(),
            total_quantity = detail.wash_batch.total_quantity,
            "洗水批次已创建"
        );
        Ok(detail)
    }

    pub fn get_wash_batch(&self, id: i64) -> ApiResult<WashBatchDetail> {
        self.wash_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("洗水批次(id={})不存在", id)))
    }

    pub fn list_wash_batches(&self) -> ApiResult<Vec<WashBatchDetail>> {
        Ok(self.wash_repo.list_all()?)
    }

    fn consume_bundle(tx: &Transaction, wash_batch_id: i64, item: &WashItem) -> ApiResult<()> {
        let bundle = BundleRepository::find_by_id_tx(tx, item.source_id)?
            .ok_or_else(|| ApiError::NotFound(format!("扎包(id={})不存在", item.source_id)))?;
        WashIntakeRules::check_bundle_source(item, &bundle)?;

        WashRepository::insert_source_tx(
            tx,
            WashSourceKind::Bundle,
            wash_batch_id,
            bundle.id,
            item.quantity,
        )?;
        let flipped = BundleRepository::transition_status_tx(
            tx,
            bundle.id,
            AllocationStatus::Received,
            AllocationStatus::Allocated,
        )?;
        if flipped == 0 {
            return Err(ApiError::ValidationError(format!(
                "扎包 {} 已被占用",
                bundle.bundle_barcode
            )));
        }
        debug!(wash_batch_id, bundle_id = bundle.id, quantity = item.quantity, "扎包已投料");
        Ok(())
    }

    fn consume_batch(tx: &Transaction, wash_batch_id: i64, item: &WashItem) -> ApiResult<()> {
        if BatchRepository::find_by_id_tx(tx, item.source_id)?.is_none() {
            return Err(ApiError::NotFound(format!("批次(id={})不存在", item.source_id)));
        }
        let available = BatchRepository::total_quantity_tx(tx, item.source_id)?;
        let already_sourced = WashRepository::batch_is_sourced_tx(tx, item.source_id)?;
        WashIntakeRules::check_batch_source(item, available, already_sourced)?;

        WashRepository::insert_source_tx(
            tx,
            WashSourceKind::Batch,
            wash_batch_id,
            item.source_id,
            item.quantity,
        )?;
        debug!(wash_batch_id, batch_id = item.source_id, quantity = item.quantity, "批次已投料");
        Ok(())
    }
}
