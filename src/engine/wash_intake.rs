// ==========================================
// 成衣批次追踪系统 - 一洗投料规则
// ==========================================
// 职责: 投料请求校验、单个来源的可用性判定
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::inventory::ReceivedBundle;
use crate::domain::types::WashSourceKind;
use crate::domain::wash::{NewWashBatch, WashItem};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashSet;

/// 校验通过的投料请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WashPlan {
    pub shade: String,
    pub source_kind: WashSourceKind,
    pub items: Vec<WashItem>,
}

impl WashPlan {
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

pub struct WashIntakeRules;

impl WashIntakeRules {
    /// 校验投料请求
    ///
    /// # 规则
    /// - shade 不能为空
    /// - 整批来源与单扎来源必须且只能提供一种（空列表视为未提供）
    /// - 每项数量 >= 1
    /// - 同一请求内来源 id 不能重复
    pub fn check_request(request: &NewWashBatch) -> EngineResult<WashPlan> {
        let shade = request.shade.trim();
        if shade.is_empty() {
            return Err(EngineError::validation("shade 不能为空"));
        }

        let batch_items = request.batch_sources.as_deref().filter(|v| !v.is_empty());
        let bundle_items = request.bundle_sources.as_deref().filter(|v| !v.is_empty());

        let (source_kind, items) = match (batch_items, bundle_items) {
            (Some(items), None) => (WashSourceKind::Batch, items),
            (None, Some(items)) => (WashSourceKind::Bundle, items),
            (Some(_), Some(_)) => {
                return Err(EngineError::validation("只能提供整批来源或单扎来源其中一种"));
            }
            (None, None) => {
                return Err(EngineError::validation("必须提供整批来源或单扎来源"));
            }
        };

        let mut seen = HashSet::with_capacity(items.len());
        for item in items {
            if item.quantity < 1 {
                return Err(EngineError::validation(format!(
                    "来源 {} 的数量必须大于等于 1",
                    item.source_id
                )));
            }
            if !seen.insert(item.source_id) {
                return Err(EngineError::validation(format!(
                    "来源 {} 在请求中重复",
                    item.source_id
                )));
            }
        }

        Ok(WashPlan {
            shade: shade.to_string(),
            source_kind,
            items: items.to_vec(),
        })
    }

    /// 单扎来源：必须未占用，数量不超过扎包数量
    pub fn check_bundle_source(item: &WashItem, bundle: &ReceivedBundle) -> EngineResult<()> {
        if !bundle.status.is_free() {
            return Err(EngineError::validation(format!(
                "扎包 {} 已被占用",
                bundle.bundle_barcode
            )));
        }
        if item.quantity > bundle.quantity {
            return Err(EngineError::validation(format!(
                "扎包 {} 投料数量 {} 超过可用数量 {}",
                bundle.bundle_barcode, item.quantity, bundle.quantity
            )));
        }
        Ok(())
    }

    /// 整批来源：同一批次只能投料一次，数量不超过批次合计
    pub fn check_batch_source(
        item: &WashItem,
        available: i64,
        already_sourced: bool,
    ) -> EngineResult<()> {
        if already_sourced {
            return Err(EngineError::conflict(format!(
                "批次 {} 已投入洗水",
                item.source_id
            )));
        }
        if item.quantity > available {
            return Err(EngineError::validation(format!(
                "批次 {} 投料数量 {} 超过可用数量 {}",
                item.source_id, item.quantity, available
            )));
        }
        Ok(())
    }
}
