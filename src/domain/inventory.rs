// ==========================================
// 成衣批次追踪系统 - 库存台账领域模型
// ==========================================
// 依据: 数据模型 - ReceivedUnit / Batch
// 红线: 一个扎包同一时间只能被一个下游占用
// ==========================================

use crate::domain::planning::Planning;
use crate::domain::types::AllocationStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ReceivedBundle - 已收货扎包 (ReceivedUnit)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedBundle {
    pub id: i64,
    pub mpo: String,
    pub buyer: String,
    pub style: String,
    pub marker: String,
    pub bundle_no: i64,
    pub bundle_barcode: String, // 实物条码 (全局唯一)
    pub size: String,
    pub shade: String,
    pub color: String,
    pub quantity: i64,
    pub received_at: NaiveDateTime,
    pub received_by: Option<String>,
    pub status: AllocationStatus,
}

impl ReceivedBundle {
    /// 组批键: (mpo, size, color)
    pub fn grouping_key(&self) -> (&str, &str, &str) {
        (&self.mpo, &self.size, &self.color)
    }
}

/// 收货入参（状态、收货人、收货时间由系统填写）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBundle {
    pub mpo: String,
    pub buyer: String,
    pub style: String,
    pub marker: String,
    pub bundle_no: i64,
    pub bundle_barcode: String,
    pub size: String,
    pub shade: String,
    pub color: String,
    pub quantity: i64,
}

// ==========================================
// Batch - 生产批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub mpo: String,
    pub size: String,
    pub color: String,
    pub planning_id: i64, // 建批时绑定，之后不变
    pub updated_at: NaiveDateTime,
    pub updated_by: String,
}

// ==========================================
// BatchBundle - 批次成员
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchBundle {
    pub id: i64,
    pub batch_id: i64,
    pub received_id: i64,
    pub added_at: NaiveDateTime,
    pub received: ReceivedBundle,
}

/// 批次详情（成员 + 数量合计 + 工艺路线）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDetail {
    pub batch: Batch,
    pub batch_bundles: Vec<BatchBundle>,
    pub total_quantity: i64,
    pub planning: Planning,
}

impl BatchDetail {
    pub fn new(batch: Batch, batch_bundles: Vec<BatchBundle>, planning: Planning) -> Self {
        let total_quantity = batch_bundles.iter().map(|b| b.received.quantity).sum();
        Self {
            batch,
            batch_bundles,
            total_quantity,
            planning,
        }
    }
}
