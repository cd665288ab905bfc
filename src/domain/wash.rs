// ==========================================
// 成衣批次追踪系统 - 洗水投料领域模型
// ==========================================
// 依据: 数据模型 - ConsumptionBatch
// 红线: 一个洗水批次只能有一种来源（整批 XOR 单扎）
// ==========================================

use crate::domain::types::WashSourceKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// WashBatch - 一洗投料批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashBatch {
    pub id: i64,
    pub shade: String,
    pub source_kind: WashSourceKind,
    pub created_at: NaiveDateTime,
    pub created_by: String,
    pub total_quantity: i64,
    pub status: Option<String>,
}

/// 投料来源行（source_id 指向 batch.id 或 received_bundle.id）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WashSource {
    pub id: i64,
    pub wash_batch_id: i64,
    pub source_id: i64,
    pub quantity: i64,
}

/// 洗水批次详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashBatchDetail {
    pub wash_batch: WashBatch,
    pub sources: Vec<WashSource>,
}

/// 投料明细入参
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WashItem {
    pub source_id: i64,
    pub quantity: i64,
}

/// 创建洗水批次入参
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewWashBatch {
    pub shade: String,
    pub batch_sources: Option<Vec<WashItem>>,
    pub bundle_sources: Option<Vec<WashItem>>,
}
