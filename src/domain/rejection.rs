// ==========================================
// 成衣批次追踪系统 - 质检次品领域模型
// ==========================================
// 依据: 数据模型 - RejectionRecord / RejectionSummary
// 红线: summary.rejection_count == 对应 (batch, stage) 的次品行数
// ==========================================

use crate::domain::types::DefectReason;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Rejection - 单件次品记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: i64,
    pub individual_barcode: String, // 成衣条码 (全局唯一)
    pub batch_id: i64,
    pub stage: String,
    pub reason: DefectReason,
    pub rejected_at: NaiveDateTime,
    pub rejected_by: String,
}

// ==========================================
// QcStageSummary - (批次, 工序) 次品计数
// ==========================================
// 冗余计数，与 Rejection 在同一事务内维护
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcStageSummary {
    pub id: i64,
    pub batch_id: i64,
    pub stage: String,
    pub rejection_count: i64,
    pub last_update: NaiveDateTime,
}

/// 次品所属扎包信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBundleInfo {
    pub mpo: String,
    pub marker: String,
    pub size: String,
    pub shade: String,
    pub color: String,
}

/// 次品详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionDetail {
    pub rejection: Rejection,
    pub details: RejectionBundleInfo,
}
