// ==========================================
// 成衣批次追踪系统 - 工序推进领域模型
// ==========================================
// 依据: 数据模型 - ProgressionState / ProgressionHistory
// 红线: 每个 (batch, sequence) 只能进入一次，不允许回退
// ==========================================

use crate::domain::types::StageStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// BatchStage - 批次当前工序指针（每批次至多一行）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStage {
    pub batch_id: i64,
    pub current_stage: String,
    pub sequence: i32,
    pub current_status: StageStatus,
}

// ==========================================
// StageHistory - 工序进出记录（只追加）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageHistory {
    pub id: i64,
    pub batch_id: i64,
    pub stage: String,
    pub sequence: i32,
    pub entered_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
    pub entered_by: String,
    pub closed_by: Option<String>,
}

impl StageHistory {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// 工序推进结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdateOutcome {
    pub stage: BatchStage,
    /// true: 首次开工（新建指针），false: 更新已有指针
    pub created: bool,
}
