// ==========================================
// 成衣批次追踪系统 - 质检次品规则
// ==========================================
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::progression::BatchStage;
use crate::domain::types::StageStatus;
use crate::engine::error::{EngineError, EngineResult};

pub struct RejectionRules;

impl RejectionRules {
    /// 批次必须正处于 (stage, in)
    pub fn ensure_stage_active(pointer: Option<&BatchStage>, stage: &str) -> EngineResult<()> {
        match pointer {
            Some(p) if p.current_stage == stage && p.current_status == StageStatus::In => Ok(()),
            _ => Err(EngineError::validation(format!(
                "批次必须处于工序 {} 且状态为 in",
                stage
            ))),
        }
    }

    /// 删除时传入的工序必须与记录一致
    pub fn ensure_same_stage(record_stage: &str, stage: &str) -> EngineResult<()> {
        if record_stage != stage {
            return Err(EngineError::validation(format!(
                "次品记录属于工序 {}，不是 {}",
                record_stage, stage
            )));
        }
        Ok(())
    }
}
