// ==========================================
// 成衣批次追踪系统 - 生产计划领域模型
// ==========================================
// 依据: 数据模型 - RoutePlan
// 红线: 工序序号从 1 连续递增，同一计划内工序名不重复
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// StageName - 工序名称字典
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageName {
    pub id: i64,
    pub stage: String,
    pub last_update: NaiveDateTime,
}

// ==========================================
// RouteStep - 工艺路线步骤
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub id: i64,
    pub sequence: i32, // 1 起始
    pub stage: String,
}

// ==========================================
// Planning - 生产订单工艺路线 (RoutePlan)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planning {
    pub id: i64,
    pub mpo: String,                  // 生产订单号 (唯一)
    pub updated_by: String,           // 最后修改人
    pub last_update: NaiveDateTime,   // 最后修改时间
    pub route_steps: Vec<RouteStep>,  // 按 sequence 升序
}

impl Planning {
    /// 按序号取工序名
    pub fn stage_at(&self, sequence: i32) -> Option<&str> {
        self.route_steps
            .iter()
            .find(|step| step.sequence == sequence)
            .map(|step| step.stage.as_str())
    }

    /// 按工序名取步骤
    pub fn step_for_stage(&self, stage: &str) -> Option<&RouteStep> {
        self.route_steps.iter().find(|step| step.stage == stage)
    }

    /// 路线最后一个序号（空路线返回 0）
    pub fn last_sequence(&self) -> i32 {
        self.route_steps
            .iter()
            .map(|step| step.sequence)
            .max()
            .unwrap_or(0)
    }
}
