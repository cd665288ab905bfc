// ==========================================
// 成衣批次追踪系统 - 工艺路线规则
// ==========================================
// 职责: 路线输入校验、按序号取工序、路线锁定判定
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::planning::Planning;
use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashSet;

pub struct RoutePlanRules;

impl RoutePlanRules {
    /// 校验并规整工序列表
    ///
    /// # 规则
    /// - 列表不能为空
    /// - 工序名去首尾空白后不能为空
    /// - 工序名不能重复（序号由下标 + 1 生成，天然连续）
    pub fn normalize_stages(stages: &[String]) -> EngineResult<Vec<String>> {
        if stages.is_empty() {
            return Err(EngineError::validation("工艺路线不能为空"));
        }

        let mut seen = HashSet::with_capacity(stages.len());
        let mut normalized = Vec::with_capacity(stages.len());
        for (idx, raw) in stages.iter().enumerate() {
            let stage = raw.trim();
            if stage.is_empty() {
                return Err(EngineError::validation(format!(
                    "第{}道工序名称为空",
                    idx + 1
                )));
            }
            if !seen.insert(stage.to_string()) {
                return Err(EngineError::validation(format!(
                    "工序 {} 在路线中重复",
                    stage
                )));
            }
            normalized.push(stage.to_string());
        }
        Ok(normalized)
    }

    /// 规整生产订单号 / 工序字典名
    pub fn normalize_key(field: &str, raw: &str) -> EngineResult<String> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(EngineError::validation(format!("{} 不能为空", field)));
        }
        Ok(value.to_string())
    }

    /// 按序号取工序名
    pub fn stage_at(plan: &Planning, sequence: i32) -> EngineResult<&str> {
        plan.stage_at(sequence).ok_or_else(|| {
            EngineError::not_found(format!(
                "生产订单 {} 的工艺路线中不存在序号 {}（共 {} 道工序）",
                plan.mpo,
                sequence,
                plan.route_steps.len()
            ))
        })
    }

    /// 已有批次开工的订单不允许修改路线
    pub fn ensure_replaceable(mpo: &str, production_started: bool) -> EngineResult<()> {
        if production_started {
            return Err(EngineError::conflict(format!(
                "生产订单 {} 已有批次开工，不能修改工艺路线",
                mpo
            )));
        }
        Ok(())
    }
}
