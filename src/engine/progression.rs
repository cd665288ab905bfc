// ==========================================
// 成衣批次追踪系统 - 工序推进状态机
// ==========================================
// 职责: 根据当前工序指针与请求，判定合法的状态转换
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================
// 状态:
//   NotStarted
//   InStage(seq)      -- 进入第 seq 道工序
//   ClosedStage(seq)  -- 第 seq 道工序已完成
// 合法转换:
//   NotStarted        --in(1)-->        InStage(1)        [Open]
//   InStage(n)        --closed(n)-->    ClosedStage(n)    [Close]
//   ClosedStage(n)    --in(n+1)-->      InStage(n+1)      [Advance]
// 终态: ClosedStage(最后一道) -> 任何请求均为 Conflict
// ==========================================

use crate::domain::planning::Planning;
use crate::domain::progression::BatchStage;
use crate::domain::types::StageStatus;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::route_plan::RoutePlanRules;

/// 批次工序状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressionState {
    NotStarted,
    InStage { sequence: i32, stage: String },
    ClosedStage { sequence: i32, stage: String },
}

impl ProgressionState {
    /// 由持久化的工序指针构造
    pub fn from_pointer(pointer: Option<&BatchStage>) -> Self {
        match pointer {
            None => ProgressionState::NotStarted,
            Some(p) => match p.current_status {
                StageStatus::In => ProgressionState::InStage {
                    sequence: p.sequence,
                    stage: p.current_stage.clone(),
                },
                StageStatus::Closed => ProgressionState::ClosedStage {
                    sequence: p.sequence,
                    stage: p.current_stage.clone(),
                },
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            ProgressionState::NotStarted => "未开工".to_string(),
            ProgressionState::InStage { stage, .. } => format!("当前工序 {}，状态 in", stage),
            ProgressionState::ClosedStage { stage, .. } => {
                format!("当前工序 {}，状态 closed", stage)
            }
        }
    }
}

/// 工序推进请求（sequence 已按路线解析）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    pub stage: String,
    pub sequence: i32,
    pub status: StageStatus,
}

/// 判定结果：需要执行的持久化动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageTransition {
    /// 首次开工：新建指针 + 历史行
    Open { sequence: i32, stage: String },
    /// 关闭当前工序：指针置 closed + 历史行盖章
    Close { sequence: i32, stage: String },
    /// 进入下一道工序：指针前移 + 新历史行
    Advance {
        from_sequence: i32,
        sequence: i32,
        stage: String,
    },
}

impl StageTransition {
    /// 转换后的状态
    pub fn resulting_state(&self) -> ProgressionState {
        match self {
            StageTransition::Open { sequence, stage }
            | StageTransition::Advance {
                sequence, stage, ..
            } => ProgressionState::InStage {
                sequence: *sequence,
                stage: stage.clone(),
            },
            StageTransition::Close { sequence, stage } => ProgressionState::ClosedStage {
                sequence: *sequence,
                stage: stage.clone(),
            },
        }
    }
}

// ==========================================
// StageProgressionEngine - 纯函数状态机
// ==========================================
pub struct StageProgressionEngine;

impl StageProgressionEngine {
    /// 按路线解析请求：工序必须在路线内，序号取路线中的序号
    pub fn resolve_request(
        plan: &Planning,
        stage: &str,
        status: StageStatus,
    ) -> EngineResult<StageRequest> {
        let step = plan.step_for_stage(stage.trim()).ok_or_else(|| {
            EngineError::validation(format!(
                "工序 {} 不在生产订单 {} 的工艺路线中",
                stage.trim(),
                plan.mpo
            ))
        })?;
        Ok(StageRequest {
            stage: step.stage.clone(),
            sequence: step.sequence,
            status,
        })
    }

    /// 调用方显式给出序号时：工序名必须与路线上该序号的工序一致
    ///
    /// 序号超出路线范围时不在此处拒绝，由状态机给出具体原因
    pub fn explicit_request(
        plan: &Planning,
        stage: &str,
        sequence: i32,
        status: StageStatus,
    ) -> EngineResult<StageRequest> {
        let stage = stage.trim();
        if let Some(expected) = plan.stage_at(sequence) {
            if expected != stage {
                return Err(EngineError::validation(format!(
                    "工序 {} 与序号 {} 不匹配，路线中该序号为 {}",
                    stage, sequence, expected
                )));
            }
        }
        Ok(StageRequest {
            stage: stage.to_string(),
            sequence,
            status,
        })
    }

    /// 判定状态转换
    ///
    /// # 返回
    /// - `Ok(StageTransition)`: 合法转换
    /// - `Err(Validation)`: 乱序、跳步、重复进入/关闭
    /// - `Err(Conflict)`: 批次已完成最后一道工序
    pub fn apply(
        state: &ProgressionState,
        request: &StageRequest,
        plan: &Planning,
    ) -> EngineResult<StageTransition> {
        match state {
            ProgressionState::NotStarted => Self::from_not_started(request, plan),
            ProgressionState::InStage { sequence, stage } => {
                Self::from_in_stage(state, *sequence, stage, request, plan)
            }
            ProgressionState::ClosedStage { sequence, .. } => {
                if *sequence >= plan.last_sequence() {
                    return Err(EngineError::conflict("该批次已完成全部工序，已出产"));
                }
                Self::from_closed_stage(state, *sequence, request, plan)
            }
        }
    }

    fn from_not_started(request: &StageRequest, plan: &Planning) -> EngineResult<StageTransition> {
        let first = RoutePlanRules::stage_at(plan, 1)?;
        if request.sequence == 1 && request.status == StageStatus::In && request.stage == first {
            return Ok(StageTransition::Open {
                sequence: 1,
                stage: request.stage.clone(),
            });
        }
        Err(EngineError::validation(format!(
            "请按工艺路线执行：首道工序为 {}，首个操作应为 in",
            first
        )))
    }

    fn from_in_stage(
        state: &ProgressionState,
        current: i32,
        current_stage: &str,
        request: &StageRequest,
        plan: &Planning,
    ) -> EngineResult<StageTransition> {
        match request.status {
            StageStatus::Closed => {
                if request.sequence == current {
                    Ok(StageTransition::Close {
                        sequence: current,
                        stage: current_stage.to_string(),
                    })
                } else if request.sequence > current {
                    Err(EngineError::validation(format!(
                        "请先完成前面的工序。{}",
                        state.describe()
                    )))
                } else {
                    Err(EngineError::validation(format!(
                        "该工序已完成。{}",
                        state.describe()
                    )))
                }
            }
            StageStatus::In => {
                if request.sequence == current {
                    Err(EngineError::validation(format!(
                        "已在工序 {} 中，状态 in",
                        current_stage
                    )))
                } else if request.sequence > current {
                    // 当前已是最后一道时没有下一道工序
                    let message = match plan.stage_at(current + 1) {
                        Some(next) => format!(
                            "{}。需先关闭当前工序才能进入下一道，下一道工序为 {}",
                            state.describe(),
                            next
                        ),
                        None => format!(
                            "{}。当前已是最后一道工序，请先关闭当前工序",
                            state.describe()
                        ),
                    };
                    Err(EngineError::validation(message))
                } else {
                    Err(EngineError::validation(format!(
                        "该工序已完成。{}",
                        state.describe()
                    )))
                }
            }
        }
    }

    fn from_closed_stage(
        state: &ProgressionState,
        current: i32,
        request: &StageRequest,
        plan: &Planning,
    ) -> EngineResult<StageTransition> {
        match request.status {
            StageStatus::In => {
                if request.sequence == current + 1 {
                    Ok(StageTransition::Advance {
                        from_sequence: current,
                        sequence: request.sequence,
                        stage: request.stage.clone(),
                    })
                } else if request.sequence == current {
                    Err(EngineError::validation(format!(
                        "已在该工序中且已关闭。{}",
                        state.describe()
                    )))
                } else if request.sequence < current {
                    Err(EngineError::validation(format!(
                        "该工序已完成。{}",
                        state.describe()
                    )))
                } else {
                    let next = plan.stage_at(current + 1).unwrap_or("无");
                    Err(EngineError::validation(format!(
                        "不能跳过工序。{}，下一道工序为 {}",
                        state.describe(),
                        next
                    )))
                }
            }
            StageStatus::Closed => {
                if request.sequence == current {
                    Err(EngineError::validation(format!(
                        "工序 {} 已经是 closed",
                        request.stage
                    )))
                } else if request.sequence > current {
                    Err(EngineError::validation(format!(
                        "请先完成前面的工序。{}",
                        state.describe()
                    )))
                } else {
                    Err(EngineError::validation(format!(
                        "该工序已完成。{}",
                        state.describe()
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::planning::RouteStep;
    use chrono::NaiveDate;

    fn route() -> Planning {
        Planning {
            id: 1,
            mpo: "MPO1".to_string(),
            updated_by: "planner".to_string(),
            last_update: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            route_steps: ["cutting", "sewing", "washing"]
                .iter()
                .enumerate()
                .map(|(i, s)| RouteStep {
                    id: i as i64 + 1,
                    sequence: i as i32 + 1,
                    stage: s.to_string(),
                })
                .collect(),
        }
    }

    fn request(plan: &Planning, stage: &str, status: StageStatus) -> StageRequest {
        StageProgressionEngine::resolve_request(plan, stage, status).unwrap()
    }

    fn in_stage(sequence: i32, stage: &str) -> ProgressionState {
        ProgressionState::InStage {
            sequence,
            stage: stage.to_string(),
        }
    }

    fn closed_stage(sequence: i32, stage: &str) -> ProgressionState {
        ProgressionState::ClosedStage {
            sequence,
            stage: stage.to_string(),
        }
    }

    #[test]
    fn test_resolve_request_uses_route_sequence() {
        let plan = route();
        let req = request(&plan, "sewing", StageStatus::In);
        assert_eq!(req.sequence, 2);

        let err = StageProgressionEngine::resolve_request(&plan, "ironing", StageStatus::In)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_explicit_request_must_match_route() {
        let plan = route();
        let req = StageProgressionEngine::explicit_request(&plan, "sewing", 2, StageStatus::In)
            .unwrap();
        assert_eq!(req.stage, "sewing");

        assert!(StageProgressionEngine::explicit_request(&plan, "washing", 2, StageStatus::In)
            .is_err());

        // 超出路线范围交给状态机判定
        let beyond = StageProgressionEngine::explicit_request(&plan, "packing", 9, StageStatus::In)
            .unwrap();
        let err = StageProgressionEngine::apply(&closed_stage(1, "cutting"), &beyond, &plan)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("sewing")));
    }

    #[test]
    fn test_not_started_only_opens_first_stage() {
        let plan = route();
        let state = ProgressionState::NotStarted;

        let t = StageProgressionEngine::apply(&state, &request(&plan, "cutting", StageStatus::In), &plan)
            .unwrap();
        assert_eq!(
            t,
            StageTransition::Open {
                sequence: 1,
                stage: "cutting".to_string()
            }
        );
        assert_eq!(t.resulting_state(), in_stage(1, "cutting"));

        for (stage, status) in [
            ("sewing", StageStatus::In),
            ("cutting", StageStatus::Closed),
        ] {
            let err = StageProgressionEngine::apply(&state, &request(&plan, stage, status), &plan)
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(ref m) if m.contains("cutting")));
        }
    }

    #[test]
    fn test_in_stage_transitions() {
        let plan = route();
        let state = in_stage(2, "sewing");

        let close = StageProgressionEngine::apply(&state, &request(&plan, "sewing", StageStatus::Closed), &plan)
            .unwrap();
        assert_eq!(close.resulting_state(), closed_stage(2, "sewing"));

        // 关闭后面的工序 / 前面的工序 / 重复进入 / 未关闭就进入下一道
        for (stage, status) in [
            ("washing", StageStatus::Closed),
            ("cutting", StageStatus::Closed),
            ("sewing", StageStatus::In),
            ("cutting", StageStatus::In),
        ] {
            let err = StageProgressionEngine::apply(&state, &request(&plan, stage, status), &plan)
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{} {}", stage, status);
        }

        let err = StageProgressionEngine::apply(&state, &request(&plan, "washing", StageStatus::In), &plan)
            .unwrap_err();
        assert!(err.to_string().contains("washing"));
    }

    #[test]
    fn test_in_last_stage_request_beyond_route_is_validation() {
        let plan = route();
        let state = in_stage(3, "washing");
        let beyond = StageRequest {
            stage: "packing".to_string(),
            sequence: 4,
            status: StageStatus::In,
        };

        let err = StageProgressionEngine::apply(&state, &beyond, &plan).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("最后一道")));
    }

    #[test]
    fn test_closed_stage_advances_by_exactly_one() {
        let plan = route();
        let state = closed_stage(1, "cutting");

        let t = StageProgressionEngine::apply(&state, &request(&plan, "sewing", StageStatus::In), &plan)
            .unwrap();
        assert_eq!(
            t,
            StageTransition::Advance {
                from_sequence: 1,
                sequence: 2,
                stage: "sewing".to_string()
            }
        );

        // 跳步：错误信息给出真正的下一道工序
        let err = StageProgressionEngine::apply(&state, &request(&plan, "washing", StageStatus::In), &plan)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("sewing")));

        for (stage, status) in [
            ("cutting", StageStatus::In),
            ("cutting", StageStatus::Closed),
            ("sewing", StageStatus::Closed),
        ] {
            let err = StageProgressionEngine::apply(&state, &request(&plan, stage, status), &plan)
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }
    }

    #[test]
    fn test_last_stage_closed_is_terminal() {
        let plan = route();
        let state = closed_stage(3, "washing");

        for (stage, status) in [
            ("washing", StageStatus::In),
            ("washing", StageStatus::Closed),
            ("cutting", StageStatus::In),
        ] {
            let err = StageProgressionEngine::apply(&state, &request(&plan, stage, status), &plan)
                .unwrap_err();
            assert!(matches!(err, EngineError::Conflict(_)));
        }
    }

    #[test]
    fn test_full_route_walkthrough() {
        let plan = route();
        let mut state = ProgressionState::NotStarted;

        for stage in ["cutting", "sewing", "washing"] {
            for status in [StageStatus::In, StageStatus::Closed] {
                let t = StageProgressionEngine::apply(&state, &request(&plan, stage, status), &plan)
                    .unwrap();
                state = t.resulting_state();
            }
        }
        assert_eq!(state, closed_stage(3, "washing"));
    }
}
