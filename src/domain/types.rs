// ==========================================
// 成衣批次追踪系统 - 领域类型定义
// ==========================================
// 依据: 数据模型 - 占用标记 / 工序状态 / 次品原因 / 洗水来源
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 未登录时审计字段使用的操作人
pub const SYSTEM_ACTOR: &str = "system";

// ==========================================
// 操作人 (Actor)
// ==========================================
// 所有 *_by 审计字段的来源，由身份提供方传入
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(String);

impl Actor {
    /// 由已认证的用户名构造；缺失或为空时回退为 "system"
    pub fn from_identity(username: Option<&str>) -> Self {
        match username.map(str::trim) {
            Some(name) if !name.is_empty() => Actor(name.to_string()),
            _ => Actor::system(),
        }
    }

    pub fn system() -> Self {
        Actor(SYSTEM_ACTOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==========================================
// 扎包占用标记 (Allocation Status)
// ==========================================
// received -> allocated 只翻转一次；
// 唯一的回退路径: 所属批次在开工前被删除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Received,  // 已收货，可用
    Allocated, // 已被批次或洗水占用
}

impl AllocationStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AllocationStatus::Received => "received",
            AllocationStatus::Allocated => "allocated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "received" => Some(AllocationStatus::Received),
            "allocated" => Some(AllocationStatus::Allocated),
            _ => None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, AllocationStatus::Received)
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 工序状态 (Stage Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    In,     // 进入工序
    Closed, // 工序完成
}

impl StageStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            StageStatus::In => "in",
            StageStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "in" => Some(StageStatus::In),
            "closed" => Some(StageStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 次品原因 (Defect Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectReason {
    StitchingDefect,
    FabricDefect,
    MeasurementIssue,
    ColorMismatch,
    PhysicalDamage,
    FinishingIssue,
    MissingPart,
    Other,
}

impl DefectReason {
    pub const ALL: [DefectReason; 8] = [
        DefectReason::StitchingDefect,
        DefectReason::FabricDefect,
        DefectReason::MeasurementIssue,
        DefectReason::ColorMismatch,
        DefectReason::PhysicalDamage,
        DefectReason::FinishingIssue,
        DefectReason::MissingPart,
        DefectReason::Other,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DefectReason::StitchingDefect => "stitching_defect",
            DefectReason::FabricDefect => "fabric_defect",
            DefectReason::MeasurementIssue => "measurement_issue",
            DefectReason::ColorMismatch => "color_mismatch",
            DefectReason::PhysicalDamage => "physical_damage",
            DefectReason::FinishingIssue => "finishing_issue",
            DefectReason::MissingPart => "missing_part",
            DefectReason::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|reason| reason.to_db_str() == normalized)
    }

    /// 展示名称
    pub fn label(&self) -> &'static str {
        match self {
            DefectReason::StitchingDefect => "Stitching defect",
            DefectReason::FabricDefect => "Fabric defect",
            DefectReason::MeasurementIssue => "Measurement issue",
            DefectReason::ColorMismatch => "Color mismatch",
            DefectReason::PhysicalDamage => "Physical damage",
            DefectReason::FinishingIssue => "Finishing issue",
            DefectReason::MissingPart => "Missing part",
            DefectReason::Other => "Other",
        }
    }
}

impl fmt::Display for DefectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 洗水来源类型 (Wash Source Kind)
// ==========================================
// 一个洗水批次只能有一种来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WashSourceKind {
    Batch,  // 整批投料
    Bundle, // 单扎投料
}

impl WashSourceKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WashSourceKind::Batch => "batch",
            WashSourceKind::Bundle => "bundle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "batch" => Some(WashSourceKind::Batch),
            "bundle" => Some(WashSourceKind::Bundle),
            _ => None,
        }
    }
}

impl fmt::Display for WashSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}
