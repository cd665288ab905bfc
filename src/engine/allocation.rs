// ==========================================
// 成衣批次追踪系统 - 扎包占用规则
// ==========================================
// 职责: 组批校验、扎包/批次可删除判定、自由扎包查询判定
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::inventory::ReceivedBundle;
use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashSet;

/// 组批键: (mpo, size, color)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchKey {
    pub mpo: String,
    pub size: String,
    pub color: String,
}

pub struct AllocationRules;

impl AllocationRules {
    /// 组批请求的 id 集合校验（查库前）
    pub fn check_requested_ids(ids: &[i64]) -> EngineResult<()> {
        if ids.is_empty() {
            return Err(EngineError::validation("批次至少需要一个扎包"));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let duplicates: Vec<i64> = ids.iter().copied().filter(|id| !seen.insert(*id)).collect();
        if !duplicates.is_empty() {
            return Err(EngineError::validation(format!(
                "扎包 id 重复: {:?}",
                duplicates
            )));
        }
        Ok(())
    }

    /// 组批候选扎包校验
    ///
    /// # 规则（按顺序）
    /// 1. 每个 id 都能找到扎包
    /// 2. 所有扎包均未被占用
    /// 3. 所有扎包的 (mpo, size, color) 相同
    ///
    /// # 返回
    /// - 共同的组批键
    pub fn check_batch_candidates(
        requested: &[i64],
        found: &[ReceivedBundle],
    ) -> EngineResult<BatchKey> {
        let found_ids: HashSet<i64> = found.iter().map(|b| b.id).collect();
        let missing: Vec<i64> = requested
            .iter()
            .copied()
            .filter(|id| !found_ids.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::validation(format!(
                "扎包不存在: {:?}",
                missing
            )));
        }

        let allocated: Vec<&str> = found
            .iter()
            .filter(|b| !b.status.is_free())
            .map(|b| b.bundle_barcode.as_str())
            .collect();
        if !allocated.is_empty() {
            return Err(EngineError::validation(format!(
                "扎包已被占用: {}",
                allocated.join(", ")
            )));
        }

        let first = found
            .first()
            .ok_or_else(|| EngineError::validation("批次至少需要一个扎包"))?;
        let key = first.grouping_key();
        if let Some(other) = found.iter().find(|b| b.grouping_key() != key) {
            return Err(EngineError::validation(format!(
                "批次内扎包的 mpo/size/color 必须一致: {} 为 {}/{}/{}，{} 为 {}/{}/{}",
                first.bundle_barcode,
                first.mpo,
                first.size,
                first.color,
                other.bundle_barcode,
                other.mpo,
                other.size,
                other.color
            )));
        }

        Ok(BatchKey {
            mpo: first.mpo.clone(),
            size: first.size.clone(),
            color: first.color.clone(),
        })
    }

    /// 按 (mpo, marker, bundle_no) 查询自由扎包：已占用为 Conflict
    pub fn ensure_free(bundle: &ReceivedBundle) -> EngineResult<()> {
        if !bundle.status.is_free() {
            return Err(EngineError::conflict(format!(
                "扎包 {} 已被占用",
                bundle.bundle_barcode
            )));
        }
        Ok(())
    }

    /// 已占用扎包不可删除
    pub fn ensure_bundle_deletable(bundle: &ReceivedBundle) -> EngineResult<()> {
        if !bundle.status.is_free() {
            return Err(EngineError::conflict(format!(
                "扎包 {} 已被占用，不能删除",
                bundle.bundle_barcode
            )));
        }
        Ok(())
    }

    /// 已开工的批次不可删除
    pub fn ensure_batch_deletable(batch_id: i64, production_started: bool) -> EngineResult<()> {
        if production_started {
            return Err(EngineError::conflict(format!(
                "批次 {} 已开工，不能删除",
                batch_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AllocationStatus;
    use chrono::NaiveDate;

    fn bundle(id: i64, size: &str, color: &str, status: AllocationStatus) -> ReceivedBundle {
        ReceivedBundle {
            id,
            mpo: "MPO1".to_string(),
            buyer: "ACME".to_string(),
            style: "ST-01".to_string(),
            marker: "MK1".to_string(),
            bundle_no: id,
            bundle_barcode: format!("BC{}", id),
            size: size.to_string(),
            shade: "A".to_string(),
            color: color.to_string(),
            quantity: 12,
            received_at: NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            received_by: Some("store".to_string()),
            status,
        }
    }

    #[test]
    fn test_requested_ids() {
        assert!(AllocationRules::check_requested_ids(&[]).is_err());
        let err = AllocationRules::check_requested_ids(&[1, 2, 1]).unwrap_err();
        assert!(err.to_string().contains('1'));
        assert!(AllocationRules::check_requested_ids(&[1, 2, 3]).is_ok());
    }

    #[test]
    fn test_candidates_happy_path() {
        let found = vec![
            bundle(1, "M", "Red", AllocationStatus::Received),
            bundle(2, "M", "Red", AllocationStatus::Received),
        ];
        let key = AllocationRules::check_batch_candidates(&[1, 2], &found).unwrap();
        assert_eq!(key.mpo, "MPO1");
        assert_eq!(key.size, "M");
        assert_eq!(key.color, "Red");
    }

    #[test]
    fn test_candidates_missing_allocated_and_mismatched() {
        let found = vec![bundle(1, "M", "Red", AllocationStatus::Received)];
        let err = AllocationRules::check_batch_candidates(&[1, 9], &found).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains('9')));

        let found = vec![
            bundle(1, "M", "Red", AllocationStatus::Received),
            bundle(2, "M", "Red", AllocationStatus::Allocated),
        ];
        let err = AllocationRules::check_batch_candidates(&[1, 2], &found).unwrap_err();
        assert!(err.to_string().contains("BC2"));

        let found = vec![
            bundle(1, "M", "Red", AllocationStatus::Received),
            bundle(2, "L", "Red", AllocationStatus::Received),
        ];
        assert!(matches!(
            AllocationRules::check_batch_candidates(&[1, 2], &found),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_allocated_bundle_guards_are_conflicts() {
        let taken = bundle(1, "M", "Red", AllocationStatus::Allocated);
        assert!(matches!(
            AllocationRules::ensure_free(&taken),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            AllocationRules::ensure_bundle_deletable(&taken),
            Err(EngineError::Conflict(_))
        ));
        assert!(AllocationRules::ensure_batch_deletable(7, false).is_ok());
        assert!(AllocationRules::ensure_batch_deletable(7, true).is_err());
    }
}
