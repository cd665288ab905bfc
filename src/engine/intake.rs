// ==========================================
// 成衣批次追踪系统 - 收货入参规则
// ==========================================
// 职责: 收货/查询入参的必填与取值校验（单条收货与批量导入共用）
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::inventory::NewBundle;
use crate::engine::error::{EngineError, EngineResult};

pub struct IntakeRules;

impl IntakeRules {
    /// 必填文本字段：去首尾空白后不能为空
    pub fn required(field: &str, raw: &str) -> EngineResult<String> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(EngineError::validation(format!("{} 不能为空", field)));
        }
        Ok(value.to_string())
    }

    /// 校验并规整收货入参
    pub fn normalize_bundle(bundle: &NewBundle) -> EngineResult<NewBundle> {
        if bundle.bundle_no < 0 {
            return Err(EngineError::validation(format!(
                "bundle_no 不能为负数: {}",
                bundle.bundle_no
            )));
        }
        if bundle.quantity < 0 {
            return Err(EngineError::validation(format!(
                "quantity 不能为负数: {}",
                bundle.quantity
            )));
        }

        Ok(NewBundle {
            mpo: Self::required("mpo", &bundle.mpo)?,
            buyer: Self::required("buyer", &bundle.buyer)?,
            style: Self::required("style", &bundle.style)?,
            marker: Self::required("marker", &bundle.marker)?,
            bundle_no: bundle.bundle_no,
            bundle_barcode: Self::required("bundle_barcode", &bundle.bundle_barcode)?,
            size: Self::required("size", &bundle.size)?,
            shade: Self::required("shade", &bundle.shade)?,
            color: Self::required("color", &bundle.color)?,
            quantity: bundle.quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewBundle {
        NewBundle {
            mpo: " MPO1 ".to_string(),
            buyer: "ACME".to_string(),
            style: "ST-01".to_string(),
            marker: "MK1".to_string(),
            bundle_no: 3,
            bundle_barcode: "8220MPO1MK1003".to_string(),
            size: "M".to_string(),
            shade: "A".to_string(),
            color: "Red".to_string(),
            quantity: 20,
        }
    }

    #[test]
    fn test_normalize_trims_text_fields() {
        let normalized = IntakeRules::normalize_bundle(&sample()).unwrap();
        assert_eq!(normalized.mpo, "MPO1");
    }

    #[test]
    fn test_missing_or_negative_values() {
        let mut blank = sample();
        blank.color = "  ".to_string();
        let err = IntakeRules::normalize_bundle(&blank).unwrap_err();
        assert!(err.to_string().contains("color"));

        let mut negative = sample();
        negative.quantity = -1;
        assert!(IntakeRules::normalize_bundle(&negative).is_err());
    }
}
