// ==========================================
// 成衣批次追踪系统 - 字段映射器实现
// ==========================================
// 职责: 原始行 → 收货入参 (NewBundle)，表头大小写不敏感
// ==========================================

use crate::domain::inventory::NewBundle;
use crate::engine::intake::IntakeRules;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use std::collections::HashMap;

pub struct FieldMapper;

impl FieldMapper {
    /// 映射一行
    ///
    /// # 参数
    /// - row: 原始行（表头 → 值）
    /// - row_number: 数据行号（从 1 开始，用于问题报告）
    ///
    /// # 返回
    /// - Err(MissingField): 必填字段为空
    /// - Err(TypeConversionError): bundle_no / quantity 不是整数
    /// - Err(FieldValidationError): 收货规则不通过（如负数）
    pub fn map_to_bundle(&self, row: &RawRow, row_number: usize) -> ImportResult<NewBundle> {
        let row = Self::normalize_headers(row);

        let mapped = NewBundle {
            mpo: Self::get_required(&row, "mpo", row_number)?,
            buyer: Self::get_required(&row, "buyer", row_number)?,
            style: Self::get_required(&row, "style", row_number)?,
            marker: Self::get_required(&row, "marker", row_number)?,
            bundle_no: Self::parse_i64(&row, "bundle_no", row_number)?,
            bundle_barcode: Self::get_required(&row, "bundle_barcode", row_number)?,
            size: Self::get_required(&row, "size", row_number)?,
            shade: Self::get_required(&row, "shade", row_number)?,
            color: Self::get_required(&row, "color", row_number)?,
            quantity: Self::parse_i64(&row, "quantity", row_number)?,
        };

        IntakeRules::normalize_bundle(&mapped).map_err(|e| ImportError::FieldValidationError {
            row: row_number,
            message: e.to_string(),
        })
    }

    fn normalize_headers(row: &RawRow) -> HashMap<String, &str> {
        row.iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.as_str()))
            .collect()
    }

    fn get_required(
        row: &HashMap<String, &str>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<String> {
        match row.get(key).map(|v| v.trim()) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(ImportError::MissingField {
                row: row_number,
                field: key.to_string(),
            }),
        }
    }

    /// Excel 数值单元格会带 ".0"，整数值的小数形式也接受
    fn parse_i64(row: &HashMap<String, &str>, key: &str, row_number: usize) -> ImportResult<i64> {
        let value = Self::get_required(row, key, row_number)?;
        if let Ok(parsed) = value.parse::<i64>() {
            return Ok(parsed);
        }
        match value.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err(ImportError::TypeConversionError {
                row: row_number,
                field: key.to_string(),
                message: format!("无法解析为整数: {}", value),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_row() -> Vec<(&'static str, &'static str)> {
        vec![
            ("MPO", "MPO1"),
            ("Buyer", "ACME"),
            ("Style", "ST-1"),
            ("Marker", "MK1"),
            ("Bundle_No", "3.0"),
            ("bundle_barcode", "822000000001001"),
            ("size", "M"),
            ("shade", "A"),
            ("color", "Red"),
            ("quantity", "12"),
        ]
    }

    #[test]
    fn test_case_insensitive_headers() {
        let bundle = FieldMapper.map_to_bundle(&row(&full_row()), 1).unwrap();
        assert_eq!(bundle.mpo, "MPO1");
        assert_eq!(bundle.bundle_no, 3);
        assert_eq!(bundle.quantity, 12);
    }

    #[test]
    fn test_missing_and_bad_fields() {
        let mut pairs = full_row();
        pairs.retain(|(k, _)| *k != "color");
        assert!(matches!(
            FieldMapper.map_to_bundle(&row(&pairs), 4),
            Err(ImportError::MissingField { row: 4, .. })
        ));

        let mut pairs = full_row();
        pairs[9] = ("quantity", "twelve");
        assert!(matches!(
            FieldMapper.map_to_bundle(&row(&pairs), 2),
            Err(ImportError::TypeConversionError { .. })
        ));

        let mut pairs = full_row();
        pairs[9] = ("quantity", "-1");
        assert!(matches!(
            FieldMapper.map_to_bundle(&row(&pairs), 2),
            Err(ImportError::FieldValidationError { .. })
        ));
    }
}
