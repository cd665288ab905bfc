// ==========================================
// 成衣批次追踪系统 - 成衣条码 → 扎包条码
// ==========================================
// 外部约定（固定模板，不做其他推断）:
//   扎包条码 = "8220" + 成衣条码前 12 位 + "001"
// ==========================================

use crate::engine::error::{EngineError, EngineResult};

pub const BUNDLE_BARCODE_PREFIX: &str = "8220";
pub const BUNDLE_BARCODE_SUFFIX: &str = "001";
/// 成衣条码中嵌入扎包信息的位数
pub const GARMENT_KEY_LEN: usize = 12;

/// 由成衣条码推导其所属扎包条码
pub fn derive_bundle_barcode(garment_barcode: &str) -> EngineResult<String> {
    let garment = garment_barcode.trim();
    let key: String = garment.chars().take(GARMENT_KEY_LEN).collect();
    if key.chars().count() < GARMENT_KEY_LEN {
        return Err(EngineError::validation(format!(
            "成衣条码 {} 长度不足 {} 位",
            garment, GARMENT_KEY_LEN
        )));
    }
    Ok(format!(
        "{}{}{}",
        BUNDLE_BARCODE_PREFIX, key, BUNDLE_BARCODE_SUFFIX
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_uses_first_twelve_chars() {
        assert_eq!(
            derive_bundle_barcode("123456789012XYZ").unwrap(),
            "8220123456789012001"
        );
        assert_eq!(
            derive_bundle_barcode("ABCDEFGHIJKL").unwrap(),
            "8220ABCDEFGHIJKL001"
        );
    }

    #[test]
    fn test_short_barcode_is_rejected() {
        assert!(matches!(
            derive_bundle_barcode("12345678901"),
            Err(EngineError::Validation(_))
        ));
        assert!(derive_bundle_barcode("").is_err());
    }
}
