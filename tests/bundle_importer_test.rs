// ==========================================
// 扎包批量导入集成测试
// ==========================================
// 测试范围:
// 1. CSV 导入: 表头大小写不敏感、行级问题报告
// 2. 文件内重复、已存在扎包按配置跳过
// 3. 行数上限
// 4. 批量导入（每个文件独立成败）
// ==========================================


use garment_tracker::api::ApiError;
use garment_tracker::config::config_keys;
use garment_tracker::domain::types::AllocationStatus;
use garment_tracker::importer::{BundleImporter, ImportError};
use std::io::Write;
use tempfile::NamedTempFile;
use test_helpers::*;

const HEADER: &str = "MPO,Buyer,Style,Marker,Bundle_No,Bundle_Barcode,Size,Shade,Color,Quantity";

fn csv_line(n: u32, quantity: &str) -> String {
    format!(
        "MPO1,ACME,ST-100,MK1,{},{},M,A,Red,{}",
        n,
        bundle_barcode(n),
        quantity
    )
}

fn write_csv(lines: &[String]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("创建临时文件失败");
    writeln!(file, "{}", HEADER).expect("写入表头失败");
    for line in lines {
        writeln!(file, "{}", line).expect("写入数据行失败");
    }
    file.flush().expect("刷新文件失败");
    file
}

#[tokio::test]
async fn test_import_file_正常导入与行级问题() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let file = write_csv(&[
        csv_line(1, "10"),
        csv_line(2, "abc"),
        csv_line(3, "12.0"),
        csv_line(1, "10"),
    ]);

    let result = env
        .state
        .bundle_importer
        .import_file(file.path(), &actor("store"))
        .await
        .expect("导入失败");

    assert_eq!(result.total_rows, 4);
    assert_eq!(result.imported, 2);
    assert_eq!(result.issues.len(), 2);
    assert!(!result.import_id.is_empty());

    // 第 2 行数量无法解析
    assert_eq!(result.issues[0].row, 2);
    assert_eq!(result.issues[0].bundle_barcode, None);
    // 第 4 行与第 1 行重复
    assert_eq!(result.issues[1].row, 4);
    assert_eq!(result.issues[1].bundle_barcode, Some(bundle_barcode(1)));

    let bundles = env.state.inventory_api.list_bundles().expect("查询失败");
    assert_eq!(bundles.len(), 2);
    assert!(bundles
        .iter()
        .all(|b| b.status == AllocationStatus::Received && b.received_by.as_deref() == Some("store")));
    assert!(bundles.iter().any(|b| b.quantity == 12));
}

#[tokio::test]
async fn test_import_file_已存在扎包按配置跳过() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.state
        .inventory_api
        .receive_bundle(&new_bundle("MPO1", 2, "M", "Red", 10), &actor("store"))
        .expect("收货失败");
    let file = write_csv(&[csv_line(1, "10"), csv_line(2, "10"), csv_line(3, "10")]);

    // 默认跳过已存在
    let result = env
        .state
        .bundle_importer
        .import_file(file.path(), &actor("store"))
        .await
        .expect("导入失败");
    assert_eq!(result.imported, 2);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].row, 2);
    assert_eq!(result.issues[0].bundle_barcode, Some(bundle_barcode(2)));

    // 关闭跳过后整文件被拒绝，没有任何写入
    env.state
        .config_manager
        .set_global_config_value(config_keys::IMPORT_SKIP_EXISTING, "false")
        .expect("写入配置失败");
    let file = write_csv(&[csv_line(4, "10"), csv_line(1, "10")]);
    let result = env
        .state
        .bundle_importer
        .import_file(file.path(), &actor("store"))
        .await;
    assert!(matches!(
        result,
        Err(ImportError::IntakeRejected(ApiError::ValidationError(_)))
    ));
    assert_eq!(env.state.inventory_api.list_bundles().expect("查询失败").len(), 3);
}

#[tokio::test]
async fn test_import_file_超过行数上限() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.state
        .config_manager
        .set_global_config_value(config_keys::IMPORT_MAX_ROWS, "1")
        .expect("写入配置失败");
    let file = write_csv(&[csv_line(1, "10"), csv_line(2, "10")]);

    let result = env
        .state
        .bundle_importer
        .import_file(file.path(), &actor("store"))
        .await;
    assert!(matches!(
        result,
        Err(ImportError::TooManyRows { rows: 2, max_rows: 1 })
    ));
    assert!(env.state.inventory_api.list_bundles().expect("查询失败").is_empty());
}

#[tokio::test]
async fn test_import_file_文件不存在与格式不支持() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let importer = &env.state.bundle_importer;

    let missing = std::env::temp_dir().join("garment-tracker-missing-file.csv");
    assert!(matches!(
        importer.import_file(&missing, &actor("store")).await,
        Err(ImportError::FileNotFound(_))
    ));

    let txt = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .expect("创建临时文件失败");
    assert!(matches!(
        importer.import_file(txt.path(), &actor("store")).await,
        Err(ImportError::UnsupportedFormat(_))
    ));
}

#[tokio::test]
async fn test_batch_import_每个文件独立成败() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let first = write_csv(&[csv_line(1, "10"), csv_line(2, "10")]);
    let second = write_csv(&[csv_line(3, "10")]);
    let missing = std::env::temp_dir().join("garment-tracker-missing-batch.csv");

    let results = env
        .state
        .bundle_importer
        .batch_import(
            vec![first.path().to_path_buf(), second.path().to_path_buf(), missing],
            &actor("store"),
        )
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().expect("第一个文件应成功").imported, 2);
    assert_eq!(results[1].as_ref().expect("第二个文件应成功").imported, 1);
    assert!(results[2].is_err());
    assert_eq!(env.state.inventory_api.list_bundles().expect("查询失败").len(), 3);
}
