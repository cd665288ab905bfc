// ==========================================
// 成衣批次追踪系统 - 扎包批量收货导入器
// ==========================================
// 职责: 整合导入流程，从文件到 received_bundle
// 流程: 解析 → 行数上限 → 映射 → 文件内查重 → 单事务收货
// 红线: 有效行要么全部落库（已存在的按配置跳过），要么全部不落库
// ==========================================

use crate::api::InventoryApi;
use crate::config::config_keys;
use crate::config::IntakeConfigReader;
use crate::domain::inventory::NewBundle;
use crate::domain::types::Actor;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{FileParser, UniversalFileParser};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 行级问题（该行未导入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportIssue {
    /// 数据行号（从 1 开始，不含表头）
    pub row: usize,
    pub bundle_barcode: Option<String>,
    pub message: String,
}

/// 单个文件的导入结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleImportResult {
    pub import_id: String,
    pub file_name: String,
    pub total_rows: usize,
    pub imported: usize,
    pub issues: Vec<ImportIssue>,
    pub elapsed_ms: u64,
}

// ==========================================
// BundleImporter Trait
// ==========================================
#[async_trait]
pub trait BundleImporter: Send + Sync {
    /// 导入单个文件（.csv / .xlsx / .xls）
    async fn import_file(&self, file_path: &Path, actor: &Actor) -> ImportResult<BundleImportResult>;

    /// 并发导入多个文件，每个文件独立成败
    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        actor: &Actor,
    ) -> Vec<Result<BundleImportResult, String>>;
}

// ==========================================
// BundleImporterImpl
// ==========================================
pub struct BundleImporterImpl<C>
where
    C: IntakeConfigReader,
{
    inventory_api: Arc<InventoryApi>,
    config: C,
    file_parser: Box<dyn FileParser>,
    field_mapper: FieldMapper,
}

impl<C> BundleImporterImpl<C>
where
    C: IntakeConfigReader,
{
    pub fn new(inventory_api: Arc<InventoryApi>, config: C) -> Self {
        Self::with_parser(inventory_api, config, Box::new(UniversalFileParser))
    }

    pub fn with_parser(
        inventory_api: Arc<InventoryApi>,
        config: C,
        file_parser: Box<dyn FileParser>,
    ) -> Self {
        Self {
            inventory_api,
            config,
            file_parser,
            field_mapper: FieldMapper,
        }
    }

    /// 映射全部行；返回 (有效行号, 有效入参) 与问题列表
    fn map_rows(
        &self,
        raw_rows: &[crate::importer::file_parser::RawRow],
    ) -> (Vec<(usize, NewBundle)>, Vec<ImportIssue>) {
        let mut valid = Vec::with_capacity(raw_rows.len());
        let mut issues = Vec::new();
        let mut seen_barcodes = HashSet::new();
        let mut seen_markers = HashSet::new();

        for (idx, raw) in raw_rows.iter().enumerate() {
            let row_number = idx + 1;
            let bundle = match self.field_mapper.map_to_bundle(raw, row_number) {
                Ok(bundle) => bundle,
                Err(e) => {
                    issues.push(ImportIssue {
                        row: row_number,
                        bundle_barcode: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let marker_key = (bundle.mpo.clone(), bundle.marker.clone(), bundle.bundle_no);
            if seen_barcodes.contains(&bundle.bundle_barcode) || seen_markers.contains(&marker_key) {
                issues.push(ImportIssue {
                    row: row_number,
                    bundle_barcode: Some(bundle.bundle_barcode.clone()),
                    message: "文件内重复".to_string(),
                });
                continue;
            }
            seen_barcodes.insert(bundle.bundle_barcode.clone());
            seen_markers.insert(marker_key);
            valid.push((row_number, bundle));
        }

        (valid, issues)
    }
}

#[async_trait]
impl<C> BundleImporter for BundleImporterImpl<C>
where
    C: IntakeConfigReader + Send + Sync,
{
    #[instrument(skip(self, file_path, actor), fields(import_id, actor = %actor))]
    async fn import_file(&self, file_path: &Path, actor: &Actor) -> ImportResult<BundleImportResult> {
        let start_time = Instant::now();
        let import_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("import_id", import_id.as_str());

        let file_name = file_path.display().to_string();
        info!(file = %file_name, "开始导入扎包");

        // === 步骤 1: 解析文件 ===
        let raw_rows = self.file_parser.parse_to_raw_records(file_path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        let total_rows = raw_rows.len();

        // === 步骤 2: 行数上限 ===
        let max_rows = self
            .config
            .get_import_max_rows()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: config_keys::IMPORT_MAX_ROWS.to_string(),
                message: e.to_string(),
            })?;
        if total_rows > max_rows {
            warn!(total_rows, max_rows, "文件行数超过上限");
            return Err(ImportError::TooManyRows {
                rows: total_rows,
                max_rows,
            });
        }
        let skip_existing = self
            .config
            .get_import_skip_existing()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: config_keys::IMPORT_SKIP_EXISTING.to_string(),
                message: e.to_string(),
            })?;

        // === 步骤 3: 映射 + 文件内查重 ===
        let (valid, mut issues) = self.map_rows(&raw_rows);
        debug!(valid = valid.len(), issues = issues.len(), "字段映射完成");

        // === 步骤 4: 单事务收货 ===
        let (row_numbers, bundles): (Vec<usize>, Vec<NewBundle>) = valid.into_iter().unzip();
        let summary = self
            .inventory_api
            .receive_bundles(&bundles, actor, skip_existing)?;

        for skipped in summary.skipped {
            issues.push(ImportIssue {
                row: row_numbers.get(skipped.index).copied().unwrap_or(0),
                bundle_barcode: Some(skipped.bundle_barcode),
                message: skipped.reason,
            });
        }
        issues.sort_by_key(|issue| issue.row);

        let result = BundleImportResult {
            import_id,
            file_name,
            total_rows,
            imported: summary.received.len(),
            issues,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            total_rows = result.total_rows,
            imported = result.imported,
            issues = result.issues.len(),
            elapsed_ms = result.elapsed_ms,
            "扎包导入完成"
        );
        Ok(result)
    }

    #[instrument(skip(self, file_paths, actor), fields(files = file_paths.len()))]
    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        actor: &Actor,
    ) -> Vec<Result<BundleImportResult, String>> {
        let import_tasks = file_paths.iter().map(|path| async move {
            let path_str = path.display().to_string();
            match self.import_file(path, actor).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    error!(file = %path_str, error = %e, "文件导入失败");
                    Err(format!("文件 {} 导入失败: {}", path_str, e))
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );
        results
    }
}
