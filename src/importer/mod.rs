// ==========================================
// 成衣批次追踪系统 - 导入层
// ==========================================
// 职责: 从 CSV / Excel 文件批量收货
// ==========================================

pub mod bundle_importer;
pub mod error;
pub mod field_mapper;
pub mod file_parser;

pub use bundle_importer::{BundleImportResult, BundleImporter, BundleImporterImpl, ImportIssue};
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRow, UniversalFileParser};
