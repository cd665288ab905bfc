// ==========================================
// 成衣批次追踪系统 - 收货导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// IntakeConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait IntakeConfigReader: Send + Sync {
    /// 单个文件允许的最大数据行数
    ///
    /// # 默认值
    /// - 5000
    async fn get_import_max_rows(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 已存在的扎包（条码或 mpo/marker/bundle_no 重复）是否跳过
    ///
    /// # 返回
    /// - true: 跳过并记入问题列表
    /// - false: 整个文件导入失败
    ///
    /// # 默认值
    /// - true
    async fn get_import_skip_existing(&self) -> Result<bool, Box<dyn Error + Send + Sync>>;
}
