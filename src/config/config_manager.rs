// ==========================================
// 成衣批次追踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::intake_config_trait::IntakeConfigReader;
use crate::db::{format_ts, now, open_sqlite_connection};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 默认单次导入行数上限
pub const DEFAULT_IMPORT_MAX_ROWS: usize = 5000;

/// 默认跳过已存在的扎包
pub const DEFAULT_IMPORT_SKIP_EXISTING: bool = true;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, format_ts(&now())],
        )?;

        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON，按键排序）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// IntakeConfigReader Trait 实现
// ==========================================
#[async_trait]
impl IntakeConfigReader for ConfigManager {
    async fn get_import_max_rows(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let value = self
            .get_config_or_default(config_keys::IMPORT_MAX_ROWS, "5000")
            .map_err(|e| e.to_string())?;
        match value.trim().parse::<usize>() {
            Ok(rows) if rows > 0 => Ok(rows),
            _ => {
                tracing::warn!(
                    config_key = config_keys::IMPORT_MAX_ROWS,
                    raw_value = %value,
                    "导入行数上限配置无效，使用默认值"
                );
                Ok(DEFAULT_IMPORT_MAX_ROWS)
            }
        }
    }

    async fn get_import_skip_existing(&self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let value = self
            .get_config_or_default(config_keys::IMPORT_SKIP_EXISTING, "true")
            .map_err(|e| e.to_string())?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Ok(DEFAULT_IMPORT_SKIP_EXISTING),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 批量导入
    pub const IMPORT_MAX_ROWS: &str = "import_max_rows";
    pub const IMPORT_SKIP_EXISTING: &str = "import_skip_existing";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = manager();
        assert_eq!(config.get_import_max_rows().await.unwrap(), 5000);
        assert!(config.get_import_skip_existing().await.unwrap());
        assert_eq!(config.get_global_config_value("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overrides_and_snapshot() {
        let config = manager();
        config
            .set_global_config_value(config_keys::IMPORT_MAX_ROWS, "20")
            .unwrap();
        config
            .set_global_config_value(config_keys::IMPORT_SKIP_EXISTING, "false")
            .unwrap();
        config
            .set_global_config_value(config_keys::IMPORT_MAX_ROWS, "30")
            .unwrap();

        assert_eq!(config.get_import_max_rows().await.unwrap(), 30);
        assert!(!config.get_import_skip_existing().await.unwrap());

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["import_max_rows"], "30");
    }

    #[tokio::test]
    async fn test_invalid_value_falls_back() {
        let config = manager();
        config
            .set_global_config_value(config_keys::IMPORT_MAX_ROWS, "abc")
            .unwrap();
        assert_eq!(config.get_import_max_rows().await.unwrap(), 5000);
        assert!(config.set_global_config_value("  ", "x").is_err());
    }
}
