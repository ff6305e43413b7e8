// ==========================================
// 专家评审阶段管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope), 缺省值内置
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 全局配置作用域
const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(RepositoryError::connection)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值 (upsert)
    pub fn set_global(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    /// 所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map(params![GLOBAL_SCOPE], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// 读取正整数配置, 缺失或非法时回退默认值
    fn get_u32_or(&self, key: &str, default: u32) -> RepositoryResult<u32> {
        let value = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match value.trim().parse::<u32>() {
            Ok(v) if v > 0 => Ok(v),
            _ => {
                tracing::warn!(key, value = %value, default, "配置值非法, 使用默认值");
                Ok(default)
            }
        }
    }

    // ==========================================
    // 业务配置
    // ==========================================

    /// 阶段编号探测上限
    pub fn get_phase_code_probe_limit(&self) -> RepositoryResult<u32> {
        self.get_u32_or(config_keys::PHASE_CODE_PROBE_LIMIT, defaults::PHASE_CODE_PROBE_LIMIT)
    }

    /// 列表默认条数
    pub fn get_list_default_limit(&self) -> RepositoryResult<u32> {
        self.get_u32_or(config_keys::LIST_DEFAULT_LIMIT, defaults::LIST_DEFAULT_LIMIT)
    }

    /// 列表最大条数
    pub fn get_list_max_limit(&self) -> RepositoryResult<u32> {
        self.get_u32_or(config_keys::LIST_MAX_LIMIT, defaults::LIST_MAX_LIMIT)
    }

    /// 解析分页参数: 缺省取默认值, 超过上限截断
    pub fn resolve_page(&self, limit: Option<u32>, offset: Option<u32>) -> RepositoryResult<(u32, u32)> {
        let max = self.get_list_max_limit()?;
        let limit = match limit {
            Some(0) | None => self.get_list_default_limit()?,
            Some(v) => v,
        };
        Ok((limit.min(max), offset.unwrap_or(0)))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 阶段编号
    pub const PHASE_CODE_PROBE_LIMIT: &str = "phase_code_probe_limit";

    // 分页
    pub const LIST_DEFAULT_LIMIT: &str = "list_default_limit";
    pub const LIST_MAX_LIMIT: &str = "list_max_limit";
}

/// 内置默认值
pub mod defaults {
    pub const PHASE_CODE_PROBE_LIMIT: u32 = 1000;
    pub const LIST_DEFAULT_LIMIT: u32 = 100;
    pub const LIST_MAX_LIMIT: u32 = 500;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults() {
        let config = manager();
        assert_eq!(config.get_phase_code_probe_limit().unwrap(), 1000);
        assert_eq!(config.resolve_page(None, None).unwrap(), (100, 0));
    }

    #[test]
    fn test_override_and_clamp() {
        let config = manager();
        config.set_global(config_keys::LIST_MAX_LIMIT, "50").unwrap();
        config.set_global(config_keys::LIST_DEFAULT_LIMIT, "20").unwrap();
        assert_eq!(config.resolve_page(Some(80), Some(5)).unwrap(), (50, 5));
        assert_eq!(config.resolve_page(None, None).unwrap(), (20, 0));
        assert_eq!(config.get_config_snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let config = manager();
        config.set_global(config_keys::PHASE_CODE_PROBE_LIMIT, "lots").unwrap();
        assert_eq!(config.get_phase_code_probe_limit().unwrap(), 1000);
        config.set_global(config_keys::PHASE_CODE_PROBE_LIMIT, "5").unwrap();
        assert_eq!(config.get_phase_code_probe_limit().unwrap(), 5);
    }
}
