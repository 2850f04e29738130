// ==========================================
// 表格导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、逐层覆写
// 层次: 内置默认值 → JSON 设置文件 → config_kv 表（scope_id='global'）
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::db::table_exists;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    FileReadError { path: String, message: String },

    #[error("配置文件格式错误 ({path}): {message}")]
    ParseError { path: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    #[error("配置读取失败: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

// ==========================================
// 配置键定义（config_kv 表）
// ==========================================
pub mod config_keys {
    pub const DIAGNOSTIC_LIMIT: &str = "import.diagnostic_limit";
    pub const VALUE_PREVIEW_CHARS: &str = "import.value_preview_chars";
    pub const HEADER_AUTO_PROMOTION: &str = "import.header_auto_promotion";
    pub const PLACEHOLDER_PREFIXES: &str = "import.placeholder_prefixes"; // 逗号分隔
    pub const SYNTHETIC_COLUMN_PREFIX: &str = "import.synthetic_column_prefix";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    settings: ImportSettings,
}

impl ConfigManager {
    /// 使用内置默认值创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 叠加 JSON 设置文件（文件中缺省的键取内置默认值）
    pub fn with_json_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
        self.settings = serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
        info!(path = %path_str, "已加载导入设置文件");
        Ok(self)
    }

    /// 叠加 config_kv 表中的覆写（表不存在时跳过，只读不建表）
    pub fn with_connection_overrides(mut self, conn: &Connection) -> Result<Self, ConfigError> {
        if !table_exists(conn, "config_kv")? {
            debug!("config_kv 表不存在，跳过数据库覆写");
            return Ok(self);
        }

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' AND key LIKE 'import.%' ORDER BY key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            self.apply_override(&key, &value)?;
        }
        Ok(self)
    }

    /// 应用单个键值覆写（未知键忽略）
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::ConfigValueError {
            key: key.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        };
        let trimmed = value.trim();

        match key {
            config_keys::DIAGNOSTIC_LIMIT => {
                self.settings.diagnostic_limit = trimmed
                    .parse()
                    .map_err(|_| invalid("期望非负整数"))?;
            }
            config_keys::VALUE_PREVIEW_CHARS => {
                self.settings.value_preview_chars = trimmed
                    .parse()
                    .map_err(|_| invalid("期望非负整数"))?;
            }
            config_keys::HEADER_AUTO_PROMOTION => {
                self.settings.header_auto_promotion = match trimmed.to_lowercase().as_str() {
                    "1" | "true" | "y" | "yes" => true,
                    "0" | "false" | "n" | "no" => false,
                    _ => return Err(invalid("期望布尔值")),
                };
            }
            config_keys::PLACEHOLDER_PREFIXES => {
                self.settings.placeholder_prefixes = trimmed
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
            }
            config_keys::SYNTHETIC_COLUMN_PREFIX => {
                if trimmed.is_empty() {
                    return Err(invalid("合成列名前缀不能为空"));
                }
                self.settings.synthetic_column_prefix = trimmed.to_string();
            }
            _ => {
                debug!(key = %key, "忽略未知配置键");
                return Ok(());
            }
        }
        debug!(key = %key, value = %trimmed, "应用配置覆写");
        Ok(())
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn into_settings(self) -> ImportSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn conn_with_config_kv() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE config_kv (
                scope_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (scope_id, key)
            );
            INSERT INTO config_kv VALUES ('global', 'import.diagnostic_limit', '2');
            INSERT INTO config_kv VALUES ('global', 'import.header_auto_promotion', 'false');
            INSERT INTO config_kv VALUES ('machine', 'import.value_preview_chars', '10');
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_defaults() {
        let manager = ConfigManager::new();
        assert_eq!(manager.settings(), &ImportSettings::default());
    }

    #[test]
    fn test_connection_overrides_global_scope_only() {
        let conn = conn_with_config_kv();
        let settings = ConfigManager::new()
            .with_connection_overrides(&conn)
            .unwrap()
            .into_settings();

        assert_eq!(settings.diagnostic_limit, 2);
        assert!(!settings.header_auto_promotion);
        assert_eq!(settings.value_preview_chars, 40);
    }

    #[test]
    fn test_missing_config_table_is_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        let settings = ConfigManager::new()
            .with_connection_overrides(&conn)
            .unwrap()
            .into_settings();

        assert_eq!(settings, ImportSettings::default());
    }

    #[test]
    fn test_json_file_then_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"value_preview_chars": 12, "placeholder_prefixes": ["Sem nome"]}}"#).unwrap();

        let mut manager = ConfigManager::new().with_json_file(file.path()).unwrap();
        manager
            .apply_override(config_keys::DIAGNOSTIC_LIMIT, "9")
            .unwrap();
        let settings = manager.into_settings();

        assert_eq!(settings.value_preview_chars, 12);
        assert_eq!(settings.placeholder_prefixes, vec!["Sem nome".to_string()]);
        assert_eq!(settings.diagnostic_limit, 9);
    }

    #[test]
    fn test_invalid_override_value() {
        let mut manager = ConfigManager::new();
        let result = manager.apply_override(config_keys::DIAGNOSTIC_LIMIT, "many");
        assert!(matches!(result, Err(ConfigError::ConfigValueError { .. })));
    }
}
