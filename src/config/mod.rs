// ==========================================
// 表格导入引擎 - 配置层
// ==========================================
// 职责: 导入设置管理，支持多级覆写
// 存储: 内置默认值 / JSON 文件 / config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigError, ConfigManager};
pub use import_config_trait::EngineConfigReader;
pub use import_settings::ImportSettings;
