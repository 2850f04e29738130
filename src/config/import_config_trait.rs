// ==========================================
// 表格导入引擎 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义记录构建器所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不依赖存储介质
// ==========================================

use crate::config::config_manager::ConfigManager;
use crate::config::import_settings::ImportSettings;

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 实现者: ImportSettings（固定值）/ ConfigManager（分层加载结果）
pub trait EngineConfigReader {
    /// 当前完整设置快照（单次构建内保持不变）
    fn snapshot(&self) -> ImportSettings;
}

impl EngineConfigReader for ImportSettings {
    fn snapshot(&self) -> ImportSettings {
        self.clone()
    }
}

impl EngineConfigReader for ConfigManager {
    fn snapshot(&self) -> ImportSettings {
        self.settings().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit_of(reader: &dyn EngineConfigReader) -> usize {
        reader.snapshot().diagnostic_limit
    }

    #[test]
    fn test_manager_and_settings_agree() {
        let mut manager = ConfigManager::new();
        manager
            .apply_override(crate::config::config_keys::DIAGNOSTIC_LIMIT, "3")
            .unwrap();

        assert_eq!(limit_of(&manager), 3);
        assert_eq!(limit_of(&ImportSettings::default()), 5);
        assert_eq!(manager.snapshot().diagnostic_limit, 3);
    }
}
