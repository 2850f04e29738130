// ==========================================
// 表格导入引擎 - 导入设置
// ==========================================
// 职责: 引擎可调策略（诊断条数 / 值预览长度 / 表头占位识别）
// 存储: 内置默认值 → JSON 设置文件 → config_kv 表（逐层覆写）
// ==========================================

use serde::{Deserialize, Serialize};

/// 导入设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// 每类诊断最多展示的条数，其余只给出计数
    pub diagnostic_limit: usize,

    /// 诊断中值预览的最大字符数（超出部分以 "..." 截断）
    pub value_preview_chars: usize,

    /// 是否启用表头自动下移（最多一次）
    pub header_auto_promotion: bool,

    /// 视为占位列名的前缀（不区分大小写）
    pub placeholder_prefixes: Vec<String>,

    /// 合成列名前缀（Column_<位置>）
    pub synthetic_column_prefix: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            diagnostic_limit: 5,
            value_preview_chars: 40,
            header_auto_promotion: true,
            placeholder_prefixes: vec![
                "Unnamed:".to_string(),
                "Column_".to_string(),
                "Coluna_".to_string(),
            ],
            synthetic_column_prefix: "Column_".to_string(),
        }
    }
}

impl ImportSettings {
    /// 列名是否"像占位符"：空白，或 占位前缀 + 序号（如 "Unnamed: 3" / "Column_2"）
    pub fn is_placeholder(&self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return true;
        }
        let lower = trimmed.to_lowercase();
        self.placeholder_prefixes
            .iter()
            .chain(std::iter::once(&self.synthetic_column_prefix))
            .filter(|prefix| !prefix.is_empty())
            .filter_map(|prefix| lower.strip_prefix(prefix.to_lowercase().as_str()))
            .any(|rest| {
                let digits = rest.trim();
                !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
            })
    }

    /// 合成列名
    pub fn synthetic_name(&self, position: usize) -> String {
        format!("{}{}", self.synthetic_column_prefix, position)
    }

    /// 截断过长的值预览
    pub fn preview(&self, value: &str) -> String {
        let limit = self.value_preview_chars.max(4);
        if value.chars().count() <= limit {
            value.to_string()
        } else {
            let head: String = value.chars().take(limit - 3).collect();
            format!("{}...", head)
        }
    }
}
