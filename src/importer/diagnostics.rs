// ==========================================
// 表格导入引擎 - 行级诊断
// ==========================================
// 职责: 结构化诊断 (行, 列, 值, 原因) + 有界摘要
// 红线: 行号一律为表格绝对行号（1 起始）
// ==========================================

use crate::config::ImportSettings;
use serde::Serialize;
use std::fmt;

/// 诊断原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticReason {
    /// 外键源列为空
    EmptyReference { target: String },

    /// 外键标签在外表中不存在
    ReferenceNotFound {
        table: String,
        label_column: String,
        target: String,
    },

    /// 文本长度超过列上限
    TooLong { limit: usize, length: usize },
}

/// 单条行级诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    pub sheet_row: usize,
    pub column: String,
    pub value: Option<String>,
    pub reason: DiagnosticReason,
}

impl RowDiagnostic {
    /// 按预览规则渲染（长值截断）
    pub fn render(&self, settings: &ImportSettings) -> String {
        let value = self.value.as_deref().map(|v| settings.preview(v));
        self.render_with(value.as_deref())
    }

    fn render_with(&self, value: Option<&str>) -> String {
        let value = value.unwrap_or("");
        match &self.reason {
            DiagnosticReason::EmptyReference { target } => format!(
                "第 {} 行: 列 '{}' 为空，无法填充 {}",
                self.sheet_row, self.column, target
            ),
            DiagnosticReason::ReferenceNotFound {
                table,
                label_column,
                target,
            } => format!(
                "第 {} 行: 值 '{}' 在 {}.{} 中不存在，无法填充 {}",
                self.sheet_row, value, table, label_column, target
            ),
            DiagnosticReason::TooLong { limit, length } => format!(
                "第 {} 行 列 '{}': {} > {} 个字符 (值: {})",
                self.sheet_row, self.column, length, limit, value
            ),
        }
    }
}

impl fmt::Display for RowDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_with(self.value.as_deref()))
    }
}

/// 有界摘要：前 N 条 + 剩余计数
pub fn digest(diagnostics: &[RowDiagnostic], settings: &ImportSettings) -> Vec<String> {
    let shown = diagnostics.len().min(settings.diagnostic_limit);
    let mut lines: Vec<String> = diagnostics[..shown]
        .iter()
        .map(|d| d.render(settings))
        .collect();
    let remaining = diagnostics.len() - shown;
    if remaining > 0 {
        lines.push(format!("...还有 {} 处", remaining));
    }
    lines
}
