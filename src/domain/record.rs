// ==========================================
// 表格导入引擎 - 转换结果模型
// ==========================================
// 职责: 待写入记录 (TransformedRecord) + 转换报告 (TransformationReport)
// 用途: 记录构建器产出，持久化网关消费一次后不再保留
// ==========================================

use crate::domain::types::CellValue;
use serde::Serialize;

// ==========================================
// TransformedRecord - 一条待写入记录
// ==========================================
// 列顺序 = 映射 → 默认值 → 外键 的写入顺序
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TransformedRecord {
    /// 来源表格行号（1 起始，诊断用，不写库）
    pub sheet_row: usize,
    pub values: Vec<(String, CellValue)>,
}

impl TransformedRecord {
    pub fn new(sheet_row: usize) -> Self {
        Self {
            sheet_row,
            values: Vec::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// 设置列值（已存在则覆盖，保持原位置）
    pub fn set(&mut self, column: &str, value: CellValue) {
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column.to_string(), value)),
        }
    }

    /// 仅在列不存在时设置
    pub fn set_if_absent(&mut self, column: &str, value: CellValue) {
        if !self.contains(column) {
            self.values.push((column.to_string(), value));
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        let idx = self.values.iter().position(|(c, _)| c == column)?;
        Some(self.values.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }
}

// ==========================================
// TransformationReport - 转换报告
// ==========================================
// 成功构建时诊断列表为空；诊断只出现在已中止的失败路径中
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TransformationReport {
    pub build_id: String,
    pub target_table: String,
    /// 实际使用的表头行（可能经过一次自动提升）
    pub header_row: usize,
    pub header_promoted: bool,
    pub rows_considered: usize,
    pub rows_emitted: usize,
    pub duplicates_removed: usize,
    pub unresolved_fk_rows: Vec<String>,
    pub length_violations: Vec<String>,
}

impl TransformationReport {
    pub fn has_diagnostics(&self) -> bool {
        !self.unresolved_fk_rows.is_empty() || !self.length_violations.is_empty()
    }
}
