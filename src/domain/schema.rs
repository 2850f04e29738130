// ==========================================
// 表格导入引擎 - 目标表结构模型
// ==========================================
// 职责: 描述目标表的列（名称/类型类别/可空/主键/最大长度）
// 生命周期: 每次选择目标表时由结构探查生成一次，之后只读
// ==========================================

use crate::domain::types::TypeCategory;
use serde::{Deserialize, Serialize};

/// 目标表列信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub category: TypeCategory,
    pub nullable: bool,
    pub primary_key: bool,
    pub max_length: Option<usize>,
}

impl ColumnInfo {
    /// 由声明类型构造（类型类别与最大长度自动推断）
    pub fn from_declared(name: &str, declared_type: &str, nullable: bool, primary_key: bool) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            category: TypeCategory::from_declared_type(declared_type),
            nullable,
            primary_key,
            max_length: parse_max_length(declared_type),
        }
    }

    /// 必填列：不可空，且不是自动生成的主键
    pub fn is_required(&self, autogenerate_pk: bool) -> bool {
        !self.nullable && !(self.primary_key && autogenerate_pk)
    }
}

/// 从 `VARCHAR(20)` / `CHARACTER VARYING(5)` 类声明中解析最大长度
///
/// NUMERIC(10,2) 这类精度声明不视为长度限制。
pub fn parse_max_length(declared_type: &str) -> Option<usize> {
    let lower = declared_type.to_lowercase();
    if !(lower.contains("char") || lower.contains("text") || lower.contains("string")) {
        return None;
    }
    let open = lower.find('(')?;
    let close = lower[open..].find(')')? + open;
    lower[open + 1..close].trim().parse::<usize>().ok()
}

/// 目标表结构（不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(table: &str, columns: Vec<ColumnInfo>) -> Self {
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// 存在长度限制的列
    pub fn length_limits(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns
            .iter()
            .filter_map(|c| c.max_length.map(|len| (c.name.as_str(), len)))
    }
}
