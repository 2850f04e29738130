// ==========================================
// 表格导入引擎 - 领域类型定义
// ==========================================
// 职责: 单元格标准值 / 列类型类别 / 写入操作类型
// 红线: 所有来源（表格、默认值、外键标签）统一落到 CellValue
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日期文本格式（写库 / 诊断 / 长度校验统一使用）
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 日期时间文本格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// 单元格标准值 (Normalized Cell Value)
// ==========================================
// 空 / NaN / 错误单元格一律为 Null
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// 文本表示（Null → None）
    ///
    /// 整数值的浮点数不带小数部分（1.0 → "1"），
    /// 保证同一数值无论来自表格还是数据库都得到相同文本。
    pub fn to_display(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(format_float(*f)),
            CellValue::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            CellValue::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            CellValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
        }
    }

    /// 文本表示的字符数（用于列长度校验）
    pub fn char_len(&self) -> usize {
        self.to_display().map(|s| s.chars().count()).unwrap_or(0)
    }

    /// 去重键：数值按文本表示比较（1 与 1.0 相同），空值彼此相同
    pub fn dedup_key(&self) -> ValueKey {
        match self {
            CellValue::Null => ValueKey::Null,
            CellValue::Text(s) => ValueKey::Text(s.clone()),
            CellValue::Int(_) | CellValue::Float(_) => {
                ValueKey::Number(self.to_display().unwrap_or_default())
            }
            CellValue::Bool(b) => ValueKey::Bool(*b),
            CellValue::Date(d) => ValueKey::Date(*d),
            CellValue::DateTime(dt) => ValueKey::DateTime(*dt),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_display() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "NULL"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            CellValue::Null
        } else {
            CellValue::Float(value)
        }
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// 可哈希的值键（去重用）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Text(String),
    Number(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

// ==========================================
// 列类型类别 (Type Category)
// ==========================================
// 由数据库声明类型文本推断，决定默认值可用的变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Text,
    Numeric,
    Boolean,
    DateTime,
    Other,
}

impl TypeCategory {
    /// 从声明类型推断（VARCHAR(20) / INTEGER / BOOLEAN / TIMESTAMP ...）
    pub fn from_declared_type(declared: &str) -> Self {
        let normalized = declared.to_lowercase();
        if normalized.contains("bool") {
            return TypeCategory::Boolean;
        }
        if normalized.contains("date") || normalized.contains("time") {
            return TypeCategory::DateTime;
        }
        const NUMERIC: [&str; 7] = ["int", "real", "float", "double", "numeric", "decimal", "serial"];
        if NUMERIC.iter().any(|k| normalized.contains(k)) {
            return TypeCategory::Numeric;
        }
        const TEXT: [&str; 4] = ["char", "text", "clob", "string"];
        if TEXT.iter().any(|k| normalized.contains(k)) {
            return TypeCategory::Text;
        }
        TypeCategory::Other
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeCategory::Text => "text",
            TypeCategory::Numeric => "numeric",
            TypeCategory::Boolean => "boolean",
            TypeCategory::DateTime => "date/time",
            TypeCategory::Other => "other",
        };
        write!(f, "{}", name)
    }
}

// ==========================================
// 写入操作 (Operation)
// ==========================================
// 序列化格式: 全大写（与 SQL 关键字一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    #[default]
    Insert,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert => write!(f, "INSERT"),
            Operation::Update => write!(f, "UPDATE"),
        }
    }
}
