// ==========================================
// 表格导入引擎 - 单元格标准化
// ==========================================
// 职责: 原始单元格 → CellValue / 文本 TRIM / NULL 标准化 / 外键标签键
// 红线: 提取、默认值、外键比较统一走这里，保证同值同表示
// ==========================================

use crate::domain::CellValue;
use calamine::{Data, DataType};
use chrono::NaiveTime;

/// calamine 单元格 → CellValue
///
/// - Empty / Error / NaN → Null
/// - 日期时间去掉 Excel 包装；零点时刻降为纯日期
pub fn normalize_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) => normalize_text(s),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::from(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == NaiveTime::MIN => CellValue::Date(dt.date()),
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Null,
        },
        Data::DurationIso(s) => normalize_text(s),
    }
}

/// 文本单元格标准化：空白 → Null，其余原样保留
///
/// 只判空不改写，保证长度校验看到的是原始文本
pub fn normalize_text(value: &str) -> CellValue {
    if value.trim().is_empty() {
        CellValue::Null
    } else {
        CellValue::Text(value.to_string())
    }
}

/// 外键标签键：文本表示 → TRIM → 大小写折叠；空值返回 None
pub fn lookup_key(value: &CellValue) -> Option<String> {
    let text = value.to_display()?;
    let key = text.trim().to_lowercase();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// 表头文本：TRIM 后的文本表示（空值为空串）
pub fn header_text(value: &CellValue) -> String {
    value
        .to_display()
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_and_error_cells_become_null() {
        assert_eq!(normalize_cell(&Data::Empty), CellValue::Null);
        assert_eq!(normalize_cell(&Data::Error(CellErrorType::NA)), CellValue::Null);
        assert_eq!(normalize_cell(&Data::String("   ".to_string())), CellValue::Null);
        assert_eq!(normalize_cell(&Data::Float(f64::NAN)), CellValue::Null);
    }

    #[test]
    fn test_iso_datetime_is_unwrapped() {
        let midnight = normalize_cell(&Data::DateTimeIso("2024-03-01T00:00:00".to_string()));
        assert_eq!(
            midnight,
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );

        let with_time = normalize_cell(&Data::DateTimeIso("2024-03-01T08:30:00".to_string()));
        assert!(matches!(with_time, CellValue::DateTime(_)));
    }

    #[test]
    fn test_scalar_cells_pass_through() {
        assert_eq!(normalize_cell(&Data::Int(7)), CellValue::Int(7));
        assert_eq!(normalize_cell(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(
            normalize_cell(&Data::String(" Ana ".to_string())),
            CellValue::Text(" Ana ".to_string())
        );
    }

    #[test]
    fn test_lookup_key_trims_and_folds_case() {
        assert_eq!(lookup_key(&CellValue::from("  Brazil ")), Some("brazil".to_string()));
        assert_eq!(lookup_key(&CellValue::Float(3.0)), Some("3".to_string()));
        assert_eq!(lookup_key(&CellValue::from("   ")), None);
        assert_eq!(lookup_key(&CellValue::Null), None);
    }
}
