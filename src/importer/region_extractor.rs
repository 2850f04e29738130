// ==========================================
// 表格导入引擎 - 区域提取器
// ==========================================
// 职责: (工作表网格, 表头行, 列窗口, 行范围) → 命名列 + 有序数据行
// 规则:
// - 表头文本 TRIM；空白 / 占位列名 → Column_<窗口内位置>
// - 重名列按出现顺序追加 _2 / _3 ...
// - 列窗口内全空的行丢弃
// - 表头全为占位且首个数据行像真实表头时，表头下移一行重试（最多一次）
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{CellValue, SourceRegion};
use crate::importer::cell_normalizer::header_text;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::sheet_source::SheetGrid;
use std::collections::HashSet;
use tracing::{debug, info};

/// 一个数据行（携带表格绝对行号，诊断用）
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub sheet_row: usize,
    pub values: Vec<CellValue>,
}

/// 提取结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTable {
    pub sheet: String,
    pub columns: Vec<String>,
    pub rows: Vec<SourceRow>,
    /// 实际使用的表头行
    pub header_row: usize,
    pub header_promoted: bool,
}

impl ExtractedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value<'a>(&self, row: &'a SourceRow, column: &str) -> Option<&'a CellValue> {
        self.column_index(column).and_then(|idx| row.values.get(idx))
    }

    /// 返回 names 中不存在于提取结果的列（保序）
    pub fn missing_columns<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Vec<String> {
        names
            .into_iter()
            .filter(|n| self.column_index(n).is_none())
            .map(str::to_string)
            .collect()
    }
}

/// 单次提取的中间结果
struct Attempt {
    table: ExtractedTable,
    all_synthetic: bool,
}

pub struct RegionExtractor<'a> {
    settings: &'a ImportSettings,
}

impl<'a> RegionExtractor<'a> {
    pub fn new(settings: &'a ImportSettings) -> Self {
        Self { settings }
    }

    /// 提取区域（含一次性表头自动提升）
    pub fn extract(&self, grid: &SheetGrid, region: &SourceRegion) -> ImportResult<ExtractedTable> {
        let first = self.extract_once(grid, region)?;
        if !self.should_promote(&first) {
            return Ok(first.table);
        }

        let shifted = region.shifted_header();
        info!(
            sheet = %region.sheet,
            from = region.header_row,
            to = shifted.header_row,
            "表头全为占位列名，下移一行重试"
        );
        match self.extract_once(grid, &shifted) {
            Ok(mut retry) => {
                retry.table.header_promoted = true;
                Ok(retry.table)
            }
            // 下移后越界则保留原结果
            Err(ImportError::HeaderRowOutOfRange { .. }) => Ok(first.table),
            Err(e) => Err(e),
        }
    }

    fn extract_once(&self, grid: &SheetGrid, region: &SourceRegion) -> ImportResult<Attempt> {
        let header_row = region.header_row;
        if header_row == 0 || header_row > grid.height() {
            return Err(ImportError::HeaderRowOutOfRange {
                sheet: grid.name().to_string(),
                header_row,
                last_row: grid.height(),
            });
        }

        let column_start = region.column_start.max(1);
        let column_end = region
            .effective_column_end()
            .unwrap_or_else(|| grid.last_populated_column(header_row));

        // === 列名 ===
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        let mut all_synthetic = true;
        for column in column_start..=column_end {
            let position = column - column_start + 1;
            let text = header_text(grid.cell(header_row, column));
            let base = if self.settings.is_placeholder(&text) {
                self.settings.synthetic_name(position)
            } else {
                all_synthetic = false;
                text
            };
            columns.push(disambiguate(base, &mut seen));
        }

        // === 数据行 ===
        let last_row = region
            .last_row
            .map_or(grid.height(), |last| last.min(grid.height()));
        let mut rows = Vec::new();
        for sheet_row in (header_row + 1)..=last_row {
            let values: Vec<CellValue> = (column_start..=column_end)
                .map(|column| grid.cell(sheet_row, column).clone())
                .collect();
            if values.iter().all(CellValue::is_null) {
                continue;
            }
            rows.push(SourceRow { sheet_row, values });
        }

        debug!(
            sheet = grid.name(),
            header_row,
            column_start,
            column_end,
            columns = columns.len(),
            rows = rows.len(),
            "区域提取完成"
        );

        Ok(Attempt {
            table: ExtractedTable {
                sheet: grid.name().to_string(),
                columns,
                rows,
                header_row,
                header_promoted: false,
            },
            all_synthetic,
        })
    }

    /// 表头全为占位 且 首个数据行至少有一个非占位文本
    fn should_promote(&self, attempt: &Attempt) -> bool {
        if !self.settings.header_auto_promotion
            || !attempt.all_synthetic
            || attempt.table.columns.is_empty()
        {
            return false;
        }
        attempt.table.rows.first().is_some_and(|row| {
            row.values.iter().any(|v| match v {
                CellValue::Text(s) => !self.settings.is_placeholder(s),
                _ => false,
            })
        })
    }
}

/// 重名追加 _2 / _3 ...
fn disambiguate(base: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn grid(rows: Vec<Vec<CellValue>>) -> SheetGrid {
        SheetGrid::new("Clients", rows)
    }

    #[test]
    fn test_placeholder_and_duplicate_names() {
        let settings = ImportSettings::default();
        let grid = grid(vec![
            vec![text(" Name "), CellValue::Null, text("Name"), text("Unnamed: 3")],
            vec![text("Ana"), text("x"), text("y"), text("z")],
        ]);
        let table = RegionExtractor::new(&settings)
            .extract(&grid, &SourceRegion::new("Clients", 1))
            .unwrap();

        assert_eq!(table.columns, vec!["Name", "Column_2", "Name_2", "Column_4"]);
        assert_eq!(table.rows[0].sheet_row, 2);
    }

    #[test]
    fn test_real_headers_with_placeholder_prefix_are_kept() {
        let settings = ImportSettings::default();
        let grid = grid(vec![
            vec![text("Name"), text("Column_Code"), text("Coluna_2")],
            vec![text("Ana"), text("C1"), text("x")],
        ]);
        let table = RegionExtractor::new(&settings)
            .extract(&grid, &SourceRegion::new("Clients", 1))
            .unwrap();

        assert_eq!(table.columns, vec!["Name", "Column_Code", "Column_3"]);
    }

    #[test]
    fn test_column_window_positions_are_relative() {
        let settings = ImportSettings::default();
        let grid = grid(vec![
            vec![text("skip"), CellValue::Null, text("Email")],
            vec![text("a"), text("b"), text("c")],
        ]);
        let region = SourceRegion::new("Clients", 1).with_columns(2, Some(3));
        let table = RegionExtractor::new(&settings).extract(&grid, &region).unwrap();

        assert_eq!(table.columns, vec!["Column_1", "Email"]);
        assert_eq!(table.rows[0].values, vec![text("b"), text("c")]);
    }

    #[test]
    fn test_empty_rows_dropped_and_row_numbers_kept() {
        let settings = ImportSettings::default();
        let grid = grid(vec![
            vec![text("Title")],
            vec![text("Name"), text("Email")],
            vec![text("Ana"), text("a@x.com")],
            vec![CellValue::Null, CellValue::Null],
            vec![text("Bea"), CellValue::Null],
        ]);
        let table = RegionExtractor::new(&settings)
            .extract(&grid, &SourceRegion::new("Clients", 2))
            .unwrap();

        let rows: Vec<usize> = table.rows.iter().map(|r| r.sheet_row).collect();
        assert_eq!(rows, vec![3, 5]);
    }

    #[test]
    fn test_last_row_bounds_data() {
        let settings = ImportSettings::default();
        let grid = grid(vec![
            vec![text("Name")],
            vec![text("Ana")],
            vec![text("Bea")],
            vec![text("Cid")],
        ]);
        let region = SourceRegion::new("Clients", 1).with_last_row(Some(3));
        let table = RegionExtractor::new(&settings).extract(&grid, &region).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_header_promotion_happens_once() {
        let settings = ImportSettings::default();
        // 第 1 行全空，第 2 行才是真实表头
        let grid = grid(vec![
            vec![CellValue::Null, CellValue::Null],
            vec![text("Name"), text("Email")],
            vec![text("Ana"), text("a@x.com")],
        ]);
        let table = RegionExtractor::new(&settings)
            .extract(&grid, &SourceRegion::new("Clients", 1))
            .unwrap();

        assert!(table.header_promoted);
        assert_eq!(table.header_row, 2);
        assert_eq!(table.columns, vec!["Name", "Email"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_header_promotion_bounded_to_single_retry() {
        let settings = ImportSettings::default();
        // 前两行都为空，真实表头在第 3 行；仅重试一次，停在第 2 行
        let grid = grid(vec![
            vec![CellValue::Null],
            vec![CellValue::Null],
            vec![text("Name")],
            vec![text("Ana")],
        ]);
        let table = RegionExtractor::new(&settings)
            .extract(&grid, &SourceRegion::new("Clients", 1))
            .unwrap();

        assert!(table.header_promoted);
        assert_eq!(table.header_row, 2);
        assert_eq!(table.columns, vec!["Column_1"]);
    }

    #[test]
    fn test_no_promotion_when_disabled_or_data_is_numeric() {
        let disabled = ImportSettings {
            header_auto_promotion: false,
            ..ImportSettings::default()
        };
        let text_grid = grid(vec![vec![CellValue::Null], vec![text("Name")]]);
        let table = RegionExtractor::new(&disabled)
            .extract(&text_grid, &SourceRegion::new("Clients", 1))
            .unwrap();
        assert!(!table.header_promoted);

        let settings = ImportSettings::default();
        let numeric_grid = grid(vec![vec![CellValue::Null], vec![CellValue::Int(5)]]);
        let table = RegionExtractor::new(&settings)
            .extract(&numeric_grid, &SourceRegion::new("Clients", 1))
            .unwrap();
        assert!(!table.header_promoted);
    }

    #[test]
    fn test_header_row_out_of_range() {
        let settings = ImportSettings::default();
        let grid = grid(vec![vec![text("Name")]]);
        let result = RegionExtractor::new(&settings).extract(&grid, &SourceRegion::new("Clients", 4));
        assert!(matches!(result, Err(ImportError::HeaderRowOutOfRange { .. })));
    }
}
