// ==========================================
// 表格导入引擎 - 表格数据源
// ==========================================
// 支持: Excel (.xlsx/.xlsm/.xlsb/.xls/.ods) / CSV (.csv) / 内存表格
// 职责: 按工作表名读出绝对寻址（1 起始）的标准化网格
// 红线: 数据源只负责读取，不识别表头、不做映射
// ==========================================

use crate::domain::CellValue;
use crate::importer::cell_normalizer::{normalize_cell, normalize_text};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader, Sheets};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, instrument};

static NULL_CELL: CellValue = CellValue::Null;

// ==========================================
// SheetGrid - 工作表网格
// ==========================================
// cells[0][0] 对应表格第 1 行第 1 列；超出范围的单元格视为空
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    name: String,
    cells: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    /// 从第 1 行第 1 列开始的行数据构造
    pub fn new(name: &str, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.to_string(),
            cells: rows,
        }
    }

    /// 从指定起点（1 起始）构造，前导空行/空列补齐
    pub fn with_origin(
        name: &str,
        first_row: usize,
        first_column: usize,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        let row_pad = first_row.saturating_sub(1);
        let col_pad = first_column.saturating_sub(1);
        let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); row_pad];
        cells.extend(rows.into_iter().map(|row| {
            let mut padded = vec![CellValue::Null; col_pad];
            padded.extend(row);
            padded
        }));
        Self::new(name, cells)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 最后一行行号（含空行）
    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// 单元格（1 起始）
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        if row == 0 || column == 0 {
            return &NULL_CELL;
        }
        self.cells
            .get(row - 1)
            .and_then(|r| r.get(column - 1))
            .unwrap_or(&NULL_CELL)
    }

    /// from_row 起（含）各行中最后一个非空列的列号；全空为 0
    pub fn last_populated_column(&self, from_row: usize) -> usize {
        self.cells
            .iter()
            .skip(from_row.saturating_sub(1))
            .filter_map(|row| row.iter().rposition(|c| !c.is_null()))
            .map(|idx| idx + 1)
            .max()
            .unwrap_or(0)
    }
}

// ==========================================
// SheetSource Trait
// ==========================================
// 实现者: ExcelSource / CsvSource / InMemorySheet
pub trait SheetSource {
    /// 工作表名称列表（按文件中的顺序）
    fn sheet_names(&self) -> Vec<String>;

    /// 读取整张工作表
    ///
    /// # 错误
    /// - SheetNotFound: 工作表不存在
    fn read_sheet(&mut self, name: &str) -> ImportResult<SheetGrid>;
}

fn sheet_not_found(source: &dyn SheetSource, name: &str) -> ImportError {
    ImportError::SheetNotFound {
        sheet: name.to_string(),
        available: source.sheet_names(),
    }
}

// ==========================================
// ExcelSource - calamine 工作簿
// ==========================================
pub struct ExcelSource {
    workbook: Sheets<BufReader<File>>,
}

impl ExcelSource {
    #[instrument]
    pub fn open(path: &Path) -> ImportResult<Self> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let workbook = open_workbook_auto(path)?;
        debug!(sheets = ?workbook.sheet_names(), "工作簿已打开");
        Ok(Self { workbook })
    }
}

impl SheetSource for ExcelSource {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> ImportResult<SheetGrid> {
        if !self.sheet_names().iter().any(|s| s == name) {
            return Err(sheet_not_found(&*self, name));
        }
        let range = self.workbook.worksheet_range(name)?;

        // Range 只覆盖有值区域，起点需换算为绝对行列
        let (first_row, first_column) = match range.start() {
            Some((r, c)) => (r as usize + 1, c as usize + 1),
            None => return Ok(SheetGrid::new(name, Vec::new())),
        };
        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(normalize_cell).collect())
            .collect();

        debug!(
            sheet = name,
            first_row,
            first_column,
            rows = rows.len(),
            "工作表已读取"
        );
        Ok(SheetGrid::with_origin(name, first_row, first_column, rows))
    }
}

// ==========================================
// CsvSource - 单工作表（以文件名主干命名）
// ==========================================
pub struct CsvSource {
    grid: SheetGrid,
}

impl CsvSource {
    #[instrument]
    pub fn open(path: &Path) -> ImportResult<Self> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "csv".to_string());

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 表头行由区域定义决定
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(normalize_text).collect());
        }
        debug!(sheet = %name, rows = rows.len(), "CSV 已读取");
        Ok(Self {
            grid: SheetGrid::new(&name, rows),
        })
    }
}

impl SheetSource for CsvSource {
    fn sheet_names(&self) -> Vec<String> {
        vec![self.grid.name().to_string()]
    }

    fn read_sheet(&mut self, name: &str) -> ImportResult<SheetGrid> {
        if name != self.grid.name() {
            return Err(sheet_not_found(&*self, name));
        }
        Ok(self.grid.clone())
    }
}

// ==========================================
// InMemorySheet - 程序化数据源（嵌入调用 / 测试）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct InMemorySheet {
    sheets: Vec<SheetGrid>,
}

impl InMemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一张工作表（第一行即表格第 1 行）
    pub fn with_sheet(mut self, name: &str, rows: Vec<Vec<CellValue>>) -> Self {
        self.sheets.push(SheetGrid::new(name, rows));
        self
    }
}

impl SheetSource for InMemorySheet {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name().to_string()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> ImportResult<SheetGrid> {
        match self.sheets.iter().find(|s| s.name() == name) {
            Some(grid) => Ok(grid.clone()),
            None => Err(sheet_not_found(&*self, name)),
        }
    }
}

// ==========================================
// 通用入口（根据扩展名自动选择）
// ==========================================
pub fn open_source<P: AsRef<Path>>(path: P) -> ImportResult<Box<dyn SheetSource>> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => Ok(Box::new(CsvSource::open(path)?)),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Box::new(ExcelSource::open(path)?)),
        _ => Err(ImportError::UnsupportedFormat(ext)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_grid_origin_padding() {
        let grid = SheetGrid::with_origin(
            "S",
            3,
            2,
            vec![vec![CellValue::from("Name"), CellValue::from("Email")]],
        );

        assert_eq!(grid.height(), 3);
        assert_eq!(grid.cell(3, 2), &CellValue::from("Name"));
        assert_eq!(grid.cell(3, 3), &CellValue::from("Email"));
        assert!(grid.cell(1, 1).is_null());
        assert!(grid.cell(9, 9).is_null());
        assert_eq!(grid.last_populated_column(1), 3);
    }

    #[test]
    fn test_csv_source_reads_single_sheet() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "Name,Email").unwrap();
        writeln!(temp_file, "Ana,a@x.com").unwrap();
        writeln!(temp_file, ",").unwrap();

        let mut source = open_source(temp_file.path()).unwrap();
        let names = source.sheet_names();
        assert_eq!(names.len(), 1);

        let grid = source.read_sheet(&names[0]).unwrap();
        assert_eq!(grid.cell(1, 1), &CellValue::from("Name"));
        assert_eq!(grid.cell(2, 2), &CellValue::from("a@x.com"));
        assert!(grid.cell(3, 1).is_null());
    }

    #[test]
    fn test_unknown_sheet_lists_available() {
        let mut source = InMemorySheet::new().with_sheet("Clients", vec![]);
        let err = source.read_sheet("Clientes").unwrap_err();

        match err {
            ImportError::SheetNotFound { sheet, available } => {
                assert_eq!(sheet, "Clientes");
                assert_eq!(available, vec!["Clients".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_file = Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            open_source(temp_file.path()),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            open_source("non_existent.csv"),
            Err(ImportError::FileNotFound(_))
        ));
    }
}
