// ==========================================
// 表格导入引擎 - 导入层
// ==========================================
// 职责: 表格 → 待写入记录 → 目标表
// 支持: Excel, CSV, 内存表格
// ==========================================
// 数据流: 区域提取 → 记录构建（去重 / 默认值 / 外键 / 长度 / 主键）→ 持久化网关
// ==========================================

// 模块声明
pub mod cell_normalizer;
pub mod diagnostics;
pub mod error;
pub mod lookup_resolver;
pub mod record_builder;
pub mod region_extractor;
pub mod sheet_source;
pub mod table_importer;

// 重导出核心类型
pub use diagnostics::{DiagnosticReason, RowDiagnostic};
pub use error::{ErrorKind, ImportError, ImportResult};
pub use lookup_resolver::LookupResolver;
pub use record_builder::{deduplicate, BuildOutput, DuplicateStats, RecordBuilder};
pub use region_extractor::{ExtractedTable, RegionExtractor, SourceRow};
pub use sheet_source::{open_source, CsvSource, ExcelSource, InMemorySheet, SheetGrid, SheetSource};
pub use table_importer::{BuildPreview, ImportOutcome, TableImporter};
