// ==========================================
// 表格导入引擎 - 领域模型层
// ==========================================
// 职责: 定义值类型、目标表结构、映射规格、转换结果
// 红线: 不含数据访问逻辑，不含表格解析逻辑
// ==========================================

pub mod mapping;
pub mod record;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use mapping::{
    ColumnPair, ConfigurationError, DedupRule, DefaultEntry, DefaultValue, ForeignKeyLookup,
    LookupKey, MappingBuilder, MappingDraft, MappingSpecification, Provenance, SourceRegion,
};
pub use record::{TransformationReport, TransformedRecord};
pub use schema::{ColumnInfo, TableSchema};
pub use types::{CellValue, Operation, TypeCategory, ValueKey};
