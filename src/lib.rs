// ==========================================
// 表格导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + calamine / csv + SQLite
// 系统定位: 电子表格 → 关系表 的声明式映射导入
// 红线: 构建失败整体中止，绝不静默写入部分数据
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 值类型 / 表结构 / 映射规格
pub mod domain;

// 数据仓储层 - 持久化网关
pub mod repository;

// 导入层 - 提取 / 构建 / 编排
pub mod importer;

// 配置层 - 引擎设置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CellValue, ColumnInfo, ConfigurationError, DefaultValue, ForeignKeyLookup,
    MappingSpecification, Operation, SourceRegion, TableSchema, TransformationReport,
    TransformedRecord, TypeCategory,
};

// 导入
pub use importer::{
    open_source, BuildOutput, ErrorKind, ImportError, ImportOutcome, ImportResult,
    InMemorySheet, RecordBuilder, SheetSource, TableImporter,
};

// 仓储
pub use repository::{RepositoryError, SqliteTableGateway, TableGateway};

// 配置
pub use config::{ConfigManager, EngineConfigReader, ImportSettings};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格导入引擎";
