// ==========================================
// 表格导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 所有错误对当前构建都是终止性的，不返回部分结果
// ==========================================

use crate::domain::ConfigurationError;
use crate::importer::diagnostics::RowDiagnostic;
use crate::repository::RepositoryError;
use thiserror::Error;

/// 错误分类（调用方按类别展示 / 记录）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 映射配置可修正，读取数据前报告
    Configuration,
    /// 源文件 / 工作表 / 列读取失败
    SourceRead,
    /// 外表标签重复，查找缓存不可信
    AmbiguousReference,
    /// 行级外键无法解析
    UnresolvedReference,
    /// 列长度越界
    ConstraintViolation,
    /// 持久化网关原样上抛
    Persistence,
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误 =====
    #[error("映射配置错误: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("映射文件无效: {0}")]
    InvalidMappingDocument(String),

    // ===== 源读取错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.xlsb/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("工作表不存在: {sheet}（可用: {}）", .available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    #[error("工作表 {sheet} 表头行 {header_row} 超出数据范围（最后一行 {last_row}）")]
    HeaderRowOutOfRange {
        sheet: String,
        header_row: usize,
        last_row: usize,
    },

    #[error("工作表 {sheet} 中找不到列: {}", .columns.join(", "))]
    ColumnsNotFound { sheet: String, columns: Vec<String> },

    // ===== 外键错误 =====
    #[error("表 {table} 的标签列 {label_column} 存在重复值: {}", .labels.join(", "))]
    AmbiguousReference {
        table: String,
        label_column: String,
        labels: Vec<String>,
    },

    #[error("外键关联无法解析（共 {} 处）:\n{}", .diagnostics.len(), .digest.join("\n"))]
    UnresolvedReference {
        diagnostics: Vec<RowDiagnostic>,
        digest: Vec<String>,
    },

    // ===== 约束错误 =====
    #[error("值超出列允许的长度（共 {} 处）:\n{}", .diagnostics.len(), .digest.join("\n"))]
    ConstraintViolation {
        diagnostics: Vec<RowDiagnostic>,
        digest: Vec<String>,
    },

    // ===== 持久化错误 =====
    #[error("持久化失败: {0}")]
    Persistence(#[from] RepositoryError),
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Configuration(_) | ImportError::InvalidMappingDocument(_) => {
                ErrorKind::Configuration
            }
            ImportError::FileNotFound(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_)
            | ImportError::SheetNotFound { .. }
            | ImportError::HeaderRowOutOfRange { .. }
            | ImportError::ColumnsNotFound { .. } => ErrorKind::SourceRead,
            ImportError::AmbiguousReference { .. } => ErrorKind::AmbiguousReference,
            ImportError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            ImportError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            ImportError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// 行级诊断（仅外键 / 长度两类错误携带）
    pub fn diagnostics(&self) -> &[RowDiagnostic] {
        match self {
            ImportError::UnresolvedReference { diagnostics, .. }
            | ImportError::ConstraintViolation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>（映射文件加载时整体校验失败也走这里）
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InvalidMappingDocument(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
