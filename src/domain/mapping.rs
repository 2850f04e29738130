// ==========================================
// 表格导入引擎 - 映射规格 (Mapping Specification)
// ==========================================
// 职责: 表格列 → 目标表列 的声明式转换契约
// 内容: 列映射 / 默认值 / 外键查找 / 操作类型 / 去重规则 / 主键策略
// 红线: 一次构造、整体校验、不可变；不含文件路径与凭据
// ==========================================
// 不变量:
// - 映射目标 / 默认值列 / 外键目标 三个集合两两不相交
// - 目标表所有非空列必须被覆盖（自动生成的主键除外）
// ==========================================

use crate::domain::schema::TableSchema;
use crate::domain::types::{CellValue, Operation, TypeCategory};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// ==========================================
// 配置错误（调用方可修正，读取数据前报告）
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("未指定目标表")]
    MissingTargetTable,

    #[error("区域定义无效: {0}")]
    InvalidRegion(String),

    #[error("至少需要一个列映射、默认值或外键查找")]
    EmptyMapping,

    #[error("目标列 {column} 被{provenance}重复指定")]
    DuplicateTarget {
        column: String,
        provenance: Provenance,
    },

    #[error("目标列 {column} 同时由{first}和{second}填充")]
    OverlappingProvenance {
        column: String,
        first: Provenance,
        second: Provenance,
    },

    #[error("UPDATE 操作必须指定关联列")]
    JoinColumnRequired,

    #[error("UPDATE 关联列 {0} 未被映射/默认值/外键覆盖")]
    JoinColumnNotCovered(String),

    #[error("去重规则已启用但未指定检查列")]
    EmptyDedupColumn,

    #[error("目标表 {table} 不存在列 {column}")]
    UnknownColumn { table: String, column: String },

    #[error("以下必填列未被覆盖: {}", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),

    #[error("列 {column} 类型为 {category}，不接受 {kind} 类型的默认值")]
    DefaultTypeMismatch {
        column: String,
        category: TypeCategory,
        kind: &'static str,
    },
}

/// 目标列的填充来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    Mapping,
    Default,
    ForeignKey,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Mapping => write!(f, "列映射"),
            Provenance::Default => write!(f, "默认值"),
            Provenance::ForeignKey => write!(f, "外键查找"),
        }
    }
}

// ==========================================
// 源区域 (Source Region)
// ==========================================
// 全部为 1 起始的表格行/列号；column_end/last_row 为闭区间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRegion {
    pub sheet: String,
    pub header_row: usize,
    #[serde(default = "default_column_start")]
    pub column_start: usize,
    #[serde(default)]
    pub column_end: Option<usize>,
    #[serde(default)]
    pub last_row: Option<usize>,
}

fn default_column_start() -> usize {
    1
}

impl SourceRegion {
    pub fn new(sheet: &str, header_row: usize) -> Self {
        Self {
            sheet: sheet.to_string(),
            header_row,
            column_start: 1,
            column_end: None,
            last_row: None,
        }
    }

    pub fn with_columns(mut self, column_start: usize, column_end: Option<usize>) -> Self {
        self.column_start = column_start;
        self.column_end = column_end;
        self
    }

    pub fn with_last_row(mut self, last_row: Option<usize>) -> Self {
        self.last_row = last_row;
        self
    }

    /// 表头下移一行后的区域（表头自动提升用）
    pub fn shifted_header(&self) -> Self {
        let mut next = self.clone();
        next.header_row += 1;
        next
    }

    /// 有效结束列：小于起始列的结束列按"到最后一个有值列"处理
    pub fn effective_column_end(&self) -> Option<usize> {
        self.column_end.filter(|end| *end >= self.column_start)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.sheet.trim().is_empty() {
            return Err(ConfigurationError::InvalidRegion("未指定工作表".to_string()));
        }
        if self.header_row < 1 {
            return Err(ConfigurationError::InvalidRegion(
                "表头行号从 1 开始".to_string(),
            ));
        }
        if self.column_start < 1 {
            return Err(ConfigurationError::InvalidRegion(
                "起始列号从 1 开始".to_string(),
            ));
        }
        if let Some(last) = self.last_row {
            if last <= self.header_row {
                return Err(ConfigurationError::InvalidRegion(format!(
                    "最后数据行 {} 必须大于表头行 {}",
                    last, self.header_row
                )));
            }
        }
        Ok(())
    }
}

/// 表格列 → 目标列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub source: String,
    pub target: String,
}

impl ColumnPair {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

// ==========================================
// 默认值 (按目标列类型类别选择变体)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl DefaultValue {
    pub fn to_cell(&self) -> CellValue {
        match self {
            DefaultValue::Text(s) => CellValue::Text(s.clone()),
            DefaultValue::Bool(b) => CellValue::Bool(*b),
            DefaultValue::Date(d) => CellValue::Date(*d),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DefaultValue::Text(_) => "text",
            DefaultValue::Bool(_) => "bool",
            DefaultValue::Date(_) => "date",
        }
    }

    /// 布尔列只收 Bool，日期列只收 Date，其余类别收 Text
    pub fn fits(&self, category: TypeCategory) -> bool {
        match category {
            TypeCategory::Boolean => matches!(self, DefaultValue::Bool(_)),
            TypeCategory::DateTime => matches!(self, DefaultValue::Date(_)),
            _ => matches!(self, DefaultValue::Text(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultEntry {
    pub column: String,
    pub value: DefaultValue,
}

// ==========================================
// 外键查找 (Foreign Key Lookup)
// ==========================================
// 用 source_column 的文本在 foreign_table.foreign_label_column 中查找，
// 取对应的 foreign_id_column 填入 target_column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyLookup {
    pub target_column: String,
    pub source_column: String,
    pub foreign_table: String,
    pub foreign_id_column: String,
    pub foreign_label_column: String,
}

impl ForeignKeyLookup {
    pub fn new(
        target_column: &str,
        source_column: &str,
        foreign_table: &str,
        foreign_id_column: &str,
        foreign_label_column: &str,
    ) -> Self {
        Self {
            target_column: target_column.to_string(),
            source_column: source_column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_id_column: foreign_id_column.to_string(),
            foreign_label_column: foreign_label_column.to_string(),
        }
    }

    pub fn lookup_key(&self) -> LookupKey {
        LookupKey {
            table: self.foreign_table.clone(),
            id_column: self.foreign_id_column.clone(),
            label_column: self.foreign_label_column.clone(),
        }
    }
}

/// (外表, ID 列, 标签列) 三元组；每次构建每个三元组只读取一次
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupKey {
    pub table: String,
    pub id_column: String,
    pub label_column: String,
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}→{}", self.table, self.label_column, self.id_column)
    }
}

/// 去重规则：check_column 可以是表格列名，也可以是映射目标列名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRule {
    pub check_column: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

// ==========================================
// MappingDraft - 序列化形态 / 构造器内部状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDraft {
    pub target_table: String,
    pub source_region: SourceRegion,
    #[serde(default)]
    pub column_pairs: Vec<ColumnPair>,
    #[serde(default)]
    pub defaults: Vec<DefaultEntry>,
    #[serde(default)]
    pub fk_lookups: Vec<ForeignKeyLookup>,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default)]
    pub join_column: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub autogenerate_pk: bool,
    #[serde(default)]
    pub dedup: Option<DedupRule>,
}

// ==========================================
// MappingSpecification - 已校验的映射规格
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MappingDraft", into = "MappingDraft")]
pub struct MappingSpecification {
    target_table: String,
    source_region: SourceRegion,
    column_pairs: Vec<ColumnPair>,
    defaults: Vec<DefaultEntry>,
    fk_lookups: Vec<ForeignKeyLookup>,
    operation: Operation,
    join_column: Option<String>,
    primary_key: Option<String>,
    autogenerate_pk: bool,
    dedup: Option<DedupRule>,
}

impl TryFrom<MappingDraft> for MappingSpecification {
    type Error = ConfigurationError;

    fn try_from(draft: MappingDraft) -> Result<Self, Self::Error> {
        let MappingDraft {
            target_table,
            source_region,
            column_pairs,
            mut defaults,
            fk_lookups,
            operation,
            join_column,
            primary_key,
            autogenerate_pk,
            dedup,
        } = draft;

        if target_table.trim().is_empty() {
            return Err(ConfigurationError::MissingTargetTable);
        }
        source_region.validate()?;

        let mapping_targets: HashSet<&str> =
            column_pairs.iter().map(|p| p.target.as_str()).collect();

        // 主键自动生成仅在主键已指定且未被列映射时生效
        let autogenerate_pk = autogenerate_pk
            && primary_key
                .as_deref()
                .is_some_and(|pk| !mapping_targets.contains(pk));
        if autogenerate_pk {
            if let Some(pk) = primary_key.as_deref() {
                defaults.retain(|d| d.column != pk);
            }
        }

        if column_pairs.is_empty() && defaults.is_empty() && fk_lookups.is_empty() {
            return Err(ConfigurationError::EmptyMapping);
        }

        check_provenance(&column_pairs, &defaults, &fk_lookups)?;

        let join_column = match operation {
            Operation::Insert => None,
            Operation::Update => {
                let join = join_column
                    .filter(|j| !j.trim().is_empty())
                    .ok_or(ConfigurationError::JoinColumnRequired)?;
                let covered = mapping_targets.contains(join.as_str())
                    || defaults.iter().any(|d| d.column == join)
                    || fk_lookups.iter().any(|f| f.target_column == join);
                if !covered {
                    return Err(ConfigurationError::JoinColumnNotCovered(join));
                }
                Some(join)
            }
        };

        if let Some(rule) = &dedup {
            if rule.enabled && rule.check_column.trim().is_empty() {
                return Err(ConfigurationError::EmptyDedupColumn);
            }
        }

        Ok(Self {
            target_table,
            source_region,
            column_pairs,
            defaults,
            fk_lookups,
            operation,
            join_column,
            primary_key,
            autogenerate_pk,
            dedup,
        })
    }
}

impl From<MappingSpecification> for MappingDraft {
    fn from(spec: MappingSpecification) -> Self {
        Self {
            target_table: spec.target_table,
            source_region: spec.source_region,
            column_pairs: spec.column_pairs,
            defaults: spec.defaults,
            fk_lookups: spec.fk_lookups,
            operation: spec.operation,
            join_column: spec.join_column,
            primary_key: spec.primary_key,
            autogenerate_pk: spec.autogenerate_pk,
            dedup: spec.dedup,
        }
    }
}

/// 校验三类来源各自无重复、彼此不相交
fn check_provenance(
    pairs: &[ColumnPair],
    defaults: &[DefaultEntry],
    fk_lookups: &[ForeignKeyLookup],
) -> Result<(), ConfigurationError> {
    let groups: [(Provenance, Vec<&str>); 3] = [
        (
            Provenance::Mapping,
            pairs.iter().map(|p| p.target.as_str()).collect(),
        ),
        (
            Provenance::Default,
            defaults.iter().map(|d| d.column.as_str()).collect(),
        ),
        (
            Provenance::ForeignKey,
            fk_lookups.iter().map(|f| f.target_column.as_str()).collect(),
        ),
    ];

    let mut owner: Vec<(&str, Provenance)> = Vec::new();
    for (provenance, columns) in &groups {
        for column in columns {
            if let Some((_, first)) = owner.iter().find(|(c, _)| c == column) {
                if first == provenance {
                    return Err(ConfigurationError::DuplicateTarget {
                        column: column.to_string(),
                        provenance: *provenance,
                    });
                }
                return Err(ConfigurationError::OverlappingProvenance {
                    column: column.to_string(),
                    first: *first,
                    second: *provenance,
                });
            }
            owner.push((*column, *provenance));
        }
    }
    Ok(())
}

impl MappingSpecification {
    pub fn builder(target_table: &str, source_region: SourceRegion) -> MappingBuilder {
        MappingBuilder::new(target_table, source_region)
    }

    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn source_region(&self) -> &SourceRegion {
        &self.source_region
    }

    pub fn column_pairs(&self) -> &[ColumnPair] {
        &self.column_pairs
    }

    pub fn defaults(&self) -> &[DefaultEntry] {
        &self.defaults
    }

    pub fn fk_lookups(&self) -> &[ForeignKeyLookup] {
        &self.fk_lookups
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn join_column(&self) -> Option<&str> {
        self.join_column.as_deref()
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn autogenerate_pk(&self) -> bool {
        self.autogenerate_pk
    }

    /// 复核三类来源互斥（构建第一步）
    pub fn check_disjoint(&self) -> Result<(), ConfigurationError> {
        check_provenance(&self.column_pairs, &self.defaults, &self.fk_lookups)
    }

    /// 已启用的去重规则
    pub fn dedup(&self) -> Option<&DedupRule> {
        self.dedup.as_ref().filter(|d| d.enabled)
    }

    /// 被覆盖的目标列（映射 → 默认值 → 外键，按出现顺序）
    pub fn covered_targets(&self) -> Vec<&str> {
        self.column_pairs
            .iter()
            .map(|p| p.target.as_str())
            .chain(self.defaults.iter().map(|d| d.column.as_str()))
            .chain(self.fk_lookups.iter().map(|f| f.target_column.as_str()))
            .collect()
    }

    /// 实际写入的目标列（去掉自动生成的主键）
    pub fn target_columns(&self) -> Vec<&str> {
        let autogenerated = self.autogenerated_pk();
        self.covered_targets()
            .into_iter()
            .filter(|c| Some(*c) != autogenerated)
            .collect()
    }

    /// 自动生成的主键列名（策略未生效时为 None）
    pub fn autogenerated_pk(&self) -> Option<&str> {
        if self.autogenerate_pk {
            self.primary_key.as_deref()
        } else {
            None
        }
    }

    /// 构建记录需要读取的表格列（列映射源列 + 外键源列，去重保序）
    pub fn required_source_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.column_pairs
            .iter()
            .map(|p| p.source.as_str())
            .chain(self.fk_lookups.iter().map(|f| f.source_column.as_str()))
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// 去重检查列在表格中的列名
    ///
    /// 优先按表格列名匹配，其次按映射目标列名回溯到源列。
    pub fn dedup_source_column(&self, sheet_columns: &[String]) -> Option<String> {
        let rule = self.dedup()?;
        if sheet_columns.iter().any(|c| c == &rule.check_column) {
            return Some(rule.check_column.clone());
        }
        self.column_pairs
            .iter()
            .find(|p| p.target == rule.check_column)
            .map(|p| p.source.clone())
            .filter(|source| sheet_columns.iter().any(|c| c == source))
    }

    /// 结合目标表结构校验（列存在性 / 默认值类型 / 必填列覆盖）
    pub fn validate_against(&self, schema: &TableSchema) -> Result<(), ConfigurationError> {
        let unknown = |column: &str| ConfigurationError::UnknownColumn {
            table: schema.table.clone(),
            column: column.to_string(),
        };

        for column in self.covered_targets() {
            if !schema.contains(column) {
                return Err(unknown(column));
            }
        }
        for column in self.join_column.iter().chain(self.primary_key.iter()) {
            if !schema.contains(column) {
                return Err(unknown(column));
            }
        }

        for entry in &self.defaults {
            if let Some(info) = schema.column(&entry.column) {
                if !entry.value.fits(info.category) {
                    return Err(ConfigurationError::DefaultTypeMismatch {
                        column: entry.column.clone(),
                        category: info.category,
                        kind: entry.value.kind(),
                    });
                }
            }
        }

        let covered: HashSet<&str> = self.covered_targets().into_iter().collect();
        let missing: Vec<String> = schema
            .columns
            .iter()
            .filter(|c| {
                let autogenerated = self.autogenerated_pk() == Some(c.name.as_str());
                c.is_required(autogenerated) && !covered.contains(c.name.as_str())
            })
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingRequiredColumns(missing));
        }
        Ok(())
    }

    /// SQL 形态预览（仅用于展示，不执行）
    pub fn sql_preview(&self) -> String {
        let columns = self.target_columns();
        match self.operation {
            Operation::Insert => {
                let placeholders: Vec<String> = columns.iter().map(|c| format!(":{}", c)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    self.target_table,
                    columns.join(", "),
                    placeholders.join(", ")
                )
            }
            Operation::Update => {
                let join = self.join_column.as_deref().unwrap_or_default();
                let set_clause: Vec<String> = columns
                    .iter()
                    .filter(|c| **c != join)
                    .map(|c| format!("{} = :{}", c, c))
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {} = :{};",
                    self.target_table,
                    set_clause.join(", "),
                    join,
                    join
                )
            }
        }
    }
}

// ==========================================
// MappingBuilder - 组装配置，最后整体校验
// ==========================================
pub struct MappingBuilder {
    draft: MappingDraft,
}

impl MappingBuilder {
    pub fn new(target_table: &str, source_region: SourceRegion) -> Self {
        Self {
            draft: MappingDraft {
                target_table: target_table.to_string(),
                source_region,
                column_pairs: Vec::new(),
                defaults: Vec::new(),
                fk_lookups: Vec::new(),
                operation: Operation::Insert,
                join_column: None,
                primary_key: None,
                autogenerate_pk: false,
                dedup: None,
            },
        }
    }

    pub fn map(mut self, source: &str, target: &str) -> Self {
        self.draft.column_pairs.push(ColumnPair::new(source, target));
        self
    }

    pub fn default_value(mut self, column: &str, value: DefaultValue) -> Self {
        self.draft.defaults.push(DefaultEntry {
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn fk_lookup(mut self, lookup: ForeignKeyLookup) -> Self {
        self.draft.fk_lookups.push(lookup);
        self
    }

    pub fn update_on(mut self, join_column: &str) -> Self {
        self.draft.operation = Operation::Update;
        self.draft.join_column = Some(join_column.to_string());
        self
    }

    pub fn primary_key(mut self, column: &str, autogenerate: bool) -> Self {
        self.draft.primary_key = Some(column.to_string());
        self.draft.autogenerate_pk = autogenerate;
        self
    }

    pub fn dedup_on(mut self, check_column: &str) -> Self {
        self.draft.dedup = Some(DedupRule {
            check_column: check_column.to_string(),
            enabled: true,
        });
        self
    }

    pub fn build(self) -> Result<MappingSpecification, ConfigurationError> {
        MappingSpecification::try_from(self.draft)
    }
}
