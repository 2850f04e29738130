// ==========================================
// 表格导入引擎 - 记录构建器
// ==========================================
// 职责: 整合构建流程，从工作表到待写入记录
// 流程: 复核配置 → 区域提取 → 去重 → 列映射 → 默认值 → 外键回填
//       → 长度校验 → 主键剥离 → 报告
// 红线: 任一步失败整体中止，不返回部分记录
// ==========================================

use crate::config::{EngineConfigReader, ImportSettings};
use crate::domain::{
    CellValue, MappingSpecification, TableSchema, TransformationReport, TransformedRecord,
    ValueKey,
};
use crate::importer::diagnostics::{digest, DiagnosticReason, RowDiagnostic};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::lookup_resolver::LookupResolver;
use crate::importer::region_extractor::{ExtractedTable, RegionExtractor, SourceRow};
use crate::importer::sheet_source::SheetSource;
use crate::repository::LookupSource;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// 构建产出（成功时 records.len() == report.rows_emitted）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildOutput {
    pub records: Vec<TransformedRecord>,
    pub report: TransformationReport,
}

/// 去重预检结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateStats {
    pub total: usize,
    pub unique: usize,
}

impl DuplicateStats {
    pub fn duplicates(&self) -> usize {
        self.total - self.unique
    }
}

/// 按列去重：保留每个值的首次出现，保持原顺序
///
/// # 返回
/// - (保留的行, 移除的行数)
pub fn deduplicate(rows: Vec<SourceRow>, column: usize) -> (Vec<SourceRow>, usize) {
    let before = rows.len();
    let mut seen: HashSet<ValueKey> = HashSet::new();
    let kept: Vec<SourceRow> = rows
        .into_iter()
        .filter(|row| seen.insert(dedup_key(row, column)))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

fn dedup_key(row: &SourceRow, column: usize) -> ValueKey {
    row.values
        .get(column)
        .map(CellValue::dedup_key)
        .unwrap_or(ValueKey::Null)
}

// ==========================================
// RecordBuilder - 记录构建器
// ==========================================
pub struct RecordBuilder<'a, L: LookupSource + ?Sized> {
    // 外表读取（外键查找）
    lookup: &'a L,

    // 本次构建的设置快照
    settings: ImportSettings,
}

impl<'a, L: LookupSource + ?Sized> RecordBuilder<'a, L> {
    pub fn new(lookup: &'a L, config: &dyn EngineConfigReader) -> Self {
        Self {
            lookup,
            settings: config.snapshot(),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 构建待写入记录
    ///
    /// # 参数
    /// - schema: 目标表结构
    /// - source: 表格数据源
    /// - spec: 已校验的映射规格
    ///
    /// # 返回
    /// - Ok(BuildOutput): 全部记录 + 报告
    /// - Err: 配置 / 读取 / 外键 / 长度错误（无部分结果）
    pub fn build(
        &self,
        schema: &TableSchema,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
    ) -> ImportResult<BuildOutput> {
        let build_id = Uuid::new_v4().to_string();
        let span = info_span!("build", build_id = %build_id, table = %spec.target_table());
        let _guard = span.enter();

        info!(sheet = %spec.source_region().sheet, operation = ?spec.operation(), "开始构建记录");
        let result = self.run_steps(&build_id, schema, source, spec);
        match &result {
            Ok(output) => info!(
                rows_considered = output.report.rows_considered,
                rows_emitted = output.report.rows_emitted,
                duplicates_removed = output.report.duplicates_removed,
                "构建完成"
            ),
            Err(e) => warn!(kind = ?e.kind(), error = %e, "构建中止"),
        }
        result
    }

    fn run_steps(
        &self,
        build_id: &str,
        schema: &TableSchema,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
    ) -> ImportResult<BuildOutput> {
        // === 步骤 1: 复核配置（读取数据前） ===
        debug!("步骤 1: 复核映射配置");
        spec.check_disjoint()?;
        spec.validate_against(schema)?;

        // === 步骤 2: 区域提取 ===
        debug!("步骤 2: 区域提取");
        let table = self.extract(source, spec)?;
        let missing = table.missing_columns(spec.required_source_columns());
        if !missing.is_empty() {
            return Err(ImportError::ColumnsNotFound {
                sheet: table.sheet.clone(),
                columns: missing,
            });
        }
        let rows_considered = table.rows.len();

        // === 步骤 3: 去重 ===
        let (rows, duplicates_removed) = match spec.dedup() {
            Some(rule) => {
                let column = spec
                    .dedup_source_column(&table.columns)
                    .and_then(|c| table.column_index(&c))
                    .ok_or_else(|| ImportError::ColumnsNotFound {
                        sheet: table.sheet.clone(),
                        columns: vec![rule.check_column.clone()],
                    })?;
                debug!(check_column = %rule.check_column, "步骤 3: 去重");
                deduplicate(table.rows.clone(), column)
            }
            None => (table.rows.clone(), 0),
        };

        // === 步骤 4: 列映射 ===
        debug!(rows = rows.len(), "步骤 4: 列映射");
        let mut records: Vec<TransformedRecord> = rows
            .iter()
            .map(|row| {
                let mut record = TransformedRecord::new(row.sheet_row);
                for pair in spec.column_pairs() {
                    let value = table.value(row, &pair.source).cloned().unwrap_or_default();
                    record.set(&pair.target, value);
                }
                record
            })
            .collect();

        // === 步骤 5: 默认值 ===
        if !spec.defaults().is_empty() {
            debug!(defaults = spec.defaults().len(), "步骤 5: 应用默认值");
            for record in &mut records {
                for entry in spec.defaults() {
                    record.set_if_absent(&entry.column, entry.value.to_cell());
                }
            }
        }

        // === 步骤 6: 外键回填 ===
        if !spec.fk_lookups().is_empty() {
            debug!(lookups = spec.fk_lookups().len(), "步骤 6: 外键回填");
            let mut resolver = LookupResolver::new(self.lookup);
            let diagnostics = resolver.resolve(spec.fk_lookups(), &table, &rows, &mut records)?;
            if !diagnostics.is_empty() {
                return Err(ImportError::UnresolvedReference {
                    digest: digest(&diagnostics, &self.settings),
                    diagnostics,
                });
            }
        }

        // === 步骤 7: 长度校验 ===
        debug!("步骤 7: 长度校验");
        let violations = check_lengths(schema, &records);
        if !violations.is_empty() {
            return Err(ImportError::ConstraintViolation {
                digest: digest(&violations, &self.settings),
                diagnostics: violations,
            });
        }

        // === 步骤 8: 主键剥离 ===
        if let Some(pk) = spec.autogenerated_pk() {
            debug!(primary_key = pk, "步骤 8: 剥离自动生成主键");
            for record in &mut records {
                record.remove(pk);
            }
        }

        // === 步骤 9: 报告 ===
        let report = TransformationReport {
            build_id: build_id.to_string(),
            target_table: spec.target_table().to_string(),
            header_row: table.header_row,
            header_promoted: table.header_promoted,
            rows_considered,
            rows_emitted: records.len(),
            duplicates_removed,
            unresolved_fk_rows: Vec::new(),
            length_violations: Vec::new(),
        };
        Ok(BuildOutput { records, report })
    }

    /// 读取工作表并提取映射区域
    fn extract(
        &self,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
    ) -> ImportResult<ExtractedTable> {
        let region = spec.source_region();
        let grid = source.read_sheet(&region.sheet)?;
        RegionExtractor::new(&self.settings).extract(&grid, region)
    }

    /// 去重预检：统计候选列的总行数与唯一值行数，不构建记录
    ///
    /// column 可以是表格列名，也可以是映射目标列名
    pub fn duplicate_stats(
        &self,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
        column: &str,
    ) -> ImportResult<DuplicateStats> {
        let table = self.extract(source, spec)?;
        let index = table
            .column_index(column)
            .or_else(|| {
                spec.column_pairs()
                    .iter()
                    .find(|p| p.target == column)
                    .and_then(|p| table.column_index(&p.source))
            })
            .ok_or_else(|| ImportError::ColumnsNotFound {
                sheet: table.sheet.clone(),
                columns: vec![column.to_string()],
            })?;

        let total = table.rows.len();
        let (kept, _) = deduplicate(table.rows, index);
        Ok(DuplicateStats {
            total,
            unique: kept.len(),
        })
    }
}

/// 文本长度超过列上限的值（按记录顺序）
fn check_lengths(schema: &TableSchema, records: &[TransformedRecord]) -> Vec<RowDiagnostic> {
    let limits: Vec<(&str, usize)> = schema.length_limits().collect();
    if limits.is_empty() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    for record in records {
        for (column, limit) in &limits {
            let Some(value) = record.get(column) else {
                continue;
            };
            let length = value.char_len();
            if length > *limit {
                violations.push(RowDiagnostic {
                    sheet_row: record.sheet_row,
                    column: column.to_string(),
                    value: value.to_display(),
                    reason: DiagnosticReason::TooLong {
                        limit: *limit,
                        length,
                    },
                });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sheet_row: usize, values: &[CellValue]) -> SourceRow {
        SourceRow {
            sheet_row,
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_in_order() {
        let rows = vec![
            row(2, &[CellValue::from("a@x.com")]),
            row(3, &[CellValue::from("a@x.com")]),
            row(4, &[CellValue::from("b@x.com")]),
            row(5, &[CellValue::from("A@x.com")]),
        ];
        let (kept, removed) = deduplicate(rows, 0);

        assert_eq!(removed, 1);
        let kept_rows: Vec<usize> = kept.iter().map(|r| r.sheet_row).collect();
        assert_eq!(kept_rows, vec![2, 4, 5]);
    }

    #[test]
    fn test_dedup_numeric_and_null_equivalence() {
        let rows = vec![
            row(2, &[CellValue::Int(1)]),
            row(3, &[CellValue::Float(1.0)]),
            row(4, &[CellValue::Null]),
            row(5, &[CellValue::Null]),
        ];
        let (kept, removed) = deduplicate(rows, 0);

        assert_eq!(removed, 2);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rows = vec![
            row(2, &[CellValue::from("x")]),
            row(3, &[CellValue::from("x")]),
            row(4, &[CellValue::from("y")]),
        ];
        let (once, _) = deduplicate(rows, 0);
        let (twice, removed) = deduplicate(once.clone(), 0);

        assert_eq!(removed, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_check_lengths_reports_row_and_limit() {
        use crate::domain::ColumnInfo;

        let schema = TableSchema::new(
            "products",
            vec![ColumnInfo::from_declared("code", "VARCHAR(5)", false, false)],
        );
        let mut ok = TransformedRecord::new(2);
        ok.set("code", CellValue::from("ABCDE"));
        let mut long = TransformedRecord::new(3);
        long.set("code", CellValue::from("ABCDEFG"));
        let mut null = TransformedRecord::new(4);
        null.set("code", CellValue::Null);

        let violations = check_lengths(&schema, &[ok, long, null]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].sheet_row, 3);
        assert_eq!(
            violations[0].reason,
            DiagnosticReason::TooLong { limit: 5, length: 7 }
        );
    }
}
