// ==========================================
// 表格导入引擎 - 外键查找解析器
// ==========================================
// 职责: 标签 → ID 缓存构建 + 逐行外键回填
// 红线:
// - 每个 (外表, ID 列, 标签列) 三元组每次构建只读取一次（快照语义）
// - 不同 ID 折叠到同一标签 → 整体失败，不带歧义继续
// - 只读外表，不做任何写入
// ==========================================

use crate::domain::{CellValue, ForeignKeyLookup, LookupKey, TransformedRecord};
use crate::importer::cell_normalizer::lookup_key;
use crate::importer::diagnostics::{DiagnosticReason, RowDiagnostic};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::region_extractor::{ExtractedTable, SourceRow};
use crate::repository::LookupSource;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

/// 单个三元组的标签缓存（标准化标签 → ID）
pub type LabelCache = HashMap<String, CellValue>;

// ==========================================
// LookupResolver - 作用域为一次构建
// ==========================================
pub struct LookupResolver<'a, L: LookupSource + ?Sized> {
    source: &'a L,
    caches: HashMap<LookupKey, LabelCache>,
}

impl<'a, L: LookupSource + ?Sized> LookupResolver<'a, L> {
    pub fn new(source: &'a L) -> Self {
        Self {
            source,
            caches: HashMap::new(),
        }
    }

    /// 已加载的三元组数量
    pub fn loaded(&self) -> usize {
        self.caches.len()
    }

    /// 预加载所有外键查找涉及的三元组
    ///
    /// # 错误
    /// - AmbiguousReference: 同一标签对应多个 ID
    /// - Persistence: 外表读取失败
    pub fn prepare(&mut self, lookups: &[ForeignKeyLookup]) -> ImportResult<()> {
        for lookup in lookups {
            let key = lookup.lookup_key();
            if self.caches.contains_key(&key) {
                continue;
            }
            let cache = self.load(&key)?;
            self.caches.insert(key, cache);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    fn load(&self, key: &LookupKey) -> ImportResult<LabelCache> {
        let pairs = self
            .source
            .fetch_lookup_values(&key.table, &key.id_column, &key.label_column)?;

        let mut cache = LabelCache::new();
        let mut duplicates = BTreeSet::new();
        for (id, label) in &pairs {
            // 空 ID 不可作为回填值
            if id.is_null() {
                continue;
            }
            let Some(normalized) = lookup_key(label) else {
                continue;
            };
            match cache.get(&normalized) {
                None => {
                    cache.insert(normalized, id.clone());
                }
                Some(existing) if existing != id => {
                    duplicates.insert(label.to_string());
                }
                Some(_) => {}
            }
        }

        if !duplicates.is_empty() {
            return Err(ImportError::AmbiguousReference {
                table: key.table.clone(),
                label_column: key.label_column.clone(),
                labels: duplicates.into_iter().collect(),
            });
        }

        debug!(pairs = pairs.len(), labels = cache.len(), "查找缓存已加载");
        Ok(cache)
    }

    /// 按标签解析 ID（未加载 / 空值 / 不存在 → None）
    pub fn resolve_label(&self, key: &LookupKey, value: &CellValue) -> Option<&CellValue> {
        let normalized = lookup_key(value)?;
        self.caches.get(key)?.get(&normalized)
    }

    /// 逐行回填外键目标列
    ///
    /// rows 与 records 一一对应（同序）；返回全部行级诊断，
    /// 非空时调用方必须整体中止。
    pub fn resolve(
        &mut self,
        lookups: &[ForeignKeyLookup],
        table: &ExtractedTable,
        rows: &[SourceRow],
        records: &mut [TransformedRecord],
    ) -> ImportResult<Vec<RowDiagnostic>> {
        self.prepare(lookups)?;

        let mut diagnostics = Vec::new();
        for (row, record) in rows.iter().zip(records.iter_mut()) {
            for lookup in lookups {
                let raw = table
                    .value(row, &lookup.source_column)
                    .cloned()
                    .unwrap_or_default();

                if lookup_key(&raw).is_none() {
                    diagnostics.push(RowDiagnostic {
                        sheet_row: row.sheet_row,
                        column: lookup.source_column.clone(),
                        value: None,
                        reason: DiagnosticReason::EmptyReference {
                            target: lookup.target_column.clone(),
                        },
                    });
                    continue;
                }

                match self.resolve_label(&lookup.lookup_key(), &raw) {
                    Some(id) => record.set(&lookup.target_column, id.clone()),
                    None => diagnostics.push(RowDiagnostic {
                        sheet_row: row.sheet_row,
                        column: lookup.source_column.clone(),
                        value: raw.to_display(),
                        reason: DiagnosticReason::ReferenceNotFound {
                            table: lookup.foreign_table.clone(),
                            label_column: lookup.foreign_label_column.clone(),
                            target: lookup.target_column.clone(),
                        },
                    }),
                }
            }
        }
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryResult;
    use std::cell::Cell;

    /// 计数的内存查找源
    struct FakeLookup {
        pairs: Vec<(CellValue, CellValue)>,
        calls: Cell<usize>,
    }

    impl FakeLookup {
        fn new(pairs: Vec<(i64, &str)>) -> Self {
            Self::with_cells(
                pairs
                    .into_iter()
                    .map(|(id, label)| (CellValue::Int(id), CellValue::from(label)))
                    .collect(),
            )
        }

        fn with_cells(pairs: Vec<(CellValue, CellValue)>) -> Self {
            Self {
                pairs,
                calls: Cell::new(0),
            }
        }
    }

    impl LookupSource for FakeLookup {
        fn fetch_lookup_values(
            &self,
            _table: &str,
            _id_column: &str,
            _label_column: &str,
        ) -> RepositoryResult<Vec<(CellValue, CellValue)>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.pairs.clone())
        }
    }

    fn country_lookup(target: &str) -> ForeignKeyLookup {
        ForeignKeyLookup::new(target, "Country", "countries", "id", "name")
    }

    fn table(values: &[&str]) -> (ExtractedTable, Vec<SourceRow>) {
        let rows: Vec<SourceRow> = values
            .iter()
            .enumerate()
            .map(|(i, v)| SourceRow {
                sheet_row: i + 2,
                values: vec![CellValue::from(*v)],
            })
            .collect();
        let table = ExtractedTable {
            sheet: "Clients".to_string(),
            columns: vec!["Country".to_string()],
            rows: rows.clone(),
            header_row: 1,
            header_promoted: false,
        };
        (table, rows)
    }

    #[test]
    fn test_case_variant_labels_are_ambiguous() {
        let source = FakeLookup::new(vec![(1, "Brazil"), (2, "brazil")]);
        let mut resolver = LookupResolver::new(&source);
        let err = resolver.prepare(&[country_lookup("country_id")]).unwrap_err();

        match err {
            ImportError::AmbiguousReference {
                table,
                label_column,
                labels,
            } => {
                assert_eq!(table, "countries");
                assert_eq!(label_column, "name");
                assert_eq!(labels, vec!["brazil".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_same_id_repeated_is_not_ambiguous() {
        let source = FakeLookup::new(vec![(1, "Brazil"), (1, " BRAZIL "), (3, "")]);
        let mut resolver = LookupResolver::new(&source);
        resolver.prepare(&[country_lookup("country_id")]).unwrap();

        let key = country_lookup("country_id").lookup_key();
        assert_eq!(
            resolver.resolve_label(&key, &CellValue::from("brazil")),
            Some(&CellValue::Int(1))
        );
    }

    #[test]
    fn test_each_triple_loaded_once() {
        let source = FakeLookup::new(vec![(1, "Brazil"), (2, "Chile")]);
        let mut resolver = LookupResolver::new(&source);
        resolver
            .prepare(&[country_lookup("country_id"), country_lookup("birth_country_id")])
            .unwrap();

        assert_eq!(source.calls.get(), 1);
        assert_eq!(resolver.loaded(), 1);
    }

    #[test]
    fn test_resolve_fills_targets_and_reports_misses() {
        let source = FakeLookup::new(vec![(1, "Brazil"), (2, "Chile")]);
        let (table, rows) = table(&[" chile", "Peru", ""]);
        let mut records: Vec<TransformedRecord> =
            rows.iter().map(|r| TransformedRecord::new(r.sheet_row)).collect();

        let mut resolver = LookupResolver::new(&source);
        let diagnostics = resolver
            .resolve(&[country_lookup("country_id")], &table, &rows, &mut records)
            .unwrap();

        assert_eq!(records[0].get("country_id"), Some(&CellValue::Int(2)));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].sheet_row, 3);
        assert_eq!(diagnostics[0].value.as_deref(), Some("Peru"));
        assert!(matches!(
            diagnostics[1].reason,
            DiagnosticReason::EmptyReference { .. }
        ));
        assert_eq!(diagnostics[1].sheet_row, 4);
    }

    #[test]
    fn test_null_ids_are_not_cached() {
        let source = FakeLookup::with_cells(vec![
            (CellValue::Null, CellValue::from("Brazil")),
            (CellValue::Int(2), CellValue::from("Chile")),
        ]);
        let (table, rows) = table(&["Brazil", "Chile"]);
        let mut records: Vec<TransformedRecord> =
            rows.iter().map(|r| TransformedRecord::new(r.sheet_row)).collect();

        let mut resolver = LookupResolver::new(&source);
        let diagnostics = resolver
            .resolve(&[country_lookup("country_id")], &table, &rows, &mut records)
            .unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].sheet_row, 2);
        assert!(matches!(
            diagnostics[0].reason,
            DiagnosticReason::ReferenceNotFound { .. }
        ));
        assert!(records[0].get("country_id").is_none());
        assert_eq!(records[1].get("country_id"), Some(&CellValue::Int(2)));
    }

    #[test]
    fn test_null_id_does_not_collide_with_real_id() {
        let source = FakeLookup::with_cells(vec![
            (CellValue::Null, CellValue::from("Brazil")),
            (CellValue::Int(1), CellValue::from("brazil")),
        ]);
        let mut resolver = LookupResolver::new(&source);
        resolver.prepare(&[country_lookup("country_id")]).unwrap();

        let key = country_lookup("country_id").lookup_key();
        assert_eq!(
            resolver.resolve_label(&key, &CellValue::from("BRAZIL")),
            Some(&CellValue::Int(1))
        );
    }
}
