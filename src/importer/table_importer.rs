// ==========================================
// 表格导入引擎 - 表导入编排
// ==========================================
// 职责: 目标表探查 / 预览（只构建不写入）/ 执行（构建后批量写入）
// 红线: 写入失败原样上抛，不自动重试；空记录集不触发写入
// ==========================================

use crate::config::{EngineConfigReader, ImportSettings};
use crate::domain::{
    ConfigurationError, MappingSpecification, Operation, TableSchema, TransformationReport,
    TransformedRecord,
};
use crate::importer::error::ImportResult;
use crate::importer::record_builder::{BuildOutput, DuplicateStats, RecordBuilder};
use crate::importer::sheet_source::SheetSource;
use crate::repository::TableGateway;
use serde::Serialize;
use tracing::{info, instrument};

/// 预览结果：记录 + 报告 + SQL 形态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPreview {
    pub records: Vec<TransformedRecord>,
    pub report: TransformationReport,
    pub sql: String,
}

/// 执行结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub report: TransformationReport,
    pub affected: usize,
}

// ==========================================
// TableImporter - 表导入编排器
// ==========================================
pub struct TableImporter<G: TableGateway> {
    // 持久化网关
    gateway: G,

    // 设置快照
    settings: ImportSettings,
}

impl<G: TableGateway> TableImporter<G> {
    pub fn new(gateway: G, config: &dyn EngineConfigReader) -> Self {
        Self {
            gateway,
            settings: config.snapshot(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 列出可导入的目标表
    pub fn list_tables(&self) -> ImportResult<Vec<String>> {
        Ok(self.gateway.list_tables()?)
    }

    /// 读取目标表结构
    pub fn describe_table(&self, table: &str) -> ImportResult<TableSchema> {
        let columns = self.gateway.get_columns(table)?;
        Ok(TableSchema::new(table, columns))
    }

    /// 只构建不写入
    #[instrument(skip(self, source, spec), fields(table = %spec.target_table()))]
    pub fn preview(
        &self,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
    ) -> ImportResult<BuildPreview> {
        let BuildOutput { records, report } = self.build(source, spec)?;
        Ok(BuildPreview {
            records,
            report,
            sql: spec.sql_preview(),
        })
    }

    /// 构建并写入
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 报告 + 受影响行数
    /// - Err(ImportError::Persistence): 网关失败（已整体回滚）
    #[instrument(skip(self, source, spec), fields(table = %spec.target_table()))]
    pub fn execute(
        &self,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
    ) -> ImportResult<ImportOutcome> {
        let BuildOutput { records, report } = self.build(source, spec)?;

        if records.is_empty() {
            info!("无待写入记录，跳过写入");
            return Ok(ImportOutcome {
                report,
                affected: 0,
            });
        }

        let affected = match spec.operation() {
            Operation::Insert => self.gateway.execute_insert(
                spec.target_table(),
                &records,
                spec.autogenerate_pk(),
                spec.primary_key(),
            )?,
            Operation::Update => {
                let join = spec
                    .join_column()
                    .ok_or(ConfigurationError::JoinColumnRequired)?;
                self.gateway
                    .execute_update(spec.target_table(), &records, join)?
            }
        };

        info!(
            build_id = %report.build_id,
            operation = ?spec.operation(),
            affected,
            "写入完成"
        );
        Ok(ImportOutcome { report, affected })
    }

    /// 去重预检
    pub fn duplicate_stats(
        &self,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
        column: &str,
    ) -> ImportResult<DuplicateStats> {
        RecordBuilder::new(&self.gateway, &self.settings).duplicate_stats(source, spec, column)
    }

    fn build(
        &self,
        source: &mut dyn SheetSource,
        spec: &MappingSpecification,
    ) -> ImportResult<BuildOutput> {
        let schema = self.describe_table(spec.target_table())?;
        RecordBuilder::new(&self.gateway, &self.settings).build(&schema, source, spec)
    }
}
