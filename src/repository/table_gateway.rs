// ==========================================
// 表格导入引擎 - 持久化网关 Trait
// ==========================================
// 职责: 定义引擎所需的数据库能力（不包含实现）
// 红线: 网关不含映射规则，只做结构探查 / 查找 / 批量写入
// ==========================================

use crate::domain::{CellValue, ColumnInfo, TransformedRecord};
use crate::repository::error::RepositoryResult;

// ==========================================
// LookupSource Trait
// ==========================================
// 用途: 外键查找时读取 (ID, 标签) 对
// 实现者: SqliteTableGateway
pub trait LookupSource {
    /// 读取外表全部 (ID, 标签) 对
    ///
    /// # 参数
    /// - table: 外表名
    /// - id_column: ID 列
    /// - label_column: 标签（可读描述）列
    fn fetch_lookup_values(
        &self,
        table: &str,
        id_column: &str,
        label_column: &str,
    ) -> RepositoryResult<Vec<(CellValue, CellValue)>>;
}

// ==========================================
// TableGateway Trait
// ==========================================
// 用途: 目标表结构探查 + 批量写入
// 实现者: SqliteTableGateway（使用 rusqlite）
pub trait TableGateway: LookupSource {
    /// 列出所有用户表（按名称不区分大小写排序）
    fn list_tables(&self) -> RepositoryResult<Vec<String>>;

    /// 读取目标表列信息（含主键与最大长度）
    fn get_columns(&self, table: &str) -> RepositoryResult<Vec<ColumnInfo>>;

    /// 批量插入（事务化：全部成功或全部回滚）
    ///
    /// # 返回
    /// - Ok(usize): 插入的记录数
    fn execute_insert(
        &self,
        table: &str,
        records: &[TransformedRecord],
        autogenerate_pk: bool,
        primary_key: Option<&str>,
    ) -> RepositoryResult<usize>;

    /// 批量更新（每条记录一条 UPDATE，按关联列匹配；事务化）
    ///
    /// # 返回
    /// - Ok(usize): 实际受影响的行数
    fn execute_update(
        &self,
        table: &str,
        records: &[TransformedRecord],
        join_column: &str,
    ) -> RepositoryResult<usize>;
}
