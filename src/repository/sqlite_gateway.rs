// ==========================================
// 表格导入引擎 - SQLite 持久化网关实现
// ==========================================
// 职责: 实现 TableGateway（使用 rusqlite）
// 红线: 批量写入必须事务化，失败整体回滚，不做自动重试
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{CellValue, ColumnInfo, TransformedRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::table_gateway::{LookupSource, TableGateway};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

static NULL_CELL: CellValue = CellValue::Null;

// ==========================================
// CellValue <-> SQLite 值转换
// ==========================================
impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CellValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            CellValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            // 日期交给 rusqlite 的 chrono 转换（ISO 8601 文本）
            CellValue::Date(d) => d.to_sql()?,
            CellValue::DateTime(dt) => dt.to_sql()?,
        })
    }
}

/// SQLite 读出值 → CellValue（BLOB 按 UTF-8 宽松解码）
pub fn cell_from_sql(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Int(i),
        ValueRef::Real(f) => CellValue::from(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// 标识符加双引号转义
fn quote_ident(name: &str) -> RepositoryResult<String> {
    if name.trim().is_empty() {
        return Err(RepositoryError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

// ==========================================
// SqliteTableGateway
// ==========================================
pub struct SqliteTableGateway {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTableGateway {
    /// 创建新的网关实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 共享连接（供配置管理器等复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl LookupSource for SqliteTableGateway {
    #[instrument(skip(self))]
    fn fetch_lookup_values(
        &self,
        table: &str,
        id_column: &str,
        label_column: &str,
    ) -> RepositoryResult<Vec<(CellValue, CellValue)>> {
        let sql = format!(
            "SELECT {}, {} FROM {}",
            quote_ident(id_column)?,
            quote_ident(label_column)?,
            quote_ident(table)?
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((cell_from_sql(row.get_ref(0)?), cell_from_sql(row.get_ref(1)?)))
        })?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        debug!(count = values.len(), "外表查找值读取完成");
        Ok(values)
    }
}

impl TableGateway for SqliteTableGateway {
    fn list_tables(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }
        tables.sort_by_key(|t| t.to_lowercase());
        Ok(tables)
    }

    fn get_columns(&self, table: &str) -> RepositoryResult<Vec<ColumnInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )?;
        let rows = stmt.query_map(params![table], |row| {
            let name: String = row.get(0)?;
            let declared: String = row.get(1)?;
            let not_null: i64 = row.get(2)?;
            let pk: i64 = row.get(3)?;
            Ok(ColumnInfo::from_declared(&name, &declared, not_null == 0, pk > 0))
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        if columns.is_empty() {
            return Err(RepositoryError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    fn execute_insert(
        &self,
        table: &str,
        records: &[TransformedRecord],
        autogenerate_pk: bool,
        primary_key: Option<&str>,
    ) -> RepositoryResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        // 列清单 = 所有记录列的并集（按首次出现顺序）
        let stripped = if autogenerate_pk { primary_key } else { None };
        let mut columns: Vec<&str> = Vec::new();
        for record in records {
            for column in record.columns() {
                if Some(column) != stripped && !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }

        let quoted: Vec<String> = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<RepositoryResult<_>>()?;
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)?)
        } else {
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table)?,
                quoted.join(", "),
                placeholders.join(", ")
            )
        };
        debug!(sql = %sql, "批量插入语句");

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let values = columns
                    .iter()
                    .map(|c| record.get(c).unwrap_or(&NULL_CELL));
                stmt.execute(params_from_iter(values))?;
                count += 1;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(table = %table, inserted = count, "批量插入完成");
        Ok(count)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    fn execute_update(
        &self,
        table: &str,
        records: &[TransformedRecord],
        join_column: &str,
    ) -> RepositoryResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let quoted_table = quote_ident(table)?;
        let quoted_join = quote_ident(join_column)?;

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut affected = 0;
        for (index, record) in records.iter().enumerate() {
            let join_value = record
                .get(join_column)
                .ok_or_else(|| RepositoryError::MissingJoinValue {
                    index,
                    column: join_column.to_string(),
                })?;

            let set_columns: Vec<&str> = record.columns().filter(|c| *c != join_column).collect();
            if set_columns.is_empty() {
                continue;
            }
            let set_clause: Vec<String> = set_columns
                .iter()
                .enumerate()
                .map(|(i, c)| quote_ident(c).map(|q| format!("{} = ?{}", q, i + 1)))
                .collect::<RepositoryResult<_>>()?;
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                quoted_table,
                set_clause.join(", "),
                quoted_join,
                set_columns.len() + 1
            );

            let mut stmt = tx.prepare_cached(&sql)?;
            let values = set_columns
                .iter()
                .map(|c| record.get(c).unwrap_or(&NULL_CELL))
                .chain(std::iter::once(join_value));
            affected += stmt.execute(params_from_iter(values))?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(table = %table, affected = affected, "批量更新完成");
        Ok(affected)
    }
}
