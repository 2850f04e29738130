// ==========================================
// 表格导入引擎 - 数据仓储层（持久化网关）
// ==========================================
// 红线: 仓储不含映射规则
// ==========================================
// 职责: 目标表结构探查 / 外键查找值读取 / 批量 INSERT、UPDATE
// 约束: 所有值使用参数化绑定，标识符统一转义
// ==========================================

pub mod error;
pub mod sqlite_gateway;
pub mod table_gateway;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use sqlite_gateway::SqliteTableGateway;
pub use table_gateway::{LookupSource, TableGateway};
