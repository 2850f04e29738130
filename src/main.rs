// ==========================================
// 表格导入引擎 - 命令行入口
// ==========================================
// 职责: 参数解析 → 配置加载 → 调用引擎 → 输出 JSON 报告
// 红线: 业务逻辑全部在库内，这里只做组装
// ==========================================

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{Cli, Command, ImportArgs};
use serde::Serialize;
use sheet_importer::logging::{self, LogFormat};
use sheet_importer::{
    open_source, ConfigManager, ImportError, MappingSpecification, SqliteTableGateway,
    TableImporter,
};
use std::fs;
use std::path::Path;
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });
    info!("{} v{}", sheet_importer::APP_NAME, sheet_importer::VERSION);

    let result = dispatch(cli.command);
    if let Err(e) = &result {
        error!(error = %e, "命令执行失败");
    }
    result
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Tables { db } => {
            let importer = open_importer(&db, None)?;
            print_json(&importer.list_tables()?)
        }
        Command::Describe { db, table } => {
            let importer = open_importer(&db, None)?;
            print_json(&importer.describe_table(&table)?)
        }
        Command::Preview(args) => {
            let (importer, spec) = prepare(&args)?;
            let mut source = open_source(&args.source)?;
            print_json(&importer.preview(source.as_mut(), &spec)?)
        }
        Command::Run(args) => {
            let (importer, spec) = prepare(&args)?;
            let mut source = open_source(&args.source)?;
            print_json(&importer.execute(source.as_mut(), &spec)?)
        }
        Command::Duplicates { import, column } => {
            let (importer, spec) = prepare(&import)?;
            let mut source = open_source(&import.source)?;
            print_json(&importer.duplicate_stats(source.as_mut(), &spec, &column)?)
        }
    }
}

/// 打开数据库并按 默认值 → 设置文件 → config_kv 加载配置
fn open_importer(db: &Path, settings: Option<&Path>) -> Result<TableImporter<SqliteTableGateway>> {
    let db_path = db
        .to_str()
        .ok_or_else(|| anyhow!("数据库路径不是有效的 UTF-8: {}", db.display()))?;
    let gateway = SqliteTableGateway::new(db_path)
        .with_context(|| format!("无法打开数据库: {}", db.display()))?;

    let mut config = ConfigManager::new();
    if let Some(path) = settings {
        config = config.with_json_file(path)?;
    }
    {
        let conn = gateway.connection();
        let guard = conn
            .lock()
            .map_err(|e| anyhow!("数据库锁获取失败: {}", e))?;
        config = config.with_connection_overrides(&guard)?;
    }

    Ok(TableImporter::new(gateway, &config))
}

fn prepare(args: &ImportArgs) -> Result<(TableImporter<SqliteTableGateway>, MappingSpecification)> {
    let importer = open_importer(&args.db, args.settings.as_deref())?;
    let spec = load_mapping(&args.mapping)?;
    Ok((importer, spec))
}

/// 读取映射规格（反序列化即整体校验）
fn load_mapping(path: &Path) -> Result<MappingSpecification> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("无法读取映射文件: {}", path.display()))?;
    let spec = serde_json::from_str(&raw).map_err(ImportError::from)?;
    Ok(spec)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
