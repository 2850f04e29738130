// ==========================================
// 表格导入引擎 - 命令行定义
// ==========================================
// 职责: 子命令与参数（clap derive）
// 红线: 只做参数声明，不含任何导入逻辑
// ==========================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// 表格导入引擎命令行
#[derive(Parser)]
#[command(
    name = "sheet-importer",
    about = "将电子表格按映射规格导入 SQLite 目标表",
    version
)]
pub struct Cli {
    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// 列出数据库中的用户表
    Tables {
        /// SQLite 数据库路径
        #[arg(long)]
        db: PathBuf,
    },

    /// 显示目标表的列结构
    Describe {
        /// SQLite 数据库路径
        #[arg(long)]
        db: PathBuf,

        /// 目标表名
        #[arg(long)]
        table: String,
    },

    /// 构建记录并输出报告，不写入数据库
    Preview(ImportArgs),

    /// 构建记录并写入数据库
    Run(ImportArgs),

    /// 统计候选去重列的总行数与唯一行数
    Duplicates {
        #[command(flatten)]
        import: ImportArgs,

        /// 候选列（表格列名或映射目标列名）
        #[arg(long)]
        column: String,
    },
}

/// 导入类命令的公共参数
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// SQLite 数据库路径
    #[arg(long)]
    pub db: PathBuf,

    /// 表格文件（.xlsx/.xlsm/.xlsb/.xls/.ods/.csv）
    #[arg(long)]
    pub source: PathBuf,

    /// 映射规格 JSON 文件
    #[arg(long)]
    pub mapping: PathBuf,

    /// 导入设置 JSON 文件（可选）
    #[arg(long)]
    pub settings: Option<PathBuf>,
}
