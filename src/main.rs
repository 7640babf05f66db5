use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use vtu_results::orchestrator::{App, FetchRequest, IdentifierSource};
use vtu_results::{logger, Config};

/// VTU 成绩批量抓取
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML 配置文件（环境变量优先级更高）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 按学号范围抓取成绩
    Fetch {
        /// 学号前缀，例如 1CR24BA
        #[arg(required_unless_present = "usns")]
        base: Option<String>,
        /// 起始编号
        #[arg(required_unless_present = "usns")]
        start: Option<u32>,
        /// 结束编号（含）
        #[arg(required_unless_present = "usns")]
        end: Option<u32>,
        /// 只抓取结果表格中还没有的学号
        #[arg(long)]
        missing_only: bool,
        /// 直接给出学号列表（逗号或换行分隔），代替范围
        #[arg(long)]
        usns: Option<String>,
        /// 结果表格路径
        #[arg(short, long)]
        output: Option<String>,
        /// 显示浏览器窗口
        #[arg(long)]
        headed: bool,
    },
    /// 从结果表格生成汇总报告
    Report {
        /// 结果表格
        input: PathBuf,
        /// Markdown 输出路径
        #[arg(short, long, default_value = "report.md")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?.apply_env(),
        None => Config::from_env(),
    };

    // 初始化日志
    logger::init(config.verbose_logging);

    match cli.command {
        Command::Fetch {
            base,
            start,
            end,
            missing_only,
            usns,
            output,
            headed,
        } => {
            if let Some(output) = output {
                config.output_file = output;
            }
            if headed {
                config.headless = false;
            }
            let source = match (usns, base, start, end) {
                (Some(list), ..) => IdentifierSource::List(list),
                (None, Some(base), Some(start), Some(end)) => {
                    IdentifierSource::Range { base, start, end }
                }
                _ => bail!("需要学号前缀和编号范围，或使用 --usns"),
            };

            let app = App::initialize(config)?;
            app.run_fetch(FetchRequest {
                source,
                missing_only,
            })
            .await?;
        }
        Command::Report { input, output } => {
            let app = App::initialize(config)?;
            app.run_report(&input, &output)?;
        }
    }

    Ok(())
}
