use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供运行日志文件和横幅输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;

use crate::config::Config;
use crate::models::BatchResult;

/// 初始化运行日志文件（覆盖写入表头）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n成绩抓取日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 向运行日志追加若干行
pub fn append_log_lines(log_file_path: &str, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - VTU 成绩抓取");
    info!("🌐 查询页面: {}", config.base_url);
    info!(
        "🔁 重试上限: 外层 {} 次 / 验证码 {} 次",
        config.max_retries, config.max_captcha_retries
    );
    info!("{}", "=".repeat(60));
}

/// 记录本次运行计划
///
/// # 参数
/// - `total`: 待抓取学号数
/// - `skipped`: "只抓缺失"模式下跳过的已有学号数
/// - `output`: 结果表格路径
pub fn log_run_plan(total: usize, skipped: usize, output: &str) {
    info!("✓ 待抓取 {} 个学号", total);
    if skipped > 0 {
        info!("📋 已跳过 {} 个已有结果的学号", skipped);
    }
    info!("💾 结果将写入: {}\n", output);
}

/// 打印最终统计信息
pub fn print_final_stats(result: &BatchResult, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", result.success_count(), result.len());
    info!("❌ 失败: {}", result.failed().len());
    if result.cancelled {
        info!("🛑 运行被用户中止");
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 5), "短文本");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
    }

    #[test]
    fn test_log_file_header_then_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        append_log_lines(path, &["Finished.".to_string()]).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("成绩抓取日志"));
        assert!(content.ends_with("Finished.\n"));
    }
}
