//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：写运行日志表头、输出启动信息
//! 2. **抓取**：生成学号 → （可选）过滤已有结果 → 后台任务运行批量抓取 →
//!    定时排空进度通道 → Ctrl-C 取消（再按一次放弃当前学号）→ 写入结果表格 →
//!    输出缺失学号
//! 3. **报告**：读取结果表格并生成 Markdown 汇总
//!
//! 浏览器、验证码识别都只存在于后台任务中，本模块只轮询通道。

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::ChromiumDriver;
use crate::models::{
    generate_identifiers, parse_identifier_list, BatchResult, Identifier, IdentifierRangeError,
    StudentRecord,
};
use crate::orchestrator::batch_runner::{filter_missing, BatchRunner};
use crate::orchestrator::progress::{progress_channels, ProgressReceivers};
use crate::services::{
    parse_student_result, ColorIsolationSolver, ReportBuilder, ResultStore, TesseractOcr,
};
use crate::utils::logging::{
    append_log_lines, init_log_file, log_run_plan, log_startup, print_final_stats, truncate_text,
};
use crate::workflow::{FetchFlow, FetchSettings};

/// 进度通道排空间隔
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// 学号来源
#[derive(Debug, Clone)]
pub enum IdentifierSource {
    /// 前缀 + 闭区间编号
    Range { base: String, start: u32, end: u32 },
    /// 手工给出的列表（逗号或换行分隔）
    List(String),
}

/// 一次抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source: IdentifierSource,
    /// 只抓结果表格中还没有的学号，并追加写入
    pub missing_only: bool,
}

impl FetchRequest {
    pub fn identifiers(&self) -> Result<Vec<Identifier>, IdentifierRangeError> {
        match &self.source {
            IdentifierSource::Range { base, start, end } => {
                generate_identifiers(base, *start, *end)
            }
            IdentifierSource::List(text) => Ok(parse_identifier_list(text)),
        }
    }
}

type WorkerHandle = JoinHandle<Result<(BatchResult, Vec<StudentRecord>), AppError>>;

/// 收集成功页面的解析结果；解析失败的学号记为缺失
#[derive(Debug, Default)]
struct RecordSink {
    records: Vec<StudentRecord>,
    unparsed: Vec<Identifier>,
}

impl RecordSink {
    fn accept(&mut self, identifier: &Identifier, html: &str) {
        match parse_student_result(html) {
            Ok(record) => self.records.push(record),
            Err(e) => {
                warn!(
                    "[USN {}] ⚠️ 结果解析失败: {} ({})",
                    identifier,
                    e,
                    truncate_text(html, 80)
                );
                self.unparsed.push(identifier.clone());
            }
        }
    }

    fn finish(self, result: &mut BatchResult) -> Vec<StudentRecord> {
        for identifier in &self.unparsed {
            result.mark_missing(identifier);
        }
        self.records
    }
}

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 抓取一批学号并写入结果表格
    pub async fn run_fetch(&self, request: FetchRequest) -> Result<BatchResult> {
        let store = ResultStore::new(&self.config.output_file);
        let mut identifiers = request.identifiers()?;
        let requested = identifiers.len();

        if request.missing_only {
            match store.known_identifiers() {
                Ok(known) => identifiers = filter_missing(identifiers, &known),
                Err(e) => warn!("⚠️ 读取已有结果失败，将抓取全部学号: {}", e),
            }
        }

        log_run_plan(
            identifiers.len(),
            requested - identifiers.len(),
            &self.config.output_file,
        );
        if identifiers.is_empty() {
            info!("✓ 所有学号均已有结果，无需抓取");
            return Ok(BatchResult::new());
        }

        let cancel = CancellationToken::new();
        let abort = CancellationToken::new();
        let (worker, mut receivers) = self.spawn_worker(identifiers, cancel.clone(), abort.clone());
        let (result, records) = self
            .supervise(worker, &mut receivers, &cancel, &abort)
            .await?;

        let mut summary = Vec::new();
        if records.is_empty() {
            summary.push("No results to save.".to_string());
        } else {
            store
                .merge(&records, request.missing_only)
                .with_context(|| format!("写入结果表格失败: {}", self.config.output_file))?;
            summary.push(format!("Results saved to: {}", self.config.output_file));
        }
        if let Some(line) = result.missing_line() {
            summary.push(line);
        }
        for line in &summary {
            println!("{}", line);
        }
        append_log_lines(&self.config.output_log_file, &summary)?;

        print_final_stats(&result, &self.config.output_log_file);
        Ok(result)
    }

    /// 在后台任务中运行批量抓取，返回任务句柄和进度通道
    fn spawn_worker(
        &self,
        identifiers: Vec<Identifier>,
        cancel: CancellationToken,
        abort: CancellationToken,
    ) -> (WorkerHandle, ProgressReceivers) {
        let (mut observer, receivers) = progress_channels();
        let config = self.config.clone();

        let worker = tokio::spawn(async move {
            let runner = BatchRunner::new(FetchFlow::new(FetchSettings::from_config(&config)))
                .with_abort(abort);
            let solver = ColorIsolationSolver::new(
                TesseractOcr::new(&config.tesseract_binary)
                    .with_extra_args(config.tesseract_args.clone()),
            );
            let mut sink = RecordSink::default();

            let mut result = runner
                .run(
                    identifiers,
                    || ChromiumDriver::launch(&config),
                    &solver,
                    &cancel,
                    &mut observer,
                    |identifier, html| sink.accept(identifier, html),
                )
                .await?;
            let records = sink.finish(&mut result);
            Ok::<_, AppError>((result, records))
        });

        (worker, receivers)
    }

    /// 轮询进度通道直到后台任务结束
    ///
    /// 第一次 Ctrl-C 在当前学号完成后停止；第二次放弃当前学号，
    /// 后台任务关闭浏览器后结束。
    async fn supervise(
        &self,
        mut worker: WorkerHandle,
        receivers: &mut ProgressReceivers,
        cancel: &CancellationToken,
        abort: &CancellationToken,
    ) -> Result<(BatchResult, Vec<StudentRecord>)> {
        let mut tick = tokio::time::interval(DRAIN_INTERVAL);
        let joined = loop {
            tokio::select! {
                joined = &mut worker => break joined,
                _ = tick.tick() => self.flush_progress(receivers)?,
                signal = tokio::signal::ctrl_c(), if !abort.is_cancelled() => {
                    if signal.is_ok() {
                        escalate_interrupt(cancel, abort);
                    }
                }
            }
        };
        self.flush_progress(receivers)?;

        let outcome = joined.map_err(|e| AppError::Worker(e.to_string()))??;
        Ok(outcome)
    }

    /// 输出已到达的进度行，同时写入运行日志
    fn flush_progress(&self, receivers: &mut ProgressReceivers) -> Result<()> {
        let (lines, percent) = receivers.drain();
        for line in &lines {
            println!("{}", line);
        }
        append_log_lines(&self.config.output_log_file, &lines)?;
        if let Some(p) = percent {
            debug!("📈 进度 {}%", p);
        }
        Ok(())
    }

    /// 读取结果表格生成 Markdown 报告
    pub fn run_report(&self, input: &Path, output: &Path) -> Result<()> {
        let sheet = ResultStore::new(input)
            .load()
            .with_context(|| format!("读取结果表格失败: {}", input.display()))?;
        let builder = ReportBuilder::new(self.config.fail_threshold, self.config.top_n);
        let report = builder.build(&sheet.records())?;
        std::fs::write(output, report)
            .with_context(|| format!("写入报告失败: {}", output.display()))?;
        info!("📄 报告已生成: {}", output.display());
        Ok(())
    }
}

/// Ctrl-C 升级：先停止后续学号，再放弃当前学号
fn escalate_interrupt(cancel: &CancellationToken, abort: &CancellationToken) {
    if cancel.is_cancelled() {
        warn!("🛑 再次收到 Ctrl-C，放弃当前学号");
        abort.cancel();
    } else {
        warn!("🛑 收到 Ctrl-C，当前学号完成后停止（再按一次立即中止）");
        cancel.cancel();
    }
}
