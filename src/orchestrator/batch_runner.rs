//! 批量运行器 - 编排层
//!
//! ## 职责
//!
//! 1. 按顺序逐个学号调用 [`FetchFlow`]（同一浏览器会话，严格串行）
//! 2. 每个学号开始前检查取消信号
//! 3. 每个学号前后通知进度
//! 4. 无论正常结束、中止、强制中止还是 panic，驱动只关闭一次并发出 `Finished`
//!
//! 成功的 HTML 通过 `on_success` 交给调用方，持久化不在本层。

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, DriverError};
use crate::infrastructure::SessionDriver;
use crate::models::{dedupe_preserving_order, BatchResult, Identifier};
use crate::orchestrator::progress::{ProgressEvent, ProgressObserver};
use crate::services::CaptchaSolver;
use crate::workflow::{FetchCtx, FetchFlow};

/// 批量运行器
pub struct BatchRunner {
    flow: FetchFlow,
    /// 强制中止：放弃正在处理的学号
    abort: CancellationToken,
}

impl BatchRunner {
    pub fn new(flow: FetchFlow) -> Self {
        Self {
            flow,
            abort: CancellationToken::new(),
        }
    }

    /// 设置强制中止信号（不等当前学号完成）
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// 运行一批学号
    ///
    /// # 参数
    /// - `driver_factory`: 创建浏览器会话，失败则整次运行失败
    /// - `cancel`: 协作式取消，只在两个学号之间生效
    /// - `on_success`: 每个成功学号的 (学号, HTML)
    pub async fn run<D, F, Fut, S, O, K>(
        &self,
        identifiers: Vec<Identifier>,
        driver_factory: F,
        solver: &S,
        cancel: &CancellationToken,
        observer: &mut O,
        mut on_success: K,
    ) -> AppResult<BatchResult>
    where
        D: SessionDriver,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<D, DriverError>>,
        S: CaptchaSolver + ?Sized,
        O: ProgressObserver + ?Sized,
        K: FnMut(&Identifier, &str),
    {
        let identifiers = dedupe_preserving_order(identifiers);
        let total = identifiers.len();
        observer.on_event(&ProgressEvent::Started { total });

        let mut driver = match driver_factory().await {
            Ok(driver) => driver,
            Err(e) => {
                error!("❌ 浏览器会话创建失败: {}", e);
                observer.on_event(&ProgressEvent::Error(e.to_string()));
                observer.on_event(&ProgressEvent::Finished);
                return Err(e.into());
            }
        };

        let mut result = BatchResult::new();
        let looped = AssertUnwindSafe(async {
            for (i, identifier) in identifiers.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    warn!("🛑 用户中止，剩余 {} 个学号未处理", total - i);
                    result.cancelled = true;
                    observer.on_event(&ProgressEvent::Cancelled);
                    break;
                }

                let ctx = FetchCtx::new(identifier.clone(), i + 1, total);
                observer.on_event(&ProgressEvent::Fetching {
                    index: ctx.index,
                    total,
                    identifier: identifier.clone(),
                });

                let report = tokio::select! {
                    report = self.flow.run(&mut driver, solver, &ctx) => Some(report),
                    _ = self.abort.cancelled() => None,
                };
                let Some(report) = report else {
                    warn!("{} 🛑 强制中止，放弃当前学号", ctx);
                    result.cancelled = true;
                    observer.on_event(&ProgressEvent::Cancelled);
                    break;
                };

                info!(
                    "{} {} ({} 次尝试)",
                    ctx,
                    report.outcome.summary(),
                    report.attempt_count()
                );
                if let Some(html) = report.outcome.html() {
                    on_success(&identifier, html);
                }

                observer.on_event(&ProgressEvent::ItemDone {
                    index: ctx.index,
                    total,
                    identifier: identifier.clone(),
                    success: report.outcome.is_success(),
                    summary: report.outcome.summary(),
                });
                result.push(identifier, report.outcome);
            }
        })
        .catch_unwind()
        .await;

        if let Err(e) = driver.close().await {
            warn!("⚠️ 关闭浏览器会话失败: {}", e);
        }

        match looped {
            Ok(()) => {
                observer.on_event(&ProgressEvent::Finished);
                Ok(result)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("❌ 批量运行异常终止: {}", message);
                observer.on_event(&ProgressEvent::Error(message.clone()));
                observer.on_event(&ProgressEvent::Finished);
                Err(AppError::Worker(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "未知 panic".to_string()
    }
}

/// "只抓缺失"模式：去掉已知学号（大小写不敏感）
pub fn filter_missing(identifiers: Vec<Identifier>, known: &HashSet<String>) -> Vec<Identifier> {
    identifiers
        .into_iter()
        .filter(|id| !known.contains(&id.normalized()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_missing_is_case_insensitive() {
        let known: HashSet<String> = ["X001".to_string()].into_iter().collect();
        let ids = vec!["x001".into(), "X002".into()];
        let missing = filter_missing(ids, &known);
        assert_eq!(missing, vec![Identifier::from("X002")]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "未知 panic");
    }
}
