//! 学号抓取流程 - 流程层
//!
//! 核心职责：定义"一个学号"的完整抓取流程
//!
//! 状态顺序：
//! 1. Start：打开查询页，等待学号输入框
//! 2. FormFilled：填写学号
//! 3. CaptchaPending → CaptchaSolved：截图识别验证码（内层重试，不刷新页面）
//! 4. Submitted：填写验证码并提交，等待结果容器或弹窗
//! 5. 失败的尝试回到 Start（外层重试，刷新页面）

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, PortalSelectors};
use crate::error::DriverError;
use crate::infrastructure::{Locator, SessionDriver};
use crate::models::{AttemptFailure, AttemptResult, FetchAttempt, FetchOutcome, FetchReport};
use crate::services::CaptchaSolver;
use crate::workflow::fetch_ctx::FetchCtx;
use crate::workflow::retry::RetryBudget;

/// 抓取流程参数
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    /// 外层尝试上限
    pub max_retries: u32,
    /// 每次尝试内验证码识别上限
    pub max_captcha_retries: u32,
    /// 合法验证码长度
    pub captcha_length: usize,
    /// 等待输入框、等待提交响应的超时
    pub element_wait: Duration,
    /// 结果出现后读取前的等待
    pub settle_delay: Duration,
    /// 提交后轮询结果/弹窗的间隔
    pub poll_interval: Duration,
    pub selectors: PortalSelectors,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            max_retries: config.max_retries,
            max_captcha_retries: config.max_captcha_retries,
            captcha_length: config.captcha_length,
            element_wait: config.element_wait(),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            selectors: config.selectors.clone(),
        }
    }
}

/// 弹窗类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// 学号不存在
    InvalidIdentifier,
    /// 验证码错误
    CaptchaRejected,
    Other,
}

/// 根据弹窗文本判断类型
pub fn classify_alert(text: &str, selectors: &PortalSelectors) -> AlertKind {
    if text.contains(&selectors.invalid_identifier_marker) {
        AlertKind::InvalidIdentifier
    } else if text.contains(&selectors.invalid_captcha_marker) {
        AlertKind::CaptchaRejected
    } else {
        AlertKind::Other
    }
}

/// 单次尝试内的状态
#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchState {
    Start,
    FormFilled,
    CaptchaPending,
    CaptchaSolved(String),
    Submitted(String),
    AttemptFailed(AttemptFailure, Option<String>),
}

/// 提交后页面的反应
enum Response {
    Container,
    Alert(String),
    Silent,
}

/// 学号抓取流程
///
/// - 持有流程参数和预先构造好的元素定位
/// - 不持有浏览器，驱动由调用方借入
/// - 永远不返回错误：驱动错误都被记为一次失败的尝试
pub struct FetchFlow {
    settings: FetchSettings,
    identifier_input: Locator,
    captcha_image: Locator,
    captcha_input: Locator,
    submit_button: Locator,
    result_container: Locator,
}

impl FetchFlow {
    pub fn new(settings: FetchSettings) -> Self {
        let s = &settings.selectors;
        Self {
            identifier_input: Locator::name(&s.identifier_input),
            captcha_image: Locator::xpath(&s.captcha_image),
            captcha_input: Locator::name(&s.captcha_input),
            submit_button: Locator::id(&s.submit_button),
            result_container: Locator::xpath(&s.result_container),
            settings,
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// 抓取一个学号，返回最终结果和全部尝试记录
    pub async fn run<D, S>(&self, driver: &mut D, solver: &S, ctx: &FetchCtx) -> FetchReport
    where
        D: SessionDriver + ?Sized,
        S: CaptchaSolver + ?Sized,
    {
        let mut outer = RetryBudget::new(self.settings.max_retries);
        let mut inner = RetryBudget::new(self.settings.max_captcha_retries);
        let mut attempts: Vec<FetchAttempt> = Vec::new();
        let mut state = FetchState::Start;

        let finish = |outcome: FetchOutcome, attempts: Vec<FetchAttempt>| FetchReport {
            identifier: ctx.identifier.clone(),
            outcome,
            attempts,
        };

        loop {
            state = match state {
                FetchState::Start => {
                    // 超时后才弹出的"学号无效"仍然是上一次提交的回应
                    if let Some(stale) = self.take_stale_alert(driver, ctx).await {
                        let late_answer = matches!(
                            attempts.last().map(|a| &a.result),
                            Some(AttemptResult::Failed(AttemptFailure::NoResponse))
                        );
                        let kind = classify_alert(&stale, &self.settings.selectors);
                        if late_answer && kind == AlertKind::InvalidIdentifier {
                            if let Some(last) = attempts.last_mut() {
                                last.result = AttemptResult::InvalidIdentifier;
                            }
                            warn!("{} ⚠️ 学号无效（延迟弹窗）: {}", ctx, stale);
                            return finish(FetchOutcome::InvalidIdentifier, attempts);
                        }
                        debug!("{} 关闭残留弹窗: {}", ctx, stale);
                    }

                    let Some(n) = outer.try_take() else {
                        warn!("{} ❌ 已尝试 {} 次，放弃", ctx, outer.limit());
                        return finish(FetchOutcome::Exhausted, attempts);
                    };
                    inner.reset();
                    debug!("{} 🌐 第 {}/{} 次尝试", ctx, n, outer.limit());
                    match self.open_form(driver).await {
                        Ok(()) => FetchState::FormFilled,
                        Err(e) if e.is_timeout() => {
                            FetchState::AttemptFailed(AttemptFailure::PageNotReady, None)
                        }
                        Err(e) => FetchState::AttemptFailed(driver_failure(e), None),
                    }
                }

                FetchState::FormFilled => {
                    match driver
                        .fill_field(&self.identifier_input, ctx.identifier.as_str())
                        .await
                    {
                        Ok(()) => FetchState::CaptchaPending,
                        Err(e) => FetchState::AttemptFailed(driver_failure(e), None),
                    }
                }

                FetchState::CaptchaPending => {
                    if inner.try_take().is_none() {
                        let tries = inner.used();
                        FetchState::AttemptFailed(AttemptFailure::CaptchaUnsolved { tries }, None)
                    } else {
                        match driver.screenshot_element(&self.captcha_image).await {
                            Ok(image) => {
                                let text = solver.solve(&image).await;
                                if text.chars().count() == self.settings.captcha_length {
                                    debug!("{} 🔑 验证码识别为 {}", ctx, text);
                                    FetchState::CaptchaSolved(text)
                                } else {
                                    debug!(
                                        "{} 验证码识别结果 {:?} 长度不符 ({}/{})",
                                        ctx,
                                        text,
                                        inner.used(),
                                        inner.limit()
                                    );
                                    FetchState::CaptchaPending
                                }
                            }
                            Err(e) => FetchState::AttemptFailed(driver_failure(e), None),
                        }
                    }
                }

                FetchState::CaptchaSolved(text) => match self.submit(driver, &text).await {
                    Ok(()) => FetchState::Submitted(text),
                    Err(e) => FetchState::AttemptFailed(driver_failure(e), Some(text)),
                },

                FetchState::Submitted(text) => match self.await_response(driver).await {
                    Ok(Response::Container) => match self.read_result(driver).await {
                        Ok(html) => {
                            attempts.push(FetchAttempt {
                                ordinal: outer.used(),
                                captcha_text: Some(text),
                                result: AttemptResult::Succeeded,
                            });
                            info!("{} ✅ 获取成功 (第 {} 次尝试)", ctx, outer.used());
                            return finish(FetchOutcome::Success(html), attempts);
                        }
                        Err(e) => FetchState::AttemptFailed(driver_failure(e), Some(text)),
                    },
                    Ok(Response::Alert(message)) => {
                        match classify_alert(&message, &self.settings.selectors) {
                            AlertKind::InvalidIdentifier => {
                                attempts.push(FetchAttempt {
                                    ordinal: outer.used(),
                                    captcha_text: Some(text),
                                    result: AttemptResult::InvalidIdentifier,
                                });
                                warn!("{} ⚠️ 学号无效: {}", ctx, message);
                                return finish(FetchOutcome::InvalidIdentifier, attempts);
                            }
                            AlertKind::CaptchaRejected => FetchState::AttemptFailed(
                                AttemptFailure::CaptchaRejected,
                                Some(text),
                            ),
                            AlertKind::Other => FetchState::AttemptFailed(
                                AttemptFailure::UnexpectedAlert(message),
                                Some(text),
                            ),
                        }
                    }
                    Ok(Response::Silent) => {
                        FetchState::AttemptFailed(AttemptFailure::NoResponse, Some(text))
                    }
                    Err(e) => FetchState::AttemptFailed(driver_failure(e), Some(text)),
                },

                FetchState::AttemptFailed(failure, captcha_text) => {
                    debug!("{} 🔁 第 {} 次尝试失败: {}", ctx, outer.used(), failure);
                    attempts.push(FetchAttempt {
                        ordinal: outer.used(),
                        captcha_text,
                        result: AttemptResult::Failed(failure),
                    });
                    FetchState::Start
                }
            };
        }
    }

    /// 关闭并返回残留弹窗；驱动错误留给随后的导航处理
    async fn take_stale_alert<D: SessionDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &FetchCtx,
    ) -> Option<String> {
        match driver.dismiss_alert_if_present().await {
            Ok(stale) => stale,
            Err(e) => {
                debug!("{} 检查残留弹窗失败: {}", ctx, e);
                None
            }
        }
    }

    /// 打开查询页并等待学号输入框
    async fn open_form<D: SessionDriver + ?Sized>(&self, driver: &mut D) -> Result<(), DriverError> {
        driver.navigate(&self.settings.base_url).await?;
        driver
            .wait_for_element(&self.identifier_input, self.settings.element_wait)
            .await
    }

    async fn submit<D: SessionDriver + ?Sized>(
        &self,
        driver: &mut D,
        captcha: &str,
    ) -> Result<(), DriverError> {
        driver.fill_field(&self.captcha_input, captcha).await?;
        driver.click(&self.submit_button).await
    }

    /// 轮询直到结果容器或弹窗出现（弹窗优先），超时视为无响应
    async fn await_response<D: SessionDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> Result<Response, DriverError> {
        let deadline = Instant::now() + self.settings.element_wait;
        loop {
            if let Some(message) = driver.dismiss_alert_if_present().await? {
                return Ok(Response::Alert(message));
            }
            if driver.is_present(&self.result_container).await? {
                return Ok(Response::Container);
            }
            if Instant::now() >= deadline {
                return Ok(Response::Silent);
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    async fn read_result<D: SessionDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> Result<String, DriverError> {
        sleep(self.settings.settle_delay).await;
        driver
            .read_attribute(&self.result_container, "outerHTML")
            .await
    }
}

fn driver_failure(e: DriverError) -> AttemptFailure {
    AttemptFailure::Driver(e.to_string())
}
