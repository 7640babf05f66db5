//! Chromium 会话驱动 - 基础设施层
//!
//! 持有唯一的 Browser / Page 资源，只暴露页面操作能力

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserOrigin};
use crate::config::Config;
use crate::error::DriverError;
use crate::infrastructure::session_driver::{Locator, SessionDriver};

/// Chromium 会话驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 后台监听 JS 弹窗，由 `dismiss_alert_if_present` 读取并确认
/// - 每条 CDP 指令都有超时
/// - 不做重试
pub struct ChromiumDriver {
    browser: Option<Browser>,
    page: Page,
    origin: BrowserOrigin,
    pending_dialog: Arc<Mutex<Option<String>>>,
    tasks: Vec<JoinHandle<()>>,
    command_timeout: Duration,
}

impl ChromiumDriver {
    /// 获取浏览器并打开空白页
    ///
    /// 启动失败（托管与调试端口均失败）对整次运行是致命的。
    pub async fn launch(config: &Config) -> Result<Self, DriverError> {
        let (browser, handler_task, origin) = browser::acquire_browser(config).await?;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            DriverError::LaunchFailed {
                reason: format!("创建页面失败: {}", e),
            }
        })?;

        let pending_dialog = Arc::new(Mutex::new(None));
        let mut dialogs = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await?;
        let slot = pending_dialog.clone();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                debug!("检测到弹窗: {}", event.message);
                *slot.lock().await = Some(event.message.clone());
            }
        });

        info!("✓ 浏览器会话就绪 ({:?})", origin);

        Ok(Self {
            browser: Some(browser),
            page,
            origin,
            pending_dialog,
            tasks: vec![handler_task, dialog_task],
            command_timeout: config.command_timeout(),
        })
    }

    /// 为 CDP 调用加上超时
    async fn guarded<T, F>(&self, what: impl Into<String>, fut: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, CdpError>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(DriverError::from),
            Err(_) => Err(DriverError::timeout(what, self.command_timeout.as_secs())),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, DriverError> {
        if self.browser.is_none() {
            return Err(DriverError::SessionCrashed {
                reason: "会话已关闭".to_string(),
            });
        }
        match (locator, locator.to_css()) {
            (Locator::XPath(xpath), _) => {
                self.guarded(locator.to_string(), self.page.find_xpaths(xpath.as_str()))
                    .await
            }
            (_, Some(css)) => {
                self.guarded(locator.to_string(), self.page.find_elements(css))
                    .await
            }
            (_, None) => Err(DriverError::not_found(locator)),
        }
    }

    async fn find(&self, locator: &Locator) -> Result<Element, DriverError> {
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::not_found(locator))
    }
}

#[async_trait]
impl SessionDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        debug!("导航到: {}", url);
        self.guarded(format!("导航 {}", url), self.page.goto(url))
            .await?;
        Ok(())
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool, DriverError> {
        // 弹窗打开时页面脚本被阻塞，先让调用方处理弹窗
        if self.pending_dialog.lock().await.is_some() {
            return Ok(false);
        }
        match locator {
            Locator::XPath(xpath) => {
                if self.browser.is_none() {
                    return Err(DriverError::SessionCrashed {
                        reason: "会话已关闭".to_string(),
                    });
                }
                let script = format!(
                    "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue !== null",
                    js_string(xpath)
                );
                let result = self
                    .guarded(locator.to_string(), self.page.evaluate(script))
                    .await?;
                Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
            }
            _ => Ok(!self.find_all(locator).await?.is_empty()),
        }
    }

    async fn fill_field(&mut self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        let element = self.find(locator).await?;
        self.guarded(
            locator.to_string(),
            element.call_js_fn("function() { this.value = ''; }", false),
        )
        .await?;
        self.guarded(locator.to_string(), element.click()).await?;
        self.guarded(locator.to_string(), element.type_str(text))
            .await?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), DriverError> {
        let element = self.find(locator).await?;
        self.guarded(locator.to_string(), element.click()).await?;
        Ok(())
    }

    async fn screenshot_element(&mut self, locator: &Locator) -> Result<Vec<u8>, DriverError> {
        let element = self.find(locator).await?;
        self.guarded(
            locator.to_string(),
            element.screenshot(CaptureScreenshotFormat::Png),
        )
        .await
    }

    async fn read_attribute(
        &mut self,
        locator: &Locator,
        name: &str,
    ) -> Result<String, DriverError> {
        let element = self.find(locator).await?;
        let value = match name {
            "outerHTML" => self.guarded(locator.to_string(), element.outer_html()).await?,
            "innerHTML" => self.guarded(locator.to_string(), element.inner_html()).await?,
            _ => self.guarded(locator.to_string(), element.attribute(name)).await?,
        };
        Ok(value.unwrap_or_default())
    }

    async fn dismiss_alert_if_present(&mut self) -> Result<Option<String>, DriverError> {
        let Some(text) = self.pending_dialog.lock().await.take() else {
            return Ok(None);
        };
        self.guarded(
            "确认弹窗",
            self.page.execute(HandleJavaScriptDialogParams::new(true)),
        )
        .await?;
        Ok(Some(text.trim().to_string()))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let result = match self.origin {
            BrowserOrigin::Managed => {
                info!("🛑 关闭浏览器");
                let closed = browser.close().await.map(|_| ());
                if let Err(e) = browser.wait().await {
                    warn!("等待浏览器退出失败: {}", e);
                }
                closed
            }
            BrowserOrigin::Ambient => {
                info!("🛑 关闭页面（保留外部浏览器）");
                self.page.clone().close().await
            }
        };

        for task in self.tasks.drain(..) {
            task.abort();
        }
        result.map_err(DriverError::from)
    }
}

/// 转成单引号 JS 字符串字面量
fn js_string(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}
