//! 浏览器会话驱动接口 - 基础设施层
//!
//! 只暴露页面操作能力，不做任何重试；重试完全由抓取流程负责。

use std::fmt::{self, Display};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::error::DriverError;

/// `wait_for_element` 的默认轮询间隔
const WAIT_POLL: Duration = Duration::from_millis(200);

/// 元素定位方式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// `name` 属性
    Name(String),
    /// `id` 属性
    Id(String),
    /// XPath 表达式
    XPath(String),
    /// CSS 选择器
    Css(String),
}

impl Locator {
    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    /// 转成 CSS 选择器（XPath 返回 None）
    pub fn to_css(&self) -> Option<String> {
        match self {
            Locator::Name(name) => Some(format!(r#"[name="{}"]"#, name)),
            Locator::Id(id) => Some(format!(r#"[id="{}"]"#, id)),
            Locator::Css(css) => Some(css.clone()),
            Locator::XPath(_) => None,
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(v) => write!(f, "name={}", v),
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
        }
    }
}

/// 浏览器会话驱动
///
/// 一个实例对应一个长期存在的浏览器会话，只能被一个抓取流程独占使用。
/// 所有操作都可能返回 [`DriverError`]（超时、元素不存在、会话崩溃）。
#[async_trait]
pub trait SessionDriver: Send {
    /// 导航到指定 URL
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// 元素当前是否存在（不等待）
    async fn is_present(&mut self, locator: &Locator) -> Result<bool, DriverError>;

    /// 清空并填写输入框
    async fn fill_field(&mut self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    /// 点击元素
    async fn click(&mut self, locator: &Locator) -> Result<(), DriverError>;

    /// 对元素截图，返回 PNG 字节
    async fn screenshot_element(&mut self, locator: &Locator) -> Result<Vec<u8>, DriverError>;

    /// 读取元素属性；`outerHTML` 返回元素完整标记，属性不存在返回空字符串
    async fn read_attribute(&mut self, locator: &Locator, name: &str)
        -> Result<String, DriverError>;

    /// 如有弹窗则读取文本并确认关闭
    async fn dismiss_alert_if_present(&mut self) -> Result<Option<String>, DriverError>;

    /// 释放会话
    async fn close(&mut self) -> Result<(), DriverError>;

    /// 等待元素出现，超时返回 [`DriverError::Timeout`]
    async fn wait_for_element(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_present(locator).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout(locator.to_string(), timeout.as_secs()));
            }
            sleep(WAIT_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_to_css() {
        assert_eq!(Locator::name("lns").to_css().as_deref(), Some(r#"[name="lns"]"#));
        assert_eq!(Locator::id("submit").to_css().as_deref(), Some(r#"[id="submit"]"#));
        assert_eq!(Locator::xpath("//div").to_css(), None);
        assert_eq!(Locator::xpath("//div").to_string(), "xpath=//div");
    }
}
