//! 浏览器获取
//!
//! 优先启动本地托管浏览器；失败时回退到已运行浏览器的调试端口。

pub mod connection;
pub mod headless;

use chromiumoxide::Browser;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::Config;
use crate::error::DriverError;

pub use connection::connect_to_browser;
pub use headless::launch_managed_browser;

/// 浏览器来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserOrigin {
    /// 本程序启动，关闭时一并退出
    Managed,
    /// 外部已运行的浏览器，关闭时只关闭本程序的页面
    Ambient,
}

/// 获取浏览器：托管启动失败则回退到调试端口
pub async fn acquire_browser(
    config: &Config,
) -> Result<(Browser, JoinHandle<()>, BrowserOrigin), DriverError> {
    match launch_managed_browser(config).await {
        Ok((browser, handler)) => Ok((browser, handler, BrowserOrigin::Managed)),
        Err(launch_err) => {
            warn!(
                "⚠️ 托管浏览器启动失败，尝试连接调试端口 {}: {}",
                config.browser_debug_port, launch_err
            );
            let (browser, handler) = connect_to_browser(config.browser_debug_port)
                .await
                .map_err(|connect_err| DriverError::LaunchFailed {
                    reason: format!("{}; {}", launch_err, connect_err),
                })?;
            Ok((browser, handler, BrowserOrigin::Ambient))
        }
    }
}
