use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::DriverError;

/// 启动本地托管浏览器
///
/// 默认无头模式；配置了 `browser_path` 时使用指定的可执行文件，否则自动查找。
pub async fn launch_managed_browser(config: &Config) -> Result<(Browser, JoinHandle<()>), DriverError> {
    info!("🚀 启动浏览器 (无头模式: {})...", config.headless);

    let mut builder = BrowserConfig::builder().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--log-level=3",
    ]);
    if !config.headless {
        builder = builder.with_head();
    }
    if let Some(path) = config.browser_path.as_deref() {
        debug!("使用指定的浏览器: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let browser_config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        DriverError::LaunchFailed {
            reason: format!("配置浏览器失败: {}", e),
        }
    })?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        DriverError::LaunchFailed {
            reason: format!("启动浏览器失败: {}", e),
        }
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}
