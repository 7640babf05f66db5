//! tracing 初始化

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 安装全局日志订阅者
///
/// `RUST_LOG` 优先；否则默认 `info`，详细模式下本 crate 为 `debug`。
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "info,vtu_results=debug"
    } else {
        "info,chromiumoxide=warn"
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
