//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量运行和资源调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_runner` - 批量运行器
//! - 按顺序遍历学号，每个学号调用一次 `FetchFlow`
//! - 检查取消信号、通知进度
//! - 保证浏览器会话只关闭一次
//!
//! ### `progress` - 进度通知
//! - `ProgressObserver` 接口与通道实现
//!
//! ### `app` - 应用入口
//! - 初始化、后台任务、Ctrl-C、结果写入、报告
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行请求 → 后台任务)
//!     ↓
//! batch_runner (处理 Vec<Identifier>)
//!     ↓
//! workflow::FetchFlow (处理单个学号)
//!     ↓
//! services (能力层：验证码 / 解析 / 存储 / 报告)
//!     ↓
//! infrastructure (基础设施：SessionDriver)
//! ```

pub mod app;
pub mod batch_runner;
pub mod progress;

pub use app::{App, FetchRequest, IdentifierSource};
pub use batch_runner::{filter_missing, BatchRunner};
pub use progress::{
    progress_channels, ChannelObserver, NullObserver, ProgressEvent, ProgressObserver,
    ProgressReceivers,
};
