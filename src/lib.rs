//! # VTU Results
//!
//! 自动识别验证码、批量抓取 VTU 成绩页的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器会话），只暴露能力
//! - `SessionDriver` - 页面操作接口（导航、填写、截图、弹窗）
//! - `ChromiumDriver` - 唯一的 page owner
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心重试
//! - `CaptchaSolver` - 验证码图片 → 文本
//! - `parse_student_result` - 成绩页 HTML → 扁平记录
//! - `ResultStore` / `ReportBuilder` - 结果表格与汇总报告
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个学号"的完整抓取流程
//! - `FetchCtx` - 上下文封装（学号 + 序号）
//! - `FetchFlow` - 两级重试状态机（外层刷新页面，内层只重新识别验证码）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_runner` - 串行遍历学号，取消、进度、保证关闭会话
//! - `orchestrator/app` - 后台任务、进度通道、结果写入
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, PortalSelectors};
pub use error::{AppError, AppResult, DriverError};
pub use infrastructure::{ChromiumDriver, Locator, SessionDriver};
pub use models::{BatchResult, FetchOutcome, FetchReport, Identifier};
pub use orchestrator::{App, BatchRunner, FetchRequest, IdentifierSource};
pub use services::CaptchaSolver;
pub use workflow::{FetchCtx, FetchFlow, FetchSettings};
