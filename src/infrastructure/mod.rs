//! 基础设施层：持有稀缺资源（浏览器会话），只暴露能力

pub mod chromium_driver;
pub mod session_driver;

pub use chromium_driver::ChromiumDriver;
pub use session_driver::{Locator, SessionDriver};
