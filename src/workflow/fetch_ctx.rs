//! 学号处理上下文
//!
//! 封装"我正在处理第几个学号"这一信息

use std::fmt::Display;

use crate::models::Identifier;

/// 学号处理上下文
#[derive(Debug, Clone)]
pub struct FetchCtx {
    /// 当前学号
    pub identifier: Identifier,

    /// 在本次运行中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次运行的学号总数
    pub total: usize,
}

impl FetchCtx {
    pub fn new(identifier: Identifier, index: usize, total: usize) -> Self {
        Self {
            identifier,
            index,
            total,
        }
    }
}

impl Display for FetchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[USN {}/{} {}]", self.index, self.total, self.identifier)
    }
}
