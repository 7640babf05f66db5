//! 重试预算

/// 有上限的重试计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    limit: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    /// 消耗一次机会，返回本次的序号（从1开始）；已耗尽返回 None
    pub fn try_take(&mut self) -> Option<u32> {
        if self.exhausted() {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}
