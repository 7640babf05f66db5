//! 抓取结果模型
//!
//! - [`FetchOutcome`]：单个学号的最终结果（每个学号恰好一个）
//! - [`FetchAttempt`]：一次外层尝试的临时记录
//! - [`BatchResult`]：一次批量运行的汇总

use std::collections::HashSet;
use std::fmt::{self, Display};

use crate::models::Identifier;

/// 单个学号的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 成功，携带结果容器的原始 HTML
    Success(String),
    /// 门户明确表示学号不存在，不再重试
    InvalidIdentifier,
    /// 外层重试次数耗尽
    Exhausted,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// 成功时的 HTML
    pub fn html(&self) -> Option<&str> {
        match self {
            FetchOutcome::Success(html) => Some(html),
            _ => None,
        }
    }

    /// 进度行中使用的简短描述
    pub fn summary(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::InvalidIdentifier => "invalid USN",
            FetchOutcome::Exhausted => "retries exhausted",
        }
    }
}

/// 一次外层尝试失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// 学号输入框在超时内未出现
    PageNotReady,
    /// 内层验证码重试耗尽，始终没有得到合法长度的识别结果
    CaptchaUnsolved { tries: u32 },
    /// 门户提示验证码错误
    CaptchaRejected,
    /// 其他弹窗
    UnexpectedAlert(String),
    /// 提交后既没有结果也没有弹窗
    NoResponse,
    /// 驱动异常（元素失效、导航超时、会话崩溃等）
    Driver(String),
}

impl Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::PageNotReady => write!(f, "页面未就绪"),
            AttemptFailure::CaptchaUnsolved { tries } => {
                write!(f, "验证码识别 {} 次均无效", tries)
            }
            AttemptFailure::CaptchaRejected => write!(f, "验证码被拒绝"),
            AttemptFailure::UnexpectedAlert(text) => write!(f, "未知弹窗: {}", text),
            AttemptFailure::NoResponse => write!(f, "提交后无响应"),
            AttemptFailure::Driver(msg) => write!(f, "驱动错误: {}", msg),
        }
    }
}

/// 单次尝试的结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Failed(AttemptFailure),
    InvalidIdentifier,
    Succeeded,
}

/// 一次外层尝试（不持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    /// 从 1 开始的尝试序号
    pub ordinal: u32,
    /// 本次提交的验证码文本（未提交则为 None）
    pub captcha_text: Option<String>,
    pub result: AttemptResult,
}

/// 抓取流程对单个学号的完整报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub identifier: Identifier,
    pub outcome: FetchOutcome,
    pub attempts: Vec<FetchAttempt>,
}

impl FetchReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// 批量运行汇总
///
/// 按处理顺序单调追加，同一次运行内学号不重复。
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    entries: Vec<(Identifier, FetchOutcome)>,
    failed: Vec<Identifier>,
    seen: HashSet<Identifier>,
    /// 是否被用户中止
    pub cancelled: bool,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个学号的结果；重复学号返回 false 且不记录
    pub fn push(&mut self, identifier: Identifier, outcome: FetchOutcome) -> bool {
        if !self.seen.insert(identifier.clone()) {
            return false;
        }
        if !outcome.is_success() {
            self.failed.push(identifier.clone());
        }
        self.entries.push((identifier, outcome));
        true
    }

    /// 把已记录的学号列入缺失（例如结果页无法解析、没有写入表格）
    pub fn mark_missing(&mut self, identifier: &Identifier) -> bool {
        if !self.seen.contains(identifier) || self.failed.contains(identifier) {
            return false;
        }
        self.failed.push(identifier.clone());
        let entries = &self.entries;
        self.failed
            .sort_by_key(|id| entries.iter().position(|(entry, _)| entry == id));
        true
    }

    pub fn entries(&self) -> &[(Identifier, FetchOutcome)] {
        &self.entries
    }

    /// 未成功的学号（按处理顺序）
    pub fn failed(&self) -> &[Identifier] {
        &self.failed
    }

    pub fn successes(&self) -> impl Iterator<Item = (&Identifier, &str)> {
        self.entries
            .iter()
            .filter_map(|(id, outcome)| outcome.html().map(|html| (id, html)))
    }

    pub fn success_count(&self) -> usize {
        self.entries.len() - self.failed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.seen.contains(identifier)
    }

    /// 运行结束时展示给用户的缺失学号行
    pub fn missing_line(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let joined = self
            .failed
            .iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("Missing USNs: {}", joined))
    }
}
