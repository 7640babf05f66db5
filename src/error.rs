//! 错误类型
//!
//! 分层错误：浏览器驱动、验证码识别、结果解析、持久化、报告、配置，
//! 最后统一汇总到 [`AppError`]。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器驱动错误
    #[error("浏览器错误: {0}")]
    Driver(#[from] DriverError),
    /// 验证码识别错误
    #[error("验证码错误: {0}")]
    Solver(#[from] SolverError),
    /// 结果页解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 表格读写错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 报告生成错误
    #[error("报告错误: {0}")]
    Report(#[from] ReportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 学号范围错误
    #[error("学号范围错误: {0}")]
    Range(#[from] crate::models::IdentifierRangeError),
    /// 后台任务异常退出
    #[error("后台任务失败: {0}")]
    Worker(String),
}

/// 浏览器驱动错误
///
/// 驱动本身不做重试，所有错误原样交给抓取流程处理。
#[derive(Debug, Error)]
pub enum DriverError {
    /// 等待超时
    #[error("等待 {what} 超时 ({seconds}s)")]
    Timeout { what: String, seconds: u64 },
    /// 元素不存在
    #[error("找不到元素: {locator}")]
    ElementNotFound { locator: String },
    /// 会话已崩溃或已关闭
    #[error("浏览器会话异常: {reason}")]
    SessionCrashed { reason: String },
    /// 启动浏览器失败（托管启动与调试端口连接都失败）
    #[error("浏览器启动失败: {reason}")]
    LaunchFailed { reason: String },
    /// CDP 协议错误
    #[error("CDP 调用失败: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// 验证码识别内部错误
///
/// 只在识别器内部流转，`CaptchaSolver::solve` 对外只返回空字符串。
#[derive(Debug, Error)]
pub enum SolverError {
    /// 图片解码/编码失败
    #[error("图片处理失败: {0}")]
    Image(#[from] image::ImageError),
    /// 启动 OCR 进程失败
    #[error("无法启动 OCR 程序 {binary}: {source}")]
    OcrSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    /// OCR 进程返回非零状态
    #[error("OCR 识别失败 (状态码 {status:?}): {stderr}")]
    OcrFailed { status: Option<i32>, stderr: String },
}

/// 结果页解析错误
#[derive(Debug, Error)]
pub enum ParseError {
    /// 选择器无效
    #[error("无效的选择器 {selector}: {reason}")]
    Selector { selector: String, reason: String },
    /// 正则表达式无效
    #[error("无效的正则表达式: {0}")]
    Pattern(#[from] regex::Error),
    /// 页面中没有学生信息
    #[error("结果页中没有找到学生信息")]
    MissingStudentInfo,
}

/// 表格读写错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读取失败
    #[error("读取文件失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入文件失败 ({path}): {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 表头缺少学号列
    #[error("表格 {path} 缺少列: {column}")]
    MissingColumn { path: String, column: String },
}

/// 报告生成错误
#[derive(Debug, Error)]
pub enum ReportError {
    /// 没有可用数据
    #[error("没有可用于生成报告的数据")]
    Empty,
    /// 缺少必要的列
    #[error("缺少必要的列: {0}")]
    MissingColumns(String),
    /// 没有科目列
    #[error("没有找到任何科目列")]
    NoSubjects,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML 解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl DriverError {
    /// 创建超时错误
    pub fn timeout(what: impl Into<String>, seconds: u64) -> Self {
        DriverError::Timeout {
            what: what.into(),
            seconds,
        }
    }

    /// 创建元素不存在错误
    pub fn not_found(locator: impl std::fmt::Display) -> Self {
        DriverError::ElementNotFound {
            locator: locator.to_string(),
        }
    }

    /// 是否为超时类错误（页面未就绪，可重试）
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

impl StoreError {
    pub fn read(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Write {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_converts_into_app_error() {
        let err: AppError = DriverError::timeout("lns", 10).into();
        assert!(matches!(err, AppError::Driver(DriverError::Timeout { .. })));
        assert!(err.to_string().contains("lns"));
    }

    #[test]
    fn test_timeout_detection() {
        assert!(DriverError::timeout("x", 1).is_timeout());
        assert!(!DriverError::not_found("x").is_timeout());
    }
}
