use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 门户页面约定（元素定位与弹窗文案）
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortalSelectors {
    /// 学号输入框 name
    pub identifier_input: String,
    /// 验证码图片 XPath
    pub captcha_image: String,
    /// 验证码输入框 name
    pub captcha_input: String,
    /// 提交按钮 id
    pub submit_button: String,
    /// 结果容器 XPath
    pub result_container: String,
    /// 学号无效弹窗关键字
    pub invalid_identifier_marker: String,
    /// 验证码错误弹窗关键字
    pub invalid_captcha_marker: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            identifier_input: "lns".to_string(),
            captcha_image: r#"//*[@alt="CAPTCHA code"]"#.to_string(),
            captcha_input: "captchacode".to_string(),
            submit_button: "submit".to_string(),
            result_container: r#"//div[@class="panel-body"]/div[@class="row"][1]"#.to_string(),
            invalid_identifier_marker: "not available or Invalid".to_string(),
            invalid_captcha_marker: "Invalid captcha code".to_string(),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 成绩查询页面 URL
    pub base_url: String,
    /// 外层最大尝试次数
    pub max_retries: u32,
    /// 每次尝试内验证码最大识别次数
    pub max_captcha_retries: u32,
    /// 验证码期望长度
    pub captcha_length: usize,
    /// 等待元素出现的超时（秒）
    pub element_wait_secs: u64,
    /// 结果出现后等待页面渲染的时间（毫秒）
    pub settle_delay_ms: u64,
    /// 轮询结果/弹窗的间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单个浏览器指令超时（秒）
    pub command_timeout_secs: u64,
    /// 是否无头模式
    pub headless: bool,
    /// 浏览器可执行文件路径（为空则自动查找）
    pub browser_path: Option<String>,
    /// 启动失败时回退连接的浏览器调试端口
    pub browser_debug_port: u16,
    /// tesseract 可执行文件
    pub tesseract_binary: String,
    /// tesseract 追加参数（空列表则不指定分段模式）
    pub tesseract_args: Vec<String>,
    /// 结果表格路径
    pub output_file: String,
    /// 运行日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 数值成绩低于该值视为不及格
    pub fail_threshold: f64,
    /// 报告中总分排名展示人数
    pub top_n: usize,
    /// 门户页面约定
    pub selectors: PortalSelectors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://results.vtu.ac.in/DJcbcs25/index.php".to_string(),
            max_retries: 50,
            max_captcha_retries: 3,
            captcha_length: 6,
            element_wait_secs: 10,
            settle_delay_ms: 2000,
            poll_interval_ms: 250,
            command_timeout_secs: 30,
            headless: true,
            browser_path: None,
            browser_debug_port: 9222,
            tesseract_binary: "tesseract".to_string(),
            tesseract_args: vec!["--psm".to_string(), "7".to_string()],
            output_file: "results.csv".to_string(),
            output_log_file: "run_log.txt".to_string(),
            verbose_logging: false,
            fail_threshold: 35.0,
            top_n: 10,
            selectors: PortalSelectors::default(),
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 从 TOML 文件加载（缺失字段取默认值）
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖已有配置，无法解析的值保持原样
    pub fn apply_env(self) -> Self {
        Self {
            base_url: std::env::var("VTU_BASE_URL").unwrap_or(self.base_url),
            max_retries: std::env::var("VTU_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_retries),
            max_captcha_retries: std::env::var("VTU_MAX_CAPTCHA_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_captcha_retries),
            element_wait_secs: std::env::var("VTU_ELEMENT_WAIT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.element_wait_secs),
            headless: std::env::var("VTU_HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.headless),
            browser_path: std::env::var("VTU_BROWSER_PATH").ok().or(self.browser_path),
            browser_debug_port: std::env::var("VTU_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(self.browser_debug_port),
            tesseract_binary: std::env::var("VTU_TESSERACT").unwrap_or(self.tesseract_binary),
            tesseract_args: std::env::var("VTU_TESSERACT_ARGS").ok().map(|v| v.split_whitespace().map(str::to_string).collect()).unwrap_or(self.tesseract_args),
            output_file: std::env::var("VTU_OUTPUT").unwrap_or(self.output_file),
            verbose_logging: std::env::var("VTU_VERBOSE").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            ..self
        }
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
