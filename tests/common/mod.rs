//! 测试用的脚本化驱动和识别器
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vtu_results::config::{Config, PortalSelectors};
use vtu_results::error::DriverError;
use vtu_results::infrastructure::{Locator, SessionDriver};
use vtu_results::services::CaptchaSolver;
use vtu_results::workflow::FetchSettings;

/// 提交后页面的反应
#[derive(Debug, Clone)]
pub enum Reaction {
    Alert(String),
    Container(String),
    /// 弹窗和结果容器同时出现
    Both(String, String),
    Silent,
}

pub fn invalid_usn_alert() -> Reaction {
    Reaction::Alert("University Seat Number is not available or Invalid..!".to_string())
}

pub fn bad_captcha_alert() -> Reaction {
    Reaction::Alert("Invalid captcha code !!!".to_string())
}

/// 驱动调用计数（驱动被移交后测试仍可读取）
#[derive(Debug, Default)]
pub struct Calls {
    pub navigations: usize,
    pub submits: usize,
    pub closes: usize,
    pub screenshots: usize,
    /// 结果容器探测次数
    pub container_checks: usize,
    /// 页面就绪探测次数
    pub ready_checks: usize,
    pub filled: Vec<(String, String)>,
    pub fetched: Vec<String>,
}

/// 脚本化浏览器驱动
pub struct ScriptedDriver {
    selectors: PortalSelectors,
    scripts: HashMap<String, VecDeque<Reaction>>,
    calls: Arc<Mutex<Calls>>,
    failing_navigations: usize,
    page_ready: bool,
    /// 导航后第几次探测时页面就绪
    ready_after: usize,
    /// 提交后第几轮轮询时反应才可见
    reaction_delay: usize,
    hidden_polls: usize,
    current: String,
    alert: Option<String>,
    container: Option<String>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            selectors: PortalSelectors::default(),
            scripts: HashMap::new(),
            calls: Arc::new(Mutex::new(Calls::default())),
            failing_navigations: 0,
            page_ready: true,
            ready_after: 0,
            reaction_delay: 0,
            hidden_polls: 0,
            current: String::new(),
            alert: None,
            container: None,
        }
    }

    /// 为某个学号安排每次提交的反应；脚本用完后返回成功页面
    pub fn script(mut self, identifier: &str, reactions: Vec<Reaction>) -> Self {
        self.scripts
            .insert(identifier.to_string(), reactions.into_iter().collect());
        self
    }

    pub fn failing_navigations(mut self, count: usize) -> Self {
        self.failing_navigations = count;
        self
    }

    pub fn page_never_ready(mut self) -> Self {
        self.page_ready = false;
        self
    }

    /// 输入框在第 `checks` 次探测时才出现
    pub fn page_ready_after(mut self, checks: usize) -> Self {
        self.ready_after = checks;
        self
    }

    /// 提交后的反应在第 `polls` 轮轮询时才出现
    pub fn delayed_reactions(mut self, polls: usize) -> Self {
        self.reaction_delay = polls;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Calls>> {
        self.calls.clone()
    }

    fn is_locator(&self, locator: &Locator, expected: &Locator) -> bool {
        locator == expected
    }

    fn result_container(&self) -> Locator {
        Locator::xpath(&self.selectors.result_container)
    }
}

pub fn result_html(identifier: &str) -> String {
    format!(r#"<div class="row"><b>{}</b></div>"#, identifier)
}

#[async_trait]
impl SessionDriver for ScriptedDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        self.calls.lock().unwrap().navigations += 1;
        self.alert = None;
        self.container = None;
        self.hidden_polls = 0;
        self.calls.lock().unwrap().ready_checks = 0;
        if self.failing_navigations > 0 {
            self.failing_navigations -= 1;
            return Err(DriverError::SessionCrashed {
                reason: "tab crashed".to_string(),
            });
        }
        Ok(())
    }

    async fn is_present(&mut self, locator: &Locator) -> Result<bool, DriverError> {
        if self.is_locator(locator, &self.result_container()) {
            self.calls.lock().unwrap().container_checks += 1;
            return Ok(self.hidden_polls == 0 && self.container.is_some());
        }
        let checks = {
            let mut calls = self.calls.lock().unwrap();
            calls.ready_checks += 1;
            calls.ready_checks
        };
        Ok(self.page_ready && checks >= self.ready_after)
    }

    async fn fill_field(&mut self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        if self.is_locator(locator, &Locator::name(&self.selectors.identifier_input)) {
            self.current = text.to_string();
        }
        self.calls
            .lock()
            .unwrap()
            .filled
            .push((locator.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), DriverError> {
        if !self.is_locator(locator, &Locator::id(&self.selectors.submit_button)) {
            return Err(DriverError::not_found(locator));
        }
        self.calls.lock().unwrap().submits += 1;
        let reaction = self
            .scripts
            .get_mut(&self.current)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reaction::Container(result_html(&self.current)));
        match reaction {
            Reaction::Alert(text) => self.alert = Some(text),
            Reaction::Container(html) => self.container = Some(html),
            Reaction::Both(text, html) => {
                self.alert = Some(text);
                self.container = Some(html);
            }
            Reaction::Silent => {}
        }
        self.hidden_polls = self.reaction_delay;
        Ok(())
    }

    async fn screenshot_element(&mut self, _locator: &Locator) -> Result<Vec<u8>, DriverError> {
        self.calls.lock().unwrap().screenshots += 1;
        Ok(vec![0u8; 8])
    }

    async fn read_attribute(
        &mut self,
        locator: &Locator,
        _name: &str,
    ) -> Result<String, DriverError> {
        match &self.container {
            Some(html) => {
                self.calls.lock().unwrap().fetched.push(self.current.clone());
                Ok(html.clone())
            }
            None => Err(DriverError::not_found(locator)),
        }
    }

    async fn dismiss_alert_if_present(&mut self) -> Result<Option<String>, DriverError> {
        if self.hidden_polls > 0 {
            self.hidden_polls -= 1;
        }
        if self.hidden_polls > 0 {
            return Ok(None);
        }
        Ok(self.alert.take())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.calls.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// 按顺序返回预设文本的识别器，用完后返回默认值
pub struct ScriptedSolver {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    calls: AtomicUsize,
}

impl ScriptedSolver {
    pub fn always(text: &str) -> Self {
        Self::sequence(&[], text)
    }

    pub fn sequence(replies: &[&str], fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaSolver for ScriptedSolver {
    async fn solve(&self, _image: &[u8]) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// 不等待的测试参数
pub fn fast_settings(max_retries: u32) -> FetchSettings {
    let config = Config {
        max_retries,
        element_wait_secs: 0,
        settle_delay_ms: 0,
        poll_interval_ms: 0,
        ..Config::default()
    };
    FetchSettings::from_config(&config)
}

/// 真实等待、短轮询间隔的测试参数
pub fn polling_settings(max_retries: u32) -> FetchSettings {
    FetchSettings {
        element_wait: Duration::from_secs(2),
        poll_interval: Duration::from_millis(1),
        ..fast_settings(max_retries)
    }
}
