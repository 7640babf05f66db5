//! 进度通知
//!
//! 批量运行只通过 [`ProgressObserver`] 向外汇报进度，不依赖任何界面。
//! [`ChannelObserver`] 把事件转成两个单向通道：文本行和百分比。

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::models::Identifier;

/// 批量运行事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    Fetching {
        index: usize,
        total: usize,
        identifier: Identifier,
    },
    ItemDone {
        index: usize,
        total: usize,
        identifier: Identifier,
        success: bool,
        summary: &'static str,
    },
    /// 用户中止
    Cancelled,
    /// 运行级错误
    Error(String),
    /// 运行结束（无论成功、中止还是出错都会发出）
    Finished,
}

/// 进度观察者
pub trait ProgressObserver: Send {
    fn on_event(&mut self, event: &ProgressEvent);
}

/// 丢弃所有事件
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}

/// 通道观察者（运行任务一侧）
pub struct ChannelObserver {
    lines: UnboundedSender<String>,
    percent: UnboundedSender<u8>,
}

/// 通道接收端（调用方一侧）
pub struct ProgressReceivers {
    pub lines: UnboundedReceiver<String>,
    pub percent: UnboundedReceiver<u8>,
}

/// 创建一对进度通道
pub fn progress_channels() -> (ChannelObserver, ProgressReceivers) {
    let (line_tx, line_rx) = unbounded_channel();
    let (percent_tx, percent_rx) = unbounded_channel();
    (
        ChannelObserver {
            lines: line_tx,
            percent: percent_tx,
        },
        ProgressReceivers {
            lines: line_rx,
            percent: percent_rx,
        },
    )
}

fn percent_of(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (index * 100 / total).min(100) as u8
}

/// 事件对应的文本行
pub fn render_line(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Started { .. } => None,
        ProgressEvent::Fetching {
            index,
            total,
            identifier,
        } => Some(format!("[{}/{}] Fetching: {}", index, total, identifier)),
        ProgressEvent::ItemDone {
            identifier,
            success: false,
            ..
        } => Some(format!("  -> Failed to fetch: {}", identifier)),
        ProgressEvent::ItemDone { .. } => None,
        ProgressEvent::Cancelled => Some("Process manually stopped by user.".to_string()),
        ProgressEvent::Error(message) => Some(format!("Error: {}", message)),
        ProgressEvent::Finished => Some("Finished.".to_string()),
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_event(&mut self, event: &ProgressEvent) {
        // 接收端已关闭时直接丢弃
        if let Some(line) = render_line(event) {
            let _ = self.lines.send(line);
        }
        match event {
            ProgressEvent::Fetching { index, total, .. } => {
                let _ = self.percent.send(percent_of(*index, *total));
            }
            ProgressEvent::Finished => {
                let _ = self.percent.send(100);
            }
            _ => {}
        }
    }
}

impl ProgressReceivers {
    /// 取出当前已到达的所有文本行和最新百分比，不等待
    pub fn drain(&mut self) -> (Vec<String>, Option<u8>) {
        let mut lines = Vec::new();
        while let Ok(line) = self.lines.try_recv() {
            lines.push(line);
        }
        let mut latest = None;
        while let Ok(p) = self.percent.try_recv() {
            latest = Some(p);
        }
        (lines, latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_lines_and_percent() {
        let (mut observer, mut receivers) = progress_channels();
        observer.on_event(&ProgressEvent::Started { total: 4 });
        observer.on_event(&ProgressEvent::Fetching {
            index: 1,
            total: 4,
            identifier: "X001".into(),
        });
        observer.on_event(&ProgressEvent::ItemDone {
            index: 1,
            total: 4,
            identifier: "X001".into(),
            success: false,
            summary: "retries exhausted",
        });
        observer.on_event(&ProgressEvent::Cancelled);
        observer.on_event(&ProgressEvent::Finished);

        let (lines, latest) = receivers.drain();
        assert_eq!(
            lines,
            vec![
                "[1/4] Fetching: X001",
                "  -> Failed to fetch: X001",
                "Process manually stopped by user.",
                "Finished.",
            ]
        );
        assert_eq!(latest, Some(100));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(3, 3), 100);
        assert_eq!(percent_of(0, 0), 100);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (mut observer, receivers) = progress_channels();
        drop(receivers);
        observer.on_event(&ProgressEvent::Finished);
    }
}
