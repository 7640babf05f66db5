//! OCR 引擎 - 业务能力层
//!
//! 只负责"图片 → 文本"，不关心验证码规则

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::SolverError;

/// OCR 引擎
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// 识别 PNG 图片中的文字
    async fn recognize(&self, png: &[u8]) -> Result<String, SolverError>;
}

/// 调用本地 `tesseract` 命令行
///
/// 图片通过 stdin 传入，识别结果从 stdout 读取。
pub struct TesseractOcr {
    binary: String,
    /// 追加在 `stdin stdout` 之后的参数
    extra_args: Vec<String>,
}

/// 默认按单行文本识别
pub const DEFAULT_TESSERACT_ARGS: [&str; 2] = ["--psm", "7"];

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: DEFAULT_TESSERACT_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// 替换追加参数；传入空列表即使用 tesseract 自身的默认分段模式
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn command_args(&self) -> Vec<&str> {
        let mut args = vec!["stdin", "stdout"];
        args.extend(self.extra_args.iter().map(String::as_str));
        args
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, png: &[u8]) -> Result<String, SolverError> {
        let mut child = Command::new(&self.binary)
            .args(self.command_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SolverError::OcrSpawn {
                binary: self.binary.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(png)
                .await
                .map_err(|source| SolverError::OcrSpawn {
                    binary: self.binary.clone(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| SolverError::OcrSpawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SolverError::OcrFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("tesseract 输出: {:?}", text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let ocr = TesseractOcr::new("definitely-not-a-real-ocr-binary");
        let result = tokio_test::block_on(ocr.recognize(&[0u8; 4]));
        assert!(matches!(result, Err(SolverError::OcrSpawn { .. })));
    }

    #[test]
    fn test_command_args() {
        let ocr = TesseractOcr::default();
        assert_eq!(ocr.command_args(), vec!["stdin", "stdout", "--psm", "7"]);

        let plain = TesseractOcr::default().with_extra_args(Vec::new());
        assert_eq!(plain.command_args(), vec!["stdin", "stdout"]);
    }
}
