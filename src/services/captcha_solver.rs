//! 验证码识别 - 业务能力层
//!
//! 只负责"验证码图片 → 文本"，失败时返回空字符串，从不向外抛错

use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::{debug, warn};

use crate::error::SolverError;
use crate::services::ocr::OcrEngine;

/// 验证码字形颜色
pub const TARGET_COLOR: Rgb<u8> = Rgb([102, 102, 102]);

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// 验证码识别器
///
/// 任何满足"图片字节 → 文本，失败返回空串"的实现都可以替换进来。
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> String;
}

/// 颜色隔离 + OCR 识别器
///
/// 把与字形颜色完全相同的像素复制到白色画布上，再交给 OCR。
pub struct ColorIsolationSolver<O> {
    ocr: O,
    target: Rgb<u8>,
}

impl<O: OcrEngine> ColorIsolationSolver<O> {
    pub fn new(ocr: O) -> Self {
        Self {
            ocr,
            target: TARGET_COLOR,
        }
    }

    pub fn with_target(mut self, target: Rgb<u8>) -> Self {
        self.target = target;
        self
    }

    async fn try_solve(&self, bytes: &[u8]) -> Result<String, SolverError> {
        let decoded = image::load_from_memory(bytes)?;
        let (canvas, matched) = isolate_glyphs(&decoded, self.target);
        debug!("验证码字形像素: {}", matched);

        if matched == 0 {
            return Ok(String::new());
        }

        let mut png = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let raw = self.ocr.recognize(&png).await?;
        Ok(raw.chars().filter(|c| !c.is_whitespace()).collect())
    }
}

#[async_trait]
impl<O: OcrEngine> CaptchaSolver for ColorIsolationSolver<O> {
    async fn solve(&self, image: &[u8]) -> String {
        match self.try_solve(image).await {
            Ok(text) => text,
            Err(e) => {
                warn!("验证码识别失败: {}", e);
                String::new()
            }
        }
    }
}

/// 把目标颜色的像素复制到白色画布
///
/// # 返回
/// (画布, 命中的像素数)
pub fn isolate_glyphs(image: &DynamicImage, target: Rgb<u8>) -> (RgbImage, usize) {
    let source = image.to_rgb8();
    let mut canvas = RgbImage::from_pixel(source.width(), source.height(), WHITE);
    let mut matched = 0;

    for (x, y, pixel) in source.enumerate_pixels() {
        if *pixel == target {
            canvas.put_pixel(x, y, *pixel);
            matched += 1;
        }
    }

    (canvas, matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOcr {
        calls: AtomicUsize,
        reply: &'static str,
    }

    #[async_trait]
    impl OcrEngine for CountingOcr {
        async fn recognize(&self, _png: &[u8]) -> Result<String, SolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    struct FailingOcr;

    #[async_trait]
    impl OcrEngine for FailingOcr {
        async fn recognize(&self, _png: &[u8]) -> Result<String, SolverError> {
            Err(SolverError::OcrFailed {
                status: Some(1),
                stderr: "boom".to_string(),
            })
        }
    }

    fn png_bytes(image: RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn noisy_captcha() -> RgbImage {
        let mut image = RgbImage::from_pixel(20, 10, Rgb([200, 180, 40]));
        for x in 2..8 {
            image.put_pixel(x, 5, TARGET_COLOR);
        }
        image.put_pixel(15, 2, Rgb([101, 102, 102]));
        image
    }

    #[test]
    fn test_isolate_keeps_only_target_pixels() {
        let (canvas, matched) = isolate_glyphs(&DynamicImage::ImageRgb8(noisy_captcha()), TARGET_COLOR);
        assert_eq!(matched, 6);
        assert_eq!(*canvas.get_pixel(3, 5), TARGET_COLOR);
        assert_eq!(*canvas.get_pixel(15, 2), WHITE);
        assert_eq!(*canvas.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_no_target_pixels_returns_empty_without_ocr() {
        let solver = ColorIsolationSolver::new(CountingOcr {
            calls: AtomicUsize::new(0),
            reply: "ABC123",
        });
        let blank = png_bytes(RgbImage::from_pixel(10, 10, Rgb([10, 20, 30])));

        let text = tokio_test::block_on(solver.solve(&blank));

        assert_eq!(text, "");
        assert_eq!(solver.ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_whitespace_is_stripped_from_ocr_output() {
        let solver = ColorIsolationSolver::new(CountingOcr {
            calls: AtomicUsize::new(0),
            reply: " AB C1 23\n",
        });
        let text = tokio_test::block_on(solver.solve(&png_bytes(noisy_captcha())));
        assert_eq!(text, "ABC123");
        assert_eq!(solver.ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_garbage_bytes_and_ocr_errors_become_empty() {
        let solver = ColorIsolationSolver::new(FailingOcr);
        assert_eq!(tokio_test::block_on(solver.solve(b"not an image")), "");
        assert_eq!(tokio_test::block_on(solver.solve(&png_bytes(noisy_captcha()))), "");
    }
}
