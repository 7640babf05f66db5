pub mod captcha_solver;
pub mod ocr;
pub mod report;
pub mod result_parser;
pub mod result_store;

pub use captcha_solver::{CaptchaSolver, ColorIsolationSolver};
pub use ocr::{OcrEngine, TesseractOcr};
pub use report::ReportBuilder;
pub use result_parser::parse_student_result;
pub use result_store::{ResultStore, Sheet};
