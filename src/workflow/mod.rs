pub mod fetch_ctx;
pub mod fetch_flow;
pub mod retry;

pub use fetch_ctx::FetchCtx;
pub use fetch_flow::{classify_alert, AlertKind, FetchFlow, FetchSettings};
pub use retry::RetryBudget;
