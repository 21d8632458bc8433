//! 수집 명령 모듈.

pub mod audit;
pub mod import;
pub mod input;
pub mod news;

pub use audit::{audit_days, AuditSummary};
pub use import::{import_candles, import_news, CandleFormat, CandleImport, NewsImport};
pub use news::{classify_batch, classify_news, pending_news, ClassifyEntry};
