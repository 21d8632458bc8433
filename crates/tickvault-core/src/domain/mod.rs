//! 저장 대상 레코드 모델.

mod candle;
mod news;

pub use candle::*;
pub use news::*;
