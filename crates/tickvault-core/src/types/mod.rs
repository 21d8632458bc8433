//! 공통 타입 정의.

pub mod interval;
pub mod symbol;

pub use interval::*;
pub use symbol::*;
