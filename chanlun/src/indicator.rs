pub mod ema;
pub mod macd;

pub use ema::EmaIndicator;
pub use macd::{MacdIndicator, MacdPoint};
