pub mod compile;
pub mod error;
pub mod latex;
pub mod storage;
pub mod utils;
