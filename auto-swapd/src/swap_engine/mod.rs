pub mod calldata;
pub mod engine;
pub mod models;

pub use calldata::RouterCall;
pub use engine::SwapEngine;
pub use models::{Asset, Direction, SwapCallParams, SwapError, SwapMode, SwapRequest};
