//! Candle backend: hub download, LoRA merge and Gemma generation

pub mod candle;
pub mod lora;

pub use self::candle::{CandleGenerator, CandleLoader};
pub use self::lora::{merge_lora, LoraConfig};
