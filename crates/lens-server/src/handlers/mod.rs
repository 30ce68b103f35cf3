//! HTTP request handlers

pub mod health;
pub mod simplify;
pub mod ui;

pub use health::*;
pub use simplify::*;
pub use ui::*;
